//! sip-lint CLI tool.
//!
//! Usage:
//! ```bash
//! sip-lint check [OPTIONS] [PATHS]...
//! sip-lint list-rules
//! sip-lint init
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Validator for SIP proposal documents
#[derive(Parser)]
#[command(name = "sip-lint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate documents
    Check {
        /// Files, directories or glob patterns (default: `validator.include`)
        paths: Vec<String>,

        /// Output format (can be specified multiple times)
        #[arg(short, long, value_delimiter = ',', default_value = "text")]
        format: Vec<OutputFormat>,

        /// Only run specific rules (comma-separated)
        #[arg(long)]
        rules: Option<String>,

        /// Exclude patterns (can be specified multiple times)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// List available rules
    ListRules,

    /// Initialize configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Output format for validation results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-message compact format.
    Compact,
    /// Markdown body for a GitHub review comment.
    Github,
    /// Graphical output with source snippets.
    Fancy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check {
            paths,
            format,
            rules,
            exclude,
        } => {
            let source = config_resolver::resolve(std::path::Path::new("."), cli.config.as_deref());
            commands::check::run(&paths, &format, rules, exclude, &source).await
        }
        Commands::ListRules => {
            commands::list_rules::run();
            Ok(())
        }
        Commands::Init { force } => commands::init::run(force),
    }
}
