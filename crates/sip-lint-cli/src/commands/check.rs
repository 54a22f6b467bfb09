//! Check command implementation.

use anyhow::{Context, Result};
use glob::Pattern;
use ignore::WalkBuilder;
use sip_lint_core::{Config, Engine, RuleBox, ValidatorConfig};
use sip_lint_rules::{rules_from_config, Preset};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config_resolver::ConfigSource;
use crate::OutputFormat;

/// Runs the check command.
pub async fn run(
    paths: &[String],
    formats: &[OutputFormat],
    rules_filter: Option<String>,
    exclude: Vec<String>,
    source: &ConfigSource,
) -> Result<()> {
    let config = source.load()?;

    let rules = match rules_filter {
        Some(filter) => {
            let names: Vec<&str> = filter.split(',').map(str::trim).collect();
            filter_rules(&config, &names)?
        }
        None => rules_from_config(&config).context("Failed to configure rules")?,
    };

    let files = discover(paths, &config.validator, &exclude)?;
    if files.is_empty() {
        tracing::warn!("No documents matched");
    }

    let engine = Engine::builder()
        .rules(rules)
        .config(config)
        .build()
        .context("Failed to build engine")?;

    tracing::info!(
        "Validating {} document(s) with {} rules",
        files.len(),
        engine.rule_count()
    );

    let result = engine
        .validate_files(&files)
        .await
        .context("Validation failed")?;

    super::output::print(&result, formats)?;

    if result.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Selects rules by id from the full configured set, regardless of preset.
fn filter_rules(config: &Config, names: &[&str]) -> Result<Vec<RuleBox>> {
    let mut scoped = config.clone();
    scoped.preset = Some(Preset::Strict.name().to_string());
    let available = rules_from_config(&scoped).context("Failed to configure rules")?;

    for name in names {
        if !available.iter().any(|r| r.id() == *name) {
            tracing::warn!("Unknown rule: {}", name);
        }
    }

    Ok(available
        .into_iter()
        .filter(|r| names.contains(&r.id()))
        .collect())
}

/// Expands paths, directories and glob patterns into a sorted list of
/// documents.
///
/// With no inputs, the configured `include` patterns are used. Directories
/// are walked for `.md` files, honoring `.gitignore`.
pub fn discover(
    inputs: &[String],
    validator: &ValidatorConfig,
    exclude: &[String],
) -> Result<Vec<PathBuf>> {
    let excluded = validator
        .exclude
        .iter()
        .chain(exclude)
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid exclude pattern: {p}")))
        .collect::<Result<Vec<_>>>()?;

    let inputs = if inputs.is_empty() {
        validator.include.as_slice()
    } else {
        inputs
    };

    let mut files = BTreeSet::new();
    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            walk_markdown(path, &mut files);
        } else if path.is_file() {
            files.insert(path.to_path_buf());
        } else {
            let matches =
                glob::glob(input).with_context(|| format!("Invalid glob pattern: {input}"))?;
            for entry in matches {
                match entry {
                    Ok(p) if p.is_file() => {
                        files.insert(p);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Skipping {}: {}", e.path().display(), e.error()),
                }
            }
        }
    }

    Ok(files
        .into_iter()
        .filter(|p| !is_excluded(p, &excluded))
        .collect())
}

fn walk_markdown(dir: &Path, files: &mut BTreeSet<PathBuf>) {
    let mut builder = WalkBuilder::new(dir);
    builder.hidden(false).git_ignore(true);

    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping entry: {}", e);
                continue;
            }
        };
        let is_file = entry.file_type().is_some_and(|t| t.is_file());
        let is_markdown = entry.path().extension().is_some_and(|ext| ext == "md");
        if is_file && is_markdown {
            files.insert(entry.into_path());
        }
    }
}

fn is_excluded(path: &Path, patterns: &[Pattern]) -> bool {
    let relative = path.strip_prefix(".").unwrap_or(path);
    let name = path.file_name().and_then(|n| n.to_str());
    patterns.iter().any(|p| {
        p.matches_path(path) || p.matches_path(relative) || name.is_some_and(|n| p.matches(n))
    })
}
