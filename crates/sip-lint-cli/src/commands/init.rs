//! Init command implementation.

use anyhow::{bail, Result};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# sip-lint configuration

# Rule preset: "minimal", "recommended" (default) or "strict"
preset = "recommended"

[validator]
# Documents validated when no paths are given
include = ["sips/sip-*.md"]

# Glob patterns to skip
exclude = []

# Rule configurations
# Each rule can be enabled or disabled and take options

# [rules.git-updated]
# enabled = true
# reference_date = "2024-01-31"  # compare against a fixed date instead of git

# [rules.bad-link]
# enabled = true
# max_concurrent = 8
# timeout_secs = 10
# min_interval_ms = 100
"#;

/// Runs the init command.
pub fn run(force: bool) -> Result<()> {
    let config_path = Path::new("sip-lint.toml");

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(config_path, DEFAULT_CONFIG)?;

    println!("Created sip-lint.toml");
    println!("\nNext steps:");
    println!("  1. Edit sip-lint.toml to configure rules");
    println!("  2. Run: sip-lint check");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_lint_core::Config;

    #[test]
    fn default_config_is_valid() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.preset.as_deref(), Some("recommended"));
        assert_eq!(config.validator.include, vec!["sips/sip-*.md"]);

        let rules = sip_lint_rules::rules_from_config(&config).unwrap();
        assert!(rules.iter().all(|r| r.id() != "bad-link"));
    }
}
