//! Rule presets for common configurations.

use crate::{
    BadLink, Copyright, Filename, GitUpdated, PreambleData, PreambleExists, PreambleFilename,
    PreambleOrder, ValidYaml,
};
use chrono::NaiveDate;
use sip_lint_core::{Config, RuleBox, RuleConfig, RuleError};
use std::time::Duration;
use tracing::debug;

/// Preset configurations for sip-lint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Every rule that works without network access.
    #[default]
    Recommended,
    /// Recommended rules plus external link checking.
    Strict,
    /// Minimal rules for gradual adoption.
    Minimal,
}

impl Preset {
    /// Returns the rules for this preset.
    #[must_use]
    pub fn rules(self) -> Vec<RuleBox> {
        match self {
            Self::Recommended => recommended_rules(),
            Self::Strict => strict_rules(),
            Self::Minimal => minimal_rules(),
        }
    }

    /// Preset name as written in configuration.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::Strict => "strict",
            Self::Minimal => "minimal",
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recommended" => Ok(Self::Recommended),
            "strict" => Ok(Self::Strict),
            "minimal" => Ok(Self::Minimal),
            other => Err(RuleError::Config(format!("unknown preset \"{other}\""))),
        }
    }
}

/// Returns the recommended set of rules.
///
/// Includes every rule except `bad-link`.
#[must_use]
pub fn recommended_rules() -> Vec<RuleBox> {
    vec![
        Box::new(ValidYaml::new()),
        Box::new(PreambleExists::new()),
        Box::new(PreambleData::new()),
        Box::new(PreambleOrder::new()),
        Box::new(PreambleFilename::new()),
        Box::new(Filename::new()),
        Box::new(Copyright::new()),
        Box::new(GitUpdated::new()),
    ]
}

/// Returns the strict set of rules: recommended plus `bad-link`.
#[must_use]
pub fn strict_rules() -> Vec<RuleBox> {
    let mut rules = recommended_rules();
    rules.push(Box::new(BadLink::new()));
    rules
}

/// Returns the minimal set of rules.
///
/// For gradual adoption, only includes:
/// - `filename`
/// - `copyright`
/// - `preamble-exists`
#[must_use]
pub fn minimal_rules() -> Vec<RuleBox> {
    vec![
        Box::new(Filename::new()),
        Box::new(Copyright::new()),
        Box::new(PreambleExists::new()),
    ]
}

/// Returns all available rules.
#[must_use]
pub fn all_rules() -> Vec<RuleBox> {
    strict_rules()
}

/// Builds the rule set described by `config`.
///
/// Starts from the configured preset (default `recommended`), adds rules
/// explicitly enabled outside it, and applies rule options. Rules disabled
/// in the configuration are kept here; the engine skips them.
///
/// # Errors
///
/// Returns an error for an unknown preset or an invalid rule option.
pub fn rules_from_config(config: &Config) -> Result<Vec<RuleBox>, RuleError> {
    let preset = match config.preset.as_deref() {
        Some(name) => name.parse()?,
        None => Preset::default(),
    };
    debug!("Using preset: {}", preset.name());

    let mut ids: Vec<String> = preset.rules().iter().map(|r| r.id().to_string()).collect();
    for rule in all_rules() {
        let id = rule.id();
        let requested = config.rule(id).and_then(|c| c.enabled) == Some(true);
        if requested && !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }

    ids.iter()
        .map(|id| configured_rule(id, config.rule(id)))
        .collect()
}

fn configured_rule(id: &str, options: Option<&RuleConfig>) -> Result<RuleBox, RuleError> {
    let default = RuleConfig::default();
    let options = options.unwrap_or(&default);

    let rule: RuleBox = match id {
        crate::bad_link::NAME => {
            let defaults = BadLink::new();
            Box::new(
                BadLink::new()
                    .max_concurrent(positive(options, "max_concurrent", defaults.max_concurrent)?)
                    .timeout(Duration::from_secs(positive(
                        options,
                        "timeout_secs",
                        defaults.timeout.as_secs(),
                    )?))
                    .min_interval(Duration::from_millis(positive(
                        options,
                        "min_interval_ms",
                        u64::try_from(defaults.min_interval.as_millis()).unwrap_or(u64::MAX),
                    )?)),
            )
        }
        crate::git_updated::NAME => match options.get_str("reference_date") {
            Some(date) => {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
                    RuleError::Config(format!("git-updated reference_date \"{date}\": {e}"))
                })?;
                Box::new(GitUpdated::new().reference_date(date))
            }
            None => Box::new(GitUpdated::new()),
        },
        crate::valid_yaml::NAME => Box::new(ValidYaml::new()),
        crate::preamble_exists::NAME => Box::new(PreambleExists::new()),
        crate::preamble_data::NAME => Box::new(PreambleData::new()),
        crate::preamble_order::NAME => Box::new(PreambleOrder::new()),
        crate::preamble_filename::NAME => Box::new(PreambleFilename::new()),
        crate::filename::NAME => Box::new(Filename::new()),
        crate::copyright::NAME => Box::new(Copyright::new()),
        other => return Err(RuleError::Config(format!("unknown rule \"{other}\""))),
    };
    Ok(rule)
}

/// Reads a non-negative integer option.
fn positive<T>(options: &RuleConfig, key: &str, default: T) -> Result<T, RuleError>
where
    T: TryFrom<i64> + Copy,
{
    if !options.options.contains_key(key) {
        return Ok(default);
    }
    options
        .get_option::<i64>(key)
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| {
            RuleError::Config(format!("option \"{key}\" must be a non-negative integer"))
        })
}
