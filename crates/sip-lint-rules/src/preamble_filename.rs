//! Rule requiring the `sip` header to match the file name.

use crate::preamble::FirstOnly;
use regex::Regex;
use sip_lint_core::{Context, Rule, RuleError, Validators};
use std::sync::Arc;
use tracing::debug;

/// Rule id for preamble-filename.
pub const NAME: &str = "preamble-filename";

/// Compares the `sip` number with `N` in `sip-N.md`.
///
/// Documents validated without a path are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreambleFilename;

impl PreambleFilename {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for PreambleFilename {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Preamble sip number must match the filename"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let number = Regex::new(r"sip-([1-9][0-9]*)\.md$")
            .map_err(|e| RuleError::Config(format!("invalid filename pattern: {e}")))?;
        let ctx = Arc::clone(ctx);
        let first = FirstOnly::default();

        Ok(Validators::new().on("yaml", move |node| {
            let Some(preamble) = ctx.annotations().parsed_yaml(node) else {
                return Ok(());
            };
            if !first.claim() {
                return Ok(());
            }
            let Some(sip) = preamble.get("sip").and_then(serde_yaml::Value::as_u64) else {
                debug!("Malformed sip header, skipping");
                return Ok(());
            };
            let Some(file_name) = ctx.file_name() else {
                return Ok(());
            };

            let from_name = number
                .captures(file_name)
                .and_then(|c| c[1].parse::<u64>().ok());
            if from_name != Some(sip) {
                ctx.report(
                    node,
                    "Front-matter property \"sip\" doesn't match the filename number",
                )?;
            }
            Ok(())
        }))
    }
}
