//! Rule requiring exactly one parsed preamble.

use sip_lint_core::{Context, NodeKind, Rule, RuleError, Validators};
use std::sync::Arc;

/// Rule id for preamble-exists.
pub const NAME: &str = "preamble-exists";

/// Reports documents without a preamble and every preamble after the first.
///
/// Only blocks that parsed as YAML count; broken ones are left to the
/// `yaml` rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreambleExists;

impl PreambleExists {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for PreambleExists {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Document must have exactly one preamble"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let ctx = Arc::clone(ctx);
        Ok(Validators::new().on("root", move |root| {
            let preambles: Vec<_> = root
                .walk()
                .filter(|n| *n.kind() == NodeKind::Yaml)
                .filter(|n| ctx.annotations().parsed_yaml(n).is_some())
                .collect();

            if preambles.is_empty() {
                ctx.report(root, "No preamble found")?;
            }
            for extra in preambles.iter().skip(1) {
                ctx.report(extra, "Too many preambles")?;
            }
            Ok(())
        }))
    }
}
