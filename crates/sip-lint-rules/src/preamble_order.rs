//! Rule requiring preamble headers in canonical order.

use crate::preamble::{FirstOnly, HEADER_ORDER};
use regex::Regex;
use sip_lint_core::{Context, Rule, RuleError, Validators};
use std::sync::Arc;

/// Rule id for preamble-order.
pub const NAME: &str = "preamble-order";

/// Reports the first known header that appears out of order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreambleOrder;

impl PreambleOrder {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for PreambleOrder {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Preamble headers must follow sip, title, status, discussions-to, author, created, updated"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let headers = Regex::new(r"(?m)^([a-z][a-z-]*):")
            .map_err(|e| RuleError::Config(format!("invalid header pattern: {e}")))?;
        let ctx = Arc::clone(ctx);
        let first = FirstOnly::default();

        Ok(Validators::new().on("yaml", move |node| {
            if ctx.annotations().parsed_yaml(node).is_none() || !first.claim() {
                return Ok(());
            }
            let source = node.value().unwrap_or_default();

            let mut last = 0;
            for captures in headers.captures_iter(source) {
                let header = &captures[1];
                let Some(rank) = HEADER_ORDER.iter().position(|h| *h == header) else {
                    continue;
                };
                if rank < last {
                    ctx.report(
                        node,
                        format!("Front-matter property \"{header}\" is not in proper order"),
                    )?;
                    break;
                }
                last = rank;
            }
            Ok(())
        }))
    }
}
