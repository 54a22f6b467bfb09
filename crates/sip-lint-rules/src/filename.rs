//! Rule requiring `sip-N.md` file names.

use regex::Regex;
use sip_lint_core::{Context, Rule, RuleError, Validators};
use std::sync::Arc;

/// Rule id for filename.
pub const NAME: &str = "filename";

/// Reports documents whose file name is not `sip-N.md`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Filename;

impl Filename {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for Filename {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "File name must be in sip-N.md format"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let pattern = Regex::new(r"^sip-[1-9][0-9]*\.md$")
            .map_err(|e| RuleError::Config(format!("invalid filename pattern: {e}")))?;
        let ctx = Arc::clone(ctx);

        Ok(Validators::new().on("root", move |node| {
            let Some(path) = ctx.path() else {
                return Ok(());
            };
            if !ctx.file_name().is_some_and(|name| pattern.is_match(name)) {
                ctx.report(
                    node,
                    format!(
                        "File \"{}\" doesn't have a filename in \"sip-N.md\" format",
                        path.display()
                    ),
                )?;
            }
            Ok(())
        }))
    }
}
