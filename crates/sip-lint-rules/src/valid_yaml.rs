//! Rule requiring front-matter to be valid YAML.

use sip_lint_core::{Context, ParsedYaml, Rule, RuleError, Validators};
use std::sync::Arc;
use tracing::debug;

/// Rule id for valid-yaml.
pub const NAME: &str = "yaml";

/// Reports front-matter blocks that fail to parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidYaml;

impl ValidYaml {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for ValidYaml {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Front-matter must be valid YAML"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let ctx = Arc::clone(ctx);
        Ok(Validators::new().on("yaml", move |node| {
            if let Some(ParsedYaml::Invalid(error)) = ctx.yaml(node) {
                debug!("Invalid front-matter: {error}");
                ctx.report(node, "Front-matter is not valid YAML")?;
            }
            Ok(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::run;

    #[tokio::test]
    async fn test_reports_invalid_yaml() {
        let messages = run(ValidYaml::new(), "---\ntitle: [oops\n---\n", None).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].rule_id, NAME);
        assert_eq!(messages[0].message, "Front-matter is not valid YAML");
        assert_eq!((messages[0].line, messages[0].column), (3, 4));
    }

    #[tokio::test]
    async fn test_accepts_valid_yaml() {
        let messages = run(ValidYaml::new(), "---\ntitle: fine\n---\n", None).await;
        assert!(messages.is_empty());
    }
}
