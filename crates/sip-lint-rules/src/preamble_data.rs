//! Rule validating preamble headers against the schema.
//!
//! # Checks
//!
//! - `sip`: positive integer
//! - `title`: string
//! - `status`: one of [`STATUSES`](crate::preamble::STATUSES)
//! - `discussions-to`: optional http(s) URL
//! - `author`: comma separated list with at least one GitHub handle
//! - `created` / `updated`: `YYYY-MM-DD`, not in the future
//! - `updated` not earlier than `created`; `Living` proposals need `updated`

use crate::preamble::{FirstOnly, PreambleSchema};
use chrono::NaiveDate;
use sip_lint_core::{Context, Rule, RuleError, Validators};
use std::sync::Arc;
use tracing::debug;

/// Rule id for preamble-data.
pub const NAME: &str = "preamble-data";

/// Validates the first parsed preamble.
#[derive(Debug, Clone, Default)]
pub struct PreambleData {
    today: Option<NaiveDate>,
}

impl PreambleData {
    /// Creates the rule, checking dates against the local date.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the date used for "not in the future" checks.
    #[must_use]
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

impl Rule for PreambleData {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Preamble headers must follow the schema"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let mut schema = PreambleSchema::new()?;
        if let Some(today) = self.today {
            schema = schema.with_today(today);
        }
        let ctx = Arc::clone(ctx);
        let first = FirstOnly::default();

        Ok(Validators::new().on("yaml", move |node| {
            let Some(preamble) = ctx.annotations().parsed_yaml(node) else {
                return Ok(());
            };
            if !first.claim() {
                return Ok(());
            }
            let failures = schema.validate(preamble);
            debug!("Preamble has {} schema failure(s)", failures.len());
            for failure in failures {
                ctx.report(node, failure)?;
            }
            Ok(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::run;

    fn rule() -> PreambleData {
        PreambleData::new().today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    #[tokio::test]
    async fn test_valid_preamble() {
        let source = "---\nsip: 2\ntitle: Test\nstatus: Final\nauthor: Alice (@alice)\ncreated: 2024-01-01\n---\n";
        assert!(run(rule(), source, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_reports_each_failure_on_preamble() {
        let source = "---\nsip: -1\ntitle: Test\nstatus: Final\nauthor: Alice\ncreated: 2030-01-01\n---\n";
        let messages = run(rule(), source, None).await;
        let texts: Vec<&str> = messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Front-matter property \"sip\" not a positive number",
                "Front-matter property \"author\" doesn't have at least one GitHub account",
                "Front-matter property \"created\" not a valid iso-8601 date",
            ]
        );
        assert!(messages.iter().all(|m| (m.line, m.column) == (7, 4)));
    }

    #[tokio::test]
    async fn test_empty_preamble_fails_schema() {
        let messages = run(rule(), "---\n---\n\n# Title\n", None).await;
        let texts: Vec<&str> = messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["Front-matter expected an object, but received: null"]);
        assert_eq!((messages[0].line, messages[0].column), (2, 4));
    }

    #[tokio::test]
    async fn test_ignores_unparsed_preamble() {
        assert!(run(rule(), "---\nsip: [\n---\n", None).await.is_empty());
    }
}
