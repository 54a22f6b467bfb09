//! Preamble (front-matter) schema shared by the preamble rules.

use chrono::{Local, NaiveDate};
use regex::Regex;
use serde_yaml::Value;
use sip_lint_core::RuleError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Headers in the order they must appear.
pub const HEADER_ORDER: [&str; 7] = [
    "sip",
    "title",
    "status",
    "discussions-to",
    "author",
    "created",
    "updated",
];

/// Allowed values of the `status` header.
pub const STATUSES: [&str; 6] = [
    "Draft",
    "Review",
    "Implementation",
    "Final",
    "Withdrawn",
    "Living",
];

const GITHUB_USERNAME: &str = r"[a-zA-Z\d](?:-?[a-zA-Z\d]){0,38}";

/// Validates preamble values against the header schema.
#[derive(Debug, Clone)]
pub struct PreambleSchema {
    author: Regex,
    today: NaiveDate,
}

impl PreambleSchema {
    /// Creates a schema that rejects dates after today.
    ///
    /// # Errors
    ///
    /// Returns an error if the author pattern fails to compile.
    pub fn new() -> Result<Self, RuleError> {
        let pattern = format!(
            r"^\w[.\w\s]*(?: (?:<.+@.+>(?: \((@{GITHUB_USERNAME})\))?)|\((@{GITHUB_USERNAME})\))?$"
        );
        let author = Regex::new(&pattern)
            .map_err(|e| RuleError::Config(format!("invalid author pattern: {e}")))?;
        Ok(Self {
            author,
            today: Local::now().date_naive(),
        })
    }

    /// Overrides the date used for "not in the future" checks.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Parses an ISO-8601 `YYYY-MM-DD` date that is not in the future.
    #[must_use]
    pub fn date(&self, value: &str) -> Option<NaiveDate> {
        let bytes = value.as_bytes();
        let shaped = bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
        if !shaped {
            return None;
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .filter(|date| *date <= self.today)
    }

    /// Checks an author list; returns the failure reason, if any.
    #[must_use]
    pub fn author_problem(&self, value: &str) -> Option<&'static str> {
        let mut has_github = false;
        for author in value.split(',') {
            let Some(captures) = self.author.captures(author.trim()) else {
                return Some("is malformed");
            };
            if captures.get(1).is_some() || captures.get(2).is_some() {
                has_github = true;
            }
        }
        (!has_github).then_some("doesn't have at least one GitHub account")
    }

    /// Validates a parsed preamble.
    ///
    /// Returns one message per failure, in header order. Cross-field checks
    /// only run when every header is individually valid.
    #[must_use]
    pub fn validate(&self, preamble: &Value) -> Vec<String> {
        let Some(map) = preamble.as_mapping() else {
            return vec![format!(
                "Front-matter expected an object, but received: {}",
                describe(preamble)
            )];
        };

        let mut failures = Vec::new();
        let mut property = |name: &str, reason: String| {
            failures.push(format!("Front-matter property \"{name}\" {reason}"));
        };

        for key in map.keys() {
            let known = key.as_str().is_some_and(|k| HEADER_ORDER.contains(&k));
            if !known {
                property(&key_name(key), "is not an allowed header".to_string());
            }
        }

        match map.get("sip") {
            None => property("sip", "is required".to_string()),
            Some(Value::Number(n)) => {
                if let Some(sip) = n.as_i64() {
                    if sip <= 0 {
                        property("sip", "not a positive number".to_string());
                    }
                } else if n.as_u64().is_none() {
                    property("sip", "not an integer".to_string());
                }
            }
            Some(other) => property(
                "sip",
                format!("expected a number, but received: {}", describe(other)),
            ),
        }

        match map.get("title") {
            None => property("title", "is required".to_string()),
            Some(Value::String(_)) => {}
            Some(other) => property(
                "title",
                format!("expected a string, but received: {}", describe(other)),
            ),
        }

        match map.get("status") {
            None => property("status", "is required".to_string()),
            Some(Value::String(s)) if STATUSES.contains(&s.as_str()) => {}
            Some(other) => property(
                "status",
                format!(
                    "expected one of {}, but received: {}",
                    STATUSES.join(", "),
                    describe(other)
                ),
            ),
        }

        match map.get("discussions-to") {
            None => {}
            Some(Value::String(s)) if is_http_url(s) => {}
            Some(Value::String(_)) => {
                property("discussions-to", "not a valid http/https url".to_string());
            }
            Some(other) => property(
                "discussions-to",
                format!("expected a string, but received: {}", describe(other)),
            ),
        }

        match map.get("author") {
            None => property("author", "is required".to_string()),
            Some(Value::String(s)) => {
                if let Some(reason) = self.author_problem(s) {
                    property("author", reason.to_string());
                }
            }
            Some(other) => property(
                "author",
                format!("expected a string, but received: {}", describe(other)),
            ),
        }

        let created = match map.get("created") {
            None => {
                property("created", "is required".to_string());
                None
            }
            Some(value) => {
                let date = value.as_str().and_then(|s| self.date(s));
                if date.is_none() {
                    property("created", "not a valid iso-8601 date".to_string());
                }
                date
            }
        };

        let updated = match map.get("updated") {
            None => None,
            Some(value) => {
                let date = value.as_str().and_then(|s| self.date(s));
                if date.is_none() {
                    property("updated", "not a valid iso-8601 date".to_string());
                }
                date
            }
        };

        if !failures.is_empty() {
            return failures;
        }

        if let (Some(created), Some(updated)) = (created, updated) {
            if updated < created {
                failures.push(
                    "Front-matter property \"updated\" is earlier than \"created\"".to_string(),
                );
            }
        }
        let living = map.get("status").and_then(Value::as_str) == Some("Living");
        if living && updated.is_none() {
            failures.push(
                "Front-matter has status of \"Living\" but doesn't have \"updated\" preamble header"
                    .to_string(),
            );
        }
        failures
    }
}

/// Marks the first parsed preamble of a run.
///
/// Preamble rules only look at the first front-matter block; later ones are
/// reported by `preamble-exists`.
#[derive(Debug, Default)]
pub(crate) struct FirstOnly(AtomicBool);

impl FirstOnly {
    /// Returns true exactly once.
    pub(crate) fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => describe(other),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("{s:?}"),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "an object".to_string(),
        Value::Tagged(tagged) => format!("a value tagged {}", tagged.tag),
    }
}
