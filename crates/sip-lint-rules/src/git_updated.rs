//! Rule comparing the `updated` header with the file's git history.
//!
//! # Configuration
//!
//! - `reference_date`: compare against a fixed `YYYY-MM-DD` date instead of
//!   the last commit touching the file

use crate::preamble::{FirstOnly, PreambleSchema};
use chrono::NaiveDate;
use serde_yaml::Value;
use sip_lint_core::{Context, Rule, RuleError, Validators};
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Rule id for git-updated.
pub const NAME: &str = "git-updated";

/// Where the date `updated` is compared against comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceDate {
    /// A fixed date.
    Fixed(NaiveDate),
    /// Author date of the last commit touching the document.
    #[default]
    GitLog,
}

/// Reports an `updated` header older than the reference date.
#[derive(Debug, Clone, Default)]
pub struct GitUpdated {
    reference: ReferenceDate,
    today: Option<NaiveDate>,
}

impl GitUpdated {
    /// Creates the rule, reading reference dates from `git log`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares against a fixed date instead of git history.
    #[must_use]
    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.reference = ReferenceDate::Fixed(date);
        self
    }

    /// Fixes the date used to reject `updated` values in the future.
    #[must_use]
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

impl Rule for GitUpdated {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Preamble \"updated\" must not be older than the last git change"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let mut schema = PreambleSchema::new()?;
        if let Some(today) = self.today {
            schema = schema.with_today(today);
        }
        let ctx = Arc::clone(ctx);
        let first = FirstOnly::default();
        let reference = self.reference;

        Ok(Validators::new().on_async("yaml", move |node| {
            let updated = ctx
                .annotations()
                .parsed_yaml(&node)
                .filter(|_| first.claim())
                .and_then(|preamble| updated_date(&schema, preamble));
            let ctx = Arc::clone(&ctx);

            async move {
                let Some(updated) = updated else {
                    return Ok(());
                };
                let reference = match reference {
                    ReferenceDate::Fixed(date) => date,
                    ReferenceDate::GitLog => {
                        let Some(path) = ctx.path() else {
                            debug!("Document has no path, skipping git check");
                            return Ok(());
                        };
                        match last_commit_date(path).await? {
                            GitDate::Committed(date) => date,
                            GitDate::GitUnavailable => {
                                info!("git is not available, skipping git check");
                                return Ok(());
                            }
                            GitDate::NotRepository => {
                                info!("The file is not in a git repository");
                                return Ok(());
                            }
                            GitDate::Shallow => {
                                info!("File is located in shallow repository. Can't get correct last edited time");
                                return Ok(());
                            }
                            GitDate::Uncommitted => {
                                info!("File is not committed to git repository");
                                return Ok(());
                            }
                        }
                    }
                };

                if updated < reference {
                    ctx.report(
                        &node,
                        "The \"updated\" preamble property is older than last git updated time",
                    )?;
                }
                Ok(())
            }
        }))
    }
}

/// Valid `updated` header, if present.
fn updated_date(schema: &PreambleSchema, preamble: &Value) -> Option<NaiveDate> {
    let value = preamble.get("updated")?;
    let date = value.as_str().and_then(|s| schema.date(s));
    if date.is_none() {
        debug!("Malformed \"updated\" header, skipping");
    }
    date
}

enum GitDate {
    Committed(NaiveDate),
    GitUnavailable,
    NotRepository,
    Shallow,
    Uncommitted,
}

async fn last_commit_date(path: &Path) -> Result<GitDate, RuleError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Some(file_name) = path.file_name() else {
        return Ok(GitDate::Uncommitted);
    };

    let inside_args = [OsStr::new("rev-parse"), OsStr::new("--is-inside-work-tree")];
    let inside = match git(dir, &inside_args).await {
        Err(RuleError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            return Ok(GitDate::GitUnavailable);
        }
        other => other?,
    };
    if inside.as_deref() != Some("true") {
        return Ok(GitDate::NotRepository);
    }
    let shallow_args = [OsStr::new("rev-parse"), OsStr::new("--is-shallow-repository")];
    let shallow = git(dir, &shallow_args).await?;
    if shallow.as_deref() == Some("true") {
        return Ok(GitDate::Shallow);
    }

    let log = [
        OsStr::new("log"),
        OsStr::new("-1"),
        OsStr::new("--format=%as"),
        OsStr::new("--"),
        file_name,
    ];
    let Some(date) = git(dir, &log).await?.filter(|d| !d.is_empty()) else {
        return Ok(GitDate::Uncommitted);
    };
    NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map(GitDate::Committed)
        .map_err(|e| RuleError::msg(format!("unexpected git date {date:?}: {e}")))
}

/// Runs git in `dir`; returns trimmed stdout on success.
async fn git(dir: &Path, args: &[&OsStr]) -> Result<Option<String>, RuleError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await?;
    if !output.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
}
