//! Per-run context and diagnostic sink.

use crate::annotate::{Annotations, ParsedYaml};
use crate::ast::{AstNode, NodeKind, Position};
use crate::rule::RuleError;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A raw finding, before it is resolved into a [`crate::Message`].
#[derive(Debug, Clone)]
pub struct Report {
    /// Id of the rule that was executing when the report was made.
    pub rule_id: Arc<str>,
    /// Human-readable message.
    pub message: String,
    /// Kind of the reported node.
    pub node_kind: NodeKind,
    /// Span of the reported node, as recorded by the parser.
    pub position: Option<Position>,
}

#[derive(Debug, Default)]
struct RunState {
    current_rule: Option<Arc<str>>,
    reports: Vec<Report>,
}

/// State of one validation run.
///
/// Created fresh for every document. Validators report through
/// [`Context::report`]; the engine marks which rule is executing so each
/// report is attributed to it.
#[derive(Debug, Default)]
pub struct Context {
    path: Option<PathBuf>,
    annotations: Annotations,
    state: Mutex<RunState>,
}

impl Context {
    /// Creates a context for the document at `path`, if any.
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            annotations: Annotations::default(),
            state: Mutex::default(),
        }
    }

    /// Attaches the enrichment table built before traversal.
    #[must_use]
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Path of the document being validated.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File name of the document being validated.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
    }

    /// Enrichment results for this document.
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Front-matter parse result for a `yaml` node.
    #[must_use]
    pub fn yaml(&self, node: &AstNode) -> Option<&ParsedYaml> {
        self.annotations.yaml(node)
    }

    /// Records a finding against `node` for the rule currently executing.
    ///
    /// Every call produces exactly one record; there is no deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::NoActiveRule`] when called outside a rule
    /// invocation, e.g. from a task that outlived its validator.
    pub fn report(&self, node: &AstNode, message: impl Into<String>) -> Result<(), RuleError> {
        let mut state = self.lock();
        let rule_id = state.current_rule.clone().ok_or(RuleError::NoActiveRule)?;
        state.reports.push(Report {
            rule_id,
            message: message.into(),
            node_kind: node.kind().clone(),
            position: node.position().copied(),
        });
        Ok(())
    }

    /// Id of the rule currently executing.
    #[must_use]
    pub fn current_rule(&self) -> Option<Arc<str>> {
        self.lock().current_rule.clone()
    }

    /// Number of reports recorded so far.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.lock().reports.len()
    }

    pub(crate) fn enter_rule(&self, rule_id: &Arc<str>) {
        self.lock().current_rule = Some(Arc::clone(rule_id));
    }

    pub(crate) fn exit_rule(&self) {
        self.lock().current_rule = None;
    }

    /// Drains the accumulated reports in emission order.
    pub(crate) fn take_reports(&self) -> Vec<Report> {
        std::mem::take(&mut self.lock().reports)
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
