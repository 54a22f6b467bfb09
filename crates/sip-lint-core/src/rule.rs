//! Rule contract.

use crate::ast::AstNode;
use crate::context::Context;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised from rule code.
///
/// Document findings are never errors: they go through
/// [`Context::report`]. These variants mean the validation process
/// itself is broken.
#[derive(Debug, Error)]
pub enum RuleError {
    /// `report` was called while no rule was executing.
    #[error("report() called outside of an active rule invocation")]
    NoActiveRule,

    /// The rule was set up with invalid options.
    #[error("invalid rule configuration: {0}")]
    Config(String),

    /// IO error inside a validator.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl RuleError {
    /// Wraps an arbitrary message as [`RuleError::Other`].
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Other(message.into())
    }
}

/// Pending unit of work returned by a validator.
pub type ValidatorFuture = Pin<Box<dyn Future<Output = Result<(), RuleError>> + Send>>;

/// Callback registered for a selector.
///
/// Synchronous validators return an already completed future, so the engine
/// awaits every validator the same way.
pub type Validator = Arc<dyn Fn(Arc<AstNode>) -> ValidatorFuture + Send + Sync>;

/// Ordered selector-to-validator mapping returned by [`Rule::create`].
///
/// Entries keep registration order; the engine compiles each selector once
/// per run.
#[derive(Default)]
pub struct Validators {
    entries: Vec<(String, Validator)>,
}

impl Validators {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a synchronous validator.
    #[must_use]
    pub fn on<F>(mut self, selector: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&AstNode) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        let validator: Validator = Arc::new(move |node: Arc<AstNode>| {
            let result = validator(&node);
            Box::pin(std::future::ready(result)) as ValidatorFuture
        });
        self.entries.push((selector.into(), validator));
        self
    }

    /// Registers an asynchronous validator.
    #[must_use]
    pub fn on_async<F, Fut>(mut self, selector: impl Into<String>, validator: F) -> Self
    where
        F: Fn(Arc<AstNode>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RuleError>> + Send + 'static,
    {
        let validator: Validator =
            Arc::new(move |node: Arc<AstNode>| Box::pin(validator(node)) as ValidatorFuture);
        self.entries.push((selector.into(), validator));
        self
    }

    /// Number of registered validators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selector texts in registration order.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(selector, _)| selector.as_str())
    }
}

impl IntoIterator for Validators {
    type Item = (String, Validator);
    type IntoIter = std::vec::IntoIter<(String, Validator)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl std::fmt::Debug for Validators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.selectors()).finish()
    }
}

/// A named unit of validation logic.
///
/// `create` is called once per validation run with that run's context;
/// the returned validators may capture the context to report and may keep
/// run-scoped state.
///
/// # Example
///
/// ```ignore
/// use sip_lint_core::{Context, Rule, RuleError, Validators};
/// use std::sync::Arc;
///
/// pub struct NoEmptyHeadings;
///
/// impl Rule for NoEmptyHeadings {
///     fn id(&self) -> &str { "no-empty-headings" }
///
///     fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
///         let ctx = Arc::clone(ctx);
///         Ok(Validators::new().on("heading", move |node| {
///             if node.text_content().trim().is_empty() {
///                 ctx.report(node, "Heading is empty")?;
///             }
///             Ok(())
///         }))
///     }
/// }
/// ```
pub trait Rule: Send + Sync {
    /// Identifier attached to every message this rule produces.
    /// Must be unique among the rules of one run.
    fn id(&self) -> &str;

    /// Returns a brief description of what this rule checks.
    fn description(&self) -> &str {
        ""
    }

    /// Builds this run's validators.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule cannot be set up; the run fails before
    /// any node is visited.
    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError>;
}

/// Type alias for boxed Rule trait objects.
pub type RuleBox = Box<dyn Rule>;
