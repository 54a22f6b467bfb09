//! Traversal and dispatch engine.

use crate::annotate::Annotations;
use crate::ast::{walk_shared, AstNode};
use crate::config::{Config, ConfigError};
use crate::context::{Context, Report};
use crate::rule::{Rule, RuleBox, RuleError, Validator};
use crate::selector::Selector;
use crate::types::{FileResult, LintResult, Message};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Errors that abort a validation run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Two registered rules share an id.
    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(String),

    /// A rule failed to build its validators.
    #[error("Rule {rule} failed to initialize: {source}")]
    Create {
        /// Id of the failing rule.
        rule: String,
        /// Error raised by the rule.
        #[source]
        source: RuleError,
    },

    /// A validator raised an error.
    #[error("Rule {rule} failed on {kind} node: {source}")]
    Validator {
        /// Id of the failing rule.
        rule: String,
        /// Kind of the node being validated.
        kind: String,
        /// Error raised by the validator.
        #[source]
        source: RuleError,
    },

    /// A validator panicked.
    #[error("Rule {rule} panicked")]
    ValidatorPanicked {
        /// Id of the failing rule.
        rule: String,
    },

    /// A report names a node without a source position.
    #[error("Rule {rule} reported a {kind} node without a position")]
    MissingPosition {
        /// Id of the reporting rule.
        rule: String,
        /// Kind of the reported node.
        kind: String,
    },

    /// IO error reading a document.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Builder for configuring an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    rules: Vec<RuleBox>,
    config: Option<Config>,
}

impl EngineBuilder {
    /// Creates a new builder with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule to the engine.
    #[must_use]
    pub fn rule<R: Rule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Adds a boxed rule to the engine.
    #[must_use]
    pub fn rule_box(mut self, rule: RuleBox) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds several boxed rules, keeping their order.
    #[must_use]
    pub fn rules<I>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = RuleBox>,
    {
        self.rules.extend(rules);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateRuleId`] if two rules share an id.
    pub fn build(self) -> Result<Engine, EngineError> {
        ensure_unique(self.rules.iter().map(|r| r.id()))?;
        Ok(Engine {
            rules: self.rules,
            config: self.config.unwrap_or_default(),
        })
    }
}

/// Runs rules over document trees.
///
/// Use [`Engine::builder()`] to construct an instance. Every run gets a
/// fresh [`Context`] and freshly created validators, so nothing is shared
/// between documents.
pub struct Engine {
    rules: Vec<RuleBox>,
    config: Config,
}

/// A rule's validators with their selectors compiled for one run.
struct CompiledRule {
    id: Arc<str>,
    entries: Vec<(Selector, Validator)>,
}

impl Engine {
    /// Creates a new builder for configuring an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Returns the number of registered rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Parses Markdown source and validates it.
    ///
    /// # Errors
    ///
    /// See [`Engine::validate_tree`].
    pub async fn validate_source(
        &self,
        source: &str,
        path: Option<&Path>,
    ) -> Result<Vec<Message>, EngineError> {
        let root = crate::markdown::parse(source);
        self.validate_tree(root, path).await
    }

    /// Validates a parsed tree.
    ///
    /// Messages come out in pre-order node sequence, then rule
    /// registration order, then report order.
    ///
    /// # Errors
    ///
    /// Fails the whole run if rule ids collide, a rule cannot be created,
    /// a validator errors or panics, or a reported node has no position.
    pub async fn validate_tree(
        &self,
        root: Arc<AstNode>,
        path: Option<&Path>,
    ) -> Result<Vec<Message>, EngineError> {
        let active: Vec<&RuleBox> = self
            .rules
            .iter()
            .filter(|rule| {
                let enabled = self.config.is_rule_enabled(rule.id());
                if !enabled {
                    debug!("Skipping disabled rule: {}", rule.id());
                }
                enabled
            })
            .collect();
        ensure_unique(active.iter().map(|r| r.id()))?;

        let ctx = Arc::new(
            Context::new(path.map(Path::to_path_buf)).with_annotations(Annotations::collect(&root)),
        );

        let mut compiled = Vec::with_capacity(active.len());
        for rule in active {
            let validators = rule.create(&ctx).map_err(|source| EngineError::Create {
                rule: rule.id().to_string(),
                source,
            })?;
            debug!("Rule {} registered {} validator(s)", rule.id(), validators.len());
            compiled.push(CompiledRule {
                id: Arc::from(rule.id()),
                entries: validators
                    .into_iter()
                    .map(|(text, validator)| (Selector::compile(&text), validator))
                    .collect(),
            });
        }

        for node in walk_shared(&root) {
            for rule in &compiled {
                dispatch(&ctx, rule, &node).await?;
            }
        }

        ctx.take_reports().into_iter().map(to_message).collect()
    }

    /// Reads and validates one document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file cannot be read, otherwise
    /// see [`Engine::validate_tree`].
    pub async fn validate_file(&self, path: &Path) -> Result<FileResult, EngineError> {
        debug!("Validating: {}", path.display());
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| EngineError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let messages = self.validate_source(&source, Some(path)).await?;
        Ok(FileResult::new(path, messages))
    }

    /// Validates each document in its own run.
    ///
    /// # Errors
    ///
    /// Stops at the first document whose run fails.
    pub async fn validate_files<I, P>(&self, paths: I) -> Result<LintResult, EngineError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut result = LintResult::new();
        for path in paths {
            result.files.push(self.validate_file(path.as_ref()).await?);
        }
        info!(
            "Validation complete: {} message(s) in {} file(s)",
            result.message_count(),
            result.files_checked()
        );
        Ok(result)
    }
}

/// Runs one rule's matching validators on one node and waits for all of them.
async fn dispatch(
    ctx: &Context,
    rule: &CompiledRule,
    node: &Arc<AstNode>,
) -> Result<(), EngineError> {
    let mut pending = JoinSet::new();
    let mut started = false;

    for (selector, validator) in &rule.entries {
        if !selector.matches(node) {
            continue;
        }
        if !started {
            ctx.enter_rule(&rule.id);
            started = true;
        }
        // Invoked inside the task so synchronous panics surface as join errors.
        let (validator, node) = (Arc::clone(validator), Arc::clone(node));
        pending.spawn(async move { validator(node).await });
    }
    if !started {
        return Ok(());
    }

    let mut outcome = Ok(());
    while let Some(joined) = pending.join_next().await {
        let error = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(source)) => EngineError::Validator {
                rule: rule.id.to_string(),
                kind: node.kind().to_string(),
                source,
            },
            Err(_) => EngineError::ValidatorPanicked {
                rule: rule.id.to_string(),
            },
        };
        if outcome.is_ok() {
            outcome = Err(error);
        }
    }
    ctx.exit_rule();
    outcome
}

fn to_message(report: Report) -> Result<Message, EngineError> {
    let position = report.position.ok_or_else(|| EngineError::MissingPosition {
        rule: report.rule_id.to_string(),
        kind: report.node_kind.to_string(),
    })?;
    Ok(Message::new(
        &*report.rule_id,
        report.message,
        position.end.line,
        position.end.column,
    ))
}

fn ensure_unique<'a>(ids: impl Iterator<Item = &'a str>) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(EngineError::DuplicateRuleId(id.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use crate::rule::Validators;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    type Factory = dyn Fn(&Arc<Context>) -> Result<Validators, RuleError> + Send + Sync;

    struct FnRule {
        id: &'static str,
        factory: Box<Factory>,
    }

    fn rule<F>(id: &'static str, factory: F) -> FnRule
    where
        F: Fn(&Arc<Context>) -> Result<Validators, RuleError> + Send + Sync + 'static,
    {
        FnRule {
            id,
            factory: Box::new(factory),
        }
    }

    impl Rule for FnRule {
        fn id(&self) -> &str {
            self.id
        }

        fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
            (self.factory)(ctx)
        }
    }

    /// Reports every node matching `selector` with `message`.
    fn reporting(id: &'static str, selector: &'static str, message: &'static str) -> FnRule {
        rule(id, move |ctx| {
            let ctx = Arc::clone(ctx);
            Ok(Validators::new().on(selector, move |node| ctx.report(node, message)))
        })
    }

    fn tree() -> Arc<AstNode> {
        AstNode::builder(NodeKind::Root)
            .at((1, 1), (3, 1))
            .child(
                AstNode::builder(NodeKind::Heading)
                    .depth(1)
                    .at((1, 1), (1, 8))
                    .child(
                        AstNode::builder(NodeKind::Text)
                            .value("Title")
                            .at((1, 3), (1, 8))
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    fn summary(messages: &[Message]) -> Vec<String> {
        messages.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn messages_follow_node_then_rule_order() {
        let engine = Engine::builder()
            .rule(reporting("every", "*", "seen"))
            .rule(reporting("headings", "heading", "heading"))
            .build()
            .unwrap();

        let messages = engine.validate_tree(tree(), None).await.unwrap();
        assert_eq!(
            summary(&messages),
            vec![
                "3:1: [every] seen",
                "1:8: [every] seen",
                "1:8: [headings] heading",
                "1:8: [every] seen",
            ]
        );
    }

    #[tokio::test]
    async fn one_report_per_call() {
        let engine = Engine::builder()
            .rule(rule("twice", |ctx| {
                let ctx = Arc::clone(ctx);
                Ok(Validators::new().on("text", move |node| {
                    ctx.report(node, "first")?;
                    ctx.report(node, "first")
                }))
            }))
            .build()
            .unwrap();

        let messages = engine.validate_tree(tree(), None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], messages[1]);
        assert_eq!((messages[0].line, messages[0].column), (1, 8));
    }

    #[tokio::test]
    async fn unknown_kind_never_invokes_validator() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let engine = Engine::builder()
            .rule(rule("absent", move |_| {
                let flag = Arc::clone(&flag);
                Ok(Validators::new().on("table", move |_| {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }))
            }))
            .build()
            .unwrap();

        let messages = engine.validate_tree(tree(), None).await.unwrap();
        assert!(messages.is_empty());
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn slow_validator_settles_before_next_node() {
        let engine = Engine::builder()
            .rule(rule("lookup", |ctx| {
                let slow = Arc::clone(ctx);
                let fast = Arc::clone(ctx);
                Ok(Validators::new()
                    .on_async("heading", move |node| {
                        let ctx = Arc::clone(&slow);
                        async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            ctx.report(&node, "slow")
                        }
                    })
                    .on_async("heading", move |node| {
                        let ctx = Arc::clone(&fast);
                        async move { ctx.report(&node, "fast") }
                    }))
            }))
            .rule(reporting("after", "text", "after"))
            .build()
            .unwrap();

        let messages = engine.validate_tree(tree(), None).await.unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts.len(), 3);
        assert!(texts[..2].contains(&"slow"));
        assert!(texts[..2].contains(&"fast"));
        assert_eq!(texts[2], "after");
    }

    #[tokio::test]
    async fn duplicate_ids_fail_before_traversal() {
        let visited = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&visited);
        let result = Engine::builder()
            .rule(rule("same", move |_| {
                let flag = Arc::clone(&flag);
                Ok(Validators::new().on("*", move |_| {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }))
            }))
            .rule(reporting("same", "*", "x"))
            .build();

        assert!(matches!(result, Err(EngineError::DuplicateRuleId(id)) if id == "same"));
        assert!(!visited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn create_failure_aborts_run() {
        let engine = Engine::builder()
            .rule(rule("broken", |_| Err(RuleError::Config("bad option".into()))))
            .build()
            .unwrap();

        let err = engine.validate_tree(tree(), None).await.unwrap_err();
        assert!(matches!(err, EngineError::Create { ref rule, .. } if rule == "broken"));
    }

    #[tokio::test]
    async fn report_outside_rule_is_an_error() {
        let engine = Engine::builder()
            .rule(rule("eager", |ctx| {
                ctx.report(&AstNode::text("x"), "too early")?;
                Ok(Validators::new())
            }))
            .build()
            .unwrap();

        let err = engine.validate_tree(tree(), None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Create {
                source: RuleError::NoActiveRule,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn validator_error_aborts_run() {
        let engine = Engine::builder()
            .rule(rule("failing", |_| {
                Ok(Validators::new().on_async("text", |_| async {
                    Err(RuleError::msg("service unreachable"))
                }))
            }))
            .build()
            .unwrap();

        let err = engine.validate_tree(tree(), None).await.unwrap_err();
        match err {
            EngineError::Validator { rule, kind, source } => {
                assert_eq!(rule, "failing");
                assert_eq!(kind, "text");
                assert_eq!(source.to_string(), "service unreachable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn validator_panic_aborts_run() {
        let engine = Engine::builder()
            .rule(rule("panicky", |_| {
                Ok(Validators::new().on_async("heading", |node| async move {
                    assert!(node.is_leaf(), "boom");
                    Ok(())
                }))
            }))
            .build()
            .unwrap();

        let err = engine.validate_tree(tree(), None).await.unwrap_err();
        assert!(matches!(err, EngineError::ValidatorPanicked { ref rule } if rule == "panicky"));
    }

    #[tokio::test]
    async fn sync_validator_panic_aborts_run() {
        let engine = Engine::builder()
            .rule(rule("panicky", |_| {
                Ok(Validators::new().on("heading", |node| {
                    assert!(node.is_leaf(), "boom");
                    Ok(())
                }))
            }))
            .build()
            .unwrap();

        let err = engine.validate_tree(tree(), None).await.unwrap_err();
        assert!(matches!(err, EngineError::ValidatorPanicked { ref rule } if rule == "panicky"));
    }

    #[tokio::test]
    async fn slow_rule_reports_before_next_rule() {
        let engine = Engine::builder()
            .rule(rule("r1", |ctx| {
                let ctx = Arc::clone(ctx);
                Ok(Validators::new().on_async("root", move |node| {
                    let ctx = Arc::clone(&ctx);
                    async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        ctx.report(&node, "late")
                    }
                }))
            }))
            .rule(rule("r2", |ctx| {
                let ctx = Arc::clone(ctx);
                Ok(Validators::new().on_async("root", move |node| {
                    let ctx = Arc::clone(&ctx);
                    async move { ctx.report(&node, "early") }
                }))
            }))
            .build()
            .unwrap();

        let messages = engine.validate_tree(tree(), None).await.unwrap();
        let ids: Vec<&str> = messages.iter().map(|m| m.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn report_on_node_without_position_fails() {
        let engine = Engine::builder()
            .rule(reporting("anywhere", "text", "x"))
            .build()
            .unwrap();
        let root = AstNode::builder(NodeKind::Root)
            .at((1, 1), (1, 2))
            .child(AstNode::text("x"))
            .build();

        let err = engine.validate_tree(root, None).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingPosition { ref kind, .. } if kind == "text"));
    }

    #[tokio::test]
    async fn disabled_rules_are_skipped() {
        let config = Config::parse("[rules.every]\nenabled = false\n").unwrap();
        let engine = Engine::builder()
            .rule(reporting("every", "*", "seen"))
            .rule(reporting("headings", "heading", "heading"))
            .config(config)
            .build()
            .unwrap();

        let messages = engine.validate_tree(tree(), None).await.unwrap();
        assert_eq!(summary(&messages), vec!["1:8: [headings] heading"]);
    }

    #[tokio::test]
    async fn each_run_creates_fresh_validators() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let engine = Engine::builder()
            .rule(rule("first-heading", move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                let ctx = Arc::clone(ctx);
                let seen = AtomicBool::new(false);
                Ok(Validators::new().on("heading", move |node| {
                    if !seen.swap(true, Ordering::SeqCst) {
                        ctx.report(node, "first heading")?;
                    }
                    Ok(())
                }))
            }))
            .build()
            .unwrap();

        let first = engine.validate_tree(tree(), None).await.unwrap();
        let second = engine.validate_tree(tree(), None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn front_matter_is_available_to_validators() {
        let engine = Engine::builder()
            .rule(rule("updated", |ctx| {
                let ctx = Arc::clone(ctx);
                Ok(Validators::new().on("yaml", move |node| {
                    let has_updated = ctx
                        .annotations()
                        .parsed_yaml(node)
                        .is_some_and(|value| value.get("updated").is_some());
                    if !has_updated {
                        ctx.report(node, "missing updated")?;
                    }
                    Ok(())
                }))
            }))
            .build()
            .unwrap();

        let messages = engine
            .validate_source("---\nsip: 1\n---\n\n# Title\n", None)
            .await
            .unwrap();
        assert_eq!(summary(&messages), vec!["3:4: [updated] missing updated"]);

        let messages = engine
            .validate_source("---\nsip: 1\nupdated: 2024-01-01\n---\n", None)
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn validate_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sip-1.md");
        std::fs::write(&path, "# Title\n").unwrap();

        let engine = Engine::builder()
            .rule(rule("path", |ctx| {
                let ctx = Arc::clone(ctx);
                Ok(Validators::new().on("root", move |node| {
                    if ctx.file_name() == Some("sip-1.md") {
                        ctx.report(node, "has path")?;
                    }
                    Ok(())
                }))
            }))
            .build()
            .unwrap();

        let result = engine.validate_files([&path]).await.unwrap();
        assert_eq!(result.files_checked(), 1);
        assert_eq!(result.files[0].file_path, path);
        assert_eq!(result.files[0].messages[0].message, "has path");

        let missing = engine.validate_file(&dir.path().join("nope.md")).await;
        assert!(matches!(missing, Err(EngineError::Io { .. })));
    }
}
