//! # sip-lint-core
//!
//! Rule-dispatch engine for linting Markdown proposal documents.
//!
//! A document is parsed into a tree of [`AstNode`]s. Rules register
//! validators against node kinds through selectors; the [`Engine`] walks the
//! tree depth-first and invokes every matching validator, awaiting
//! asynchronous ones before moving on. Validators report findings through
//! the run's [`Context`], and the engine turns them into positioned
//! [`Message`]s.
//!
//! - [`Rule`] trait for validation logic
//! - [`Engine`] for orchestrating runs
//! - [`markdown::parse`] for building trees from Markdown
//! - [`Message`] for representing findings
//!
//! ## Example
//!
//! ```ignore
//! use sip_lint_core::Engine;
//!
//! let engine = Engine::builder()
//!     .rule(MyRule::new())
//!     .build()?;
//!
//! let messages = engine.validate_source(source, Some(path)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod annotate;
mod ast;
mod config;
mod context;
mod engine;
mod rule;
mod selector;
mod types;

pub mod markdown;

pub use annotate::{Annotations, ParsedYaml};
pub use ast::{walk_shared, AstNode, NodeBuilder, NodeData, NodeId, NodeKind, Point, Position, Walk};
pub use config::{Config, ConfigError, RuleConfig, ValidatorConfig};
pub use context::{Context, Report};
pub use engine::{Engine, EngineBuilder, EngineError};
pub use rule::{Rule, RuleBox, RuleError, Validator, ValidatorFuture, Validators};
pub use selector::Selector;
pub use types::{offset_for, FileResult, LintResult, Message, MessageDiagnostic};
