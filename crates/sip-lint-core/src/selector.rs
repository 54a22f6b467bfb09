//! Selector compilation.
//!
//! Two forms are understood: `*` matches every node, anything else is an
//! exact kind name. A name no parser produces simply never matches.

use crate::ast::AstNode;

/// A compiled node predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `*`, matches every node including the root.
    Any,
    /// Matches nodes whose kind name equals the string.
    Kind(String),
}

impl Selector {
    /// Compiles selector text into a predicate.
    #[must_use]
    pub fn compile(text: &str) -> Self {
        if text == "*" {
            Self::Any
        } else {
            Self::Kind(text.to_string())
        }
    }

    /// Tests a node against this selector.
    #[must_use]
    pub fn matches(&self, node: &AstNode) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(name) => node.kind().name() == name,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Kind(name) => f.write_str(name),
        }
    }
}
