//! Front-matter enrichment.
//!
//! Runs once before traversal and parses the text of every `yaml` node.
//! Results live in a side table keyed by [`NodeId`] so the tree itself is
//! never touched during a run.

use crate::ast::{AstNode, NodeId, NodeKind};

use std::collections::HashMap;
use tracing::debug;

/// Outcome of parsing one front-matter block.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedYaml {
    /// The block parsed successfully.
    Parsed(serde_yaml::Value),
    /// The block is not valid YAML; holds the parser's message.
    Invalid(String),
}

impl ParsedYaml {
    /// Returns the parsed value, if parsing succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&serde_yaml::Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Invalid(_) => None,
        }
    }
}

/// Side table of enrichment results for one tree.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    yaml: HashMap<NodeId, ParsedYaml>,
}

impl Annotations {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every `yaml` node under `root`.
    #[must_use]
    pub fn collect(root: &AstNode) -> Self {
        let mut annotations = Self::new();
        for node in root.walk().filter(|n| *n.kind() == NodeKind::Yaml) {
            let source = node.value().unwrap_or_default();
            // An empty block is a null document.
            if source.trim().is_empty() {
                annotations
                    .yaml
                    .insert(node.id(), ParsedYaml::Parsed(serde_yaml::Value::Null));
                continue;
            }
            let parsed = match serde_yaml::from_str::<serde_yaml::Value>(source) {
                Ok(value) => ParsedYaml::Parsed(value),
                Err(e) => {
                    debug!("Front-matter failed to parse: {e}");
                    ParsedYaml::Invalid(e.to_string())
                }
            };
            annotations.yaml.insert(node.id(), parsed);
        }
        annotations
    }

    /// Parse result for a `yaml` node.
    #[must_use]
    pub fn yaml(&self, node: &AstNode) -> Option<&ParsedYaml> {
        self.yaml.get(&node.id())
    }

    /// Parsed value for a `yaml` node, if it parsed.
    #[must_use]
    pub fn parsed_yaml(&self, node: &AstNode) -> Option<&serde_yaml::Value> {
        self.yaml(node).and_then(ParsedYaml::value)
    }

    /// Number of annotated nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.yaml.len()
    }

    /// Returns true if no node was annotated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.yaml.is_empty()
    }
}
