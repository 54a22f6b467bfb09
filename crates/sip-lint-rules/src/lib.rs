//! # sip-lint-rules
//!
//! Built-in validation rules for sip-lint.
//!
//! ## Available Rules
//!
//! | Id | Selector | Description |
//! |----|----------|-------------|
//! | `yaml` | `yaml` | Front-matter must be valid YAML |
//! | `preamble-exists` | `root` | Exactly one preamble |
//! | `preamble-data` | `yaml` | Preamble headers follow the schema |
//! | `preamble-order` | `yaml` | Preamble headers are in canonical order |
//! | `preamble-filename` | `yaml` | `sip` header matches `sip-N.md` |
//! | `filename` | `root` | File name is `sip-N.md` |
//! | `copyright` | `root` | Document ends with the CC0 postamble |
//! | `git-updated` | `yaml` | `updated` is not older than the last commit |
//! | `bad-link` | `root` | External links are reachable |
//!
//! The preamble rules only look at the first parsed front-matter block.
//!
//! ## Usage
//!
//! ```ignore
//! use sip_lint_core::Engine;
//! use sip_lint_rules::{Copyright, Filename};
//!
//! let engine = Engine::builder()
//!     .rule(Filename::new())
//!     .rule(Copyright::new())
//!     .build()?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bad_link;
mod copyright;
mod filename;
mod git_updated;
pub mod preamble;
mod preamble_data;
mod preamble_exists;
mod preamble_filename;
mod preamble_order;
mod presets;
mod valid_yaml;

pub use bad_link::BadLink;
pub use copyright::Copyright;
pub use filename::Filename;
pub use git_updated::{GitUpdated, ReferenceDate};
pub use preamble_data::PreambleData;
pub use preamble_exists::PreambleExists;
pub use preamble_filename::PreambleFilename;
pub use preamble_order::PreambleOrder;
pub use presets::{
    all_rules, minimal_rules, recommended_rules, rules_from_config, strict_rules, Preset,
};
pub use valid_yaml::ValidYaml;

/// Re-export core types for convenience.
pub use sip_lint_core::{Message, Rule};

#[cfg(test)]
pub(crate) mod test_utils {
    use sip_lint_core::{AstNode, Engine, Message, Rule};
    use std::path::Path;
    use std::sync::Arc;

    /// Parses `source` and runs a single rule over it.
    pub(crate) async fn run(
        rule: impl Rule + 'static,
        source: &str,
        path: Option<&Path>,
    ) -> Vec<Message> {
        let engine = Engine::builder().rule(rule).build().unwrap();
        engine.validate_source(source, path).await.unwrap()
    }

    /// Runs a single rule over a prebuilt tree.
    pub(crate) async fn run_tree(rule: impl Rule + 'static, root: Arc<AstNode>) -> Vec<Message> {
        let engine = Engine::builder().rule(rule).build().unwrap();
        engine.validate_tree(root, None).await.unwrap()
    }
}
