//! Rule requiring the CC0 copyright postamble.
//!
//! The document must end with:
//!
//! ```markdown
//! ## Copyright
//!
//! Copyright and related rights waived via [CC0](../LICENSE).
//! ```
//!
//! Trailing inline content after the link (such as the final period) is
//! allowed.

use sip_lint_core::{AstNode, Context, NodeKind, Rule, RuleError, Validators};
use std::sync::Arc;

/// Rule id for copyright.
pub const NAME: &str = "copyright";

const HEADING: &str = "Copyright";
const WAIVER: &str = "Copyright and related rights waived via ";
const LICENSE_URL: &str = "../LICENSE";
const LICENSE_TEXT: &str = "CC0";

type Check = fn(&AstNode) -> bool;

/// Checks the last two top-level blocks of the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Copyright;

impl Copyright {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for Copyright {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Document must end with the CC0 copyright postamble"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let ctx = Arc::clone(ctx);
        Ok(Validators::new().on("root", move |root| {
            let children = root.children().unwrap_or_default();
            let found = match children {
                [.., heading, paragraph] => {
                    is_copyright_heading(heading) && is_waiver_paragraph(paragraph)
                }
                _ => false,
            };
            if !found {
                ctx.report(root, "No copyright postamble found or is malformed")?;
            }
            Ok(())
        }))
    }
}

fn is_copyright_heading(node: &AstNode) -> bool {
    let expected: [Check; 1] = [|n| is_text(n, HEADING)];
    *node.kind() == NodeKind::Heading && node.depth() == Some(2) && starts_with(node, &expected)
}

fn is_waiver_paragraph(node: &AstNode) -> bool {
    let expected: [Check; 2] = [|n| is_text(n, WAIVER), is_license_link];
    *node.kind() == NodeKind::Paragraph && starts_with(node, &expected)
}

fn is_license_link(node: &AstNode) -> bool {
    let expected: [Check; 1] = [|n| is_text(n, LICENSE_TEXT)];
    *node.kind() == NodeKind::Link
        && node.url() == Some(LICENSE_URL)
        && starts_with(node, &expected)
}

fn is_text(node: &AstNode, value: &str) -> bool {
    *node.kind() == NodeKind::Text && node.value() == Some(value)
}

/// Tests the leading children of `node` against `expected`, one predicate each.
fn starts_with(node: &AstNode, expected: &[Check]) -> bool {
    let children = node.children().unwrap_or_default();
    children.len() >= expected.len()
        && children
            .iter()
            .zip(expected)
            .all(|(child, matches)| matches(child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{run, run_tree};

    const POSTAMBLE: &str =
        "## Copyright\n\nCopyright and related rights waived via [CC0](../LICENSE).\n";

    fn heading() -> Arc<AstNode> {
        AstNode::builder(NodeKind::Heading)
            .depth(2)
            .at((3, 1), (3, 13))
            .child(AstNode::text(HEADING))
            .build()
    }

    fn paragraph() -> Arc<AstNode> {
        AstNode::builder(NodeKind::Paragraph)
            .at((5, 1), (5, 59))
            .child(AstNode::text(WAIVER))
            .child(
                AstNode::builder(NodeKind::Link)
                    .url(LICENSE_URL)
                    .child(AstNode::text(LICENSE_TEXT))
                    .build(),
            )
            .build()
    }

    #[tokio::test]
    async fn test_trailing_pair_passes() {
        let root = AstNode::builder(NodeKind::Root)
            .at((1, 1), (6, 1))
            .child(heading())
            .child(paragraph())
            .build();
        assert!(run_tree(Copyright::new(), root).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_paragraph_reports_once() {
        let root = AstNode::builder(NodeKind::Root)
            .at((1, 1), (6, 1))
            .child(heading())
            .build();
        let messages = run_tree(Copyright::new(), root).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].rule_id, NAME);
        assert_eq!(
            messages[0].message,
            "No copyright postamble found or is malformed"
        );
        assert_eq!((messages[0].line, messages[0].column), (6, 1));
    }

    #[tokio::test]
    async fn test_parsed_document() {
        let source = format!("# SIP-1\n\nBody.\n\n{POSTAMBLE}");
        assert!(run(Copyright::new(), &source, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_postamble_not_last() {
        let source = format!("# SIP-1\n\n{POSTAMBLE}\nMore text.\n");
        assert_eq!(run(Copyright::new(), &source, None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_license_target() {
        let source = POSTAMBLE.replace("../LICENSE", "LICENSE");
        assert_eq!(run(Copyright::new(), &source, None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_heading_depth() {
        let source = POSTAMBLE.replace("## Copyright", "### Copyright");
        assert_eq!(run(Copyright::new(), &source, None).await.len(), 1);
    }
}
