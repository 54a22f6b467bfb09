//! Document tree model.
//!
//! The tree is built once per document and is read-only afterwards. Nodes
//! are shared through [`Arc`] so validators can hold on to them across
//! `.await` points without borrowing from the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a node.
///
/// Used to key side tables (see [`crate::Annotations`]) instead of
/// attaching data to the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A point in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
    /// Byte offset from the start of the document, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl Point {
    /// Creates a point without byte offset.
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            offset: None,
        }
    }

    /// Sets the byte offset.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Source span of a node. `end` points just past the last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// First character of the node.
    pub start: Point,
    /// One past the last character of the node.
    pub end: Point,
}

impl Position {
    /// Creates a span from `(line, column)` pairs.
    #[must_use]
    pub fn new(start: (usize, usize), end: (usize, usize)) -> Self {
        Self {
            start: Point::new(start.0, start.1),
            end: Point::new(end.0, end.1),
        }
    }
}

/// Node type tag.
///
/// Names follow mdast. Kinds the engine does not know about are carried as
/// [`NodeKind::Other`] so parser extensions can introduce them freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root.
    Root,
    /// YAML front-matter block.
    Yaml,
    /// `# Heading`.
    Heading,
    /// Paragraph.
    Paragraph,
    /// Plain text run.
    Text,
    /// `*emphasis*`.
    Emphasis,
    /// `**strong**`.
    Strong,
    /// `~~strikethrough~~`.
    Delete,
    /// `` `code` ``.
    InlineCode,
    /// Fenced or indented code block.
    Code,
    /// Raw HTML.
    Html,
    /// Inline link.
    Link,
    /// Inline image.
    Image,
    /// Link reference definition (`[id]: url`).
    Definition,
    /// Block quote.
    Blockquote,
    /// Ordered or bullet list.
    List,
    /// Item of a list.
    ListItem,
    /// GFM table.
    Table,
    /// Row of a table.
    TableRow,
    /// Cell of a table row.
    TableCell,
    /// Hard line break.
    Break,
    /// `---` between blocks.
    ThematicBreak,
    /// `[^label]: ...`.
    FootnoteDefinition,
    /// `[^label]`.
    FootnoteReference,
    /// Any kind the engine has no dedicated variant for.
    Other(String),
}

impl NodeKind {
    /// Returns the mdast name of this kind.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Root => "root",
            Self::Yaml => "yaml",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Text => "text",
            Self::Emphasis => "emphasis",
            Self::Strong => "strong",
            Self::Delete => "delete",
            Self::InlineCode => "inlineCode",
            Self::Code => "code",
            Self::Html => "html",
            Self::Link => "link",
            Self::Image => "image",
            Self::Definition => "definition",
            Self::Blockquote => "blockquote",
            Self::List => "list",
            Self::ListItem => "listItem",
            Self::Table => "table",
            Self::TableRow => "tableRow",
            Self::TableCell => "tableCell",
            Self::Break => "break",
            Self::ThematicBreak => "thematicBreak",
            Self::FootnoteDefinition => "footnoteDefinition",
            Self::FootnoteReference => "footnoteReference",
            Self::Other(name) => name,
        }
    }

    /// Parses an mdast name. Unknown names become [`NodeKind::Other`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "root" => Self::Root,
            "yaml" => Self::Yaml,
            "heading" => Self::Heading,
            "paragraph" => Self::Paragraph,
            "text" => Self::Text,
            "emphasis" => Self::Emphasis,
            "strong" => Self::Strong,
            "delete" => Self::Delete,
            "inlineCode" => Self::InlineCode,
            "code" => Self::Code,
            "html" => Self::Html,
            "link" => Self::Link,
            "image" => Self::Image,
            "definition" => Self::Definition,
            "blockquote" => Self::Blockquote,
            "list" => Self::List,
            "listItem" => Self::ListItem,
            "table" => Self::Table,
            "tableRow" => Self::TableRow,
            "tableCell" => Self::TableCell,
            "break" => Self::Break,
            "thematicBreak" => Self::ThematicBreak,
            "footnoteDefinition" => Self::FootnoteDefinition,
            "footnoteReference" => Self::FootnoteReference,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether nodes of this kind hold children.
    ///
    /// [`NodeKind::Other`] is decided by the builder: it becomes a parent
    /// only once a child is added.
    #[must_use]
    pub fn is_parent(&self) -> bool {
        matches!(
            self,
            Self::Root
                | Self::Heading
                | Self::Paragraph
                | Self::Emphasis
                | Self::Strong
                | Self::Delete
                | Self::Link
                | Self::Blockquote
                | Self::List
                | Self::ListItem
                | Self::Table
                | Self::TableRow
                | Self::TableCell
                | Self::FootnoteDefinition
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for NodeKind {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// Kind-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeData {
    /// No payload.
    #[default]
    None,
    /// Raw text (`text`, `yaml`, `inlineCode`, `html`).
    Literal {
        /// The raw text.
        value: String,
    },
    /// Heading depth, 1 through 6.
    Heading {
        /// Depth of the heading.
        depth: u8,
    },
    /// Code block body and info string.
    Code {
        /// Language from the info string, if any.
        lang: Option<String>,
        /// Body of the block.
        value: String,
    },
    /// Target of a `link` or `image`.
    Resource {
        /// Destination URL as written.
        url: String,
        /// Optional title.
        title: Option<String>,
    },
    /// Link reference definition.
    Definition {
        /// Normalized label.
        identifier: String,
        /// Destination URL as written.
        url: String,
        /// Optional title.
        title: Option<String>,
    },
    /// List attributes.
    List {
        /// `1.` style list.
        ordered: bool,
        /// Start number of an ordered list.
        start: Option<u64>,
    },
    /// Footnote label.
    Footnote {
        /// Label without the caret.
        label: String,
    },
}

/// A node of the document tree.
#[derive(Debug)]
pub struct AstNode {
    id: NodeId,
    kind: NodeKind,
    position: Option<Position>,
    children: Option<Vec<Arc<AstNode>>>,
    data: NodeData,
}

impl AstNode {
    /// Starts building a node of the given kind.
    #[must_use]
    pub fn builder(kind: impl Into<NodeKind>) -> NodeBuilder {
        NodeBuilder::new(kind.into())
    }

    /// Shorthand for a `text` leaf without position.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Arc<Self> {
        Self::builder(NodeKind::Text).value(value).build()
    }

    /// Identity of this node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Kind tag.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Source span, if the producer recorded one.
    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Children, or `None` for leaves.
    #[must_use]
    pub fn children(&self) -> Option<&[Arc<AstNode>]> {
        self.children.as_deref()
    }

    /// Whether the node is a leaf (no children field at all).
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Kind-specific payload.
    #[must_use]
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Raw text of literal and code nodes.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match &self.data {
            NodeData::Literal { value } | NodeData::Code { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Destination URL of links, images and definitions.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match &self.data {
            NodeData::Resource { url, .. } | NodeData::Definition { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Depth of a heading.
    #[must_use]
    pub fn depth(&self) -> Option<u8> {
        match self.data {
            NodeData::Heading { depth } => Some(depth),
            _ => None,
        }
    }

    /// Concatenated text of all `text` and `inlineCode` descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in self.walk() {
            if matches!(node.kind, NodeKind::Text | NodeKind::InlineCode) {
                if let Some(value) = node.value() {
                    out.push_str(value);
                }
            }
        }
        out
    }

    /// Pre-order, depth-first iterator over this node and its descendants.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`AstNode::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(children) = &node.children {
            self.stack.extend(children.iter().rev().map(|child| &**child));
        }
        Some(node)
    }
}

/// Pre-order walk that yields the shared handles instead of references.
///
/// The engine uses this form so that each visited node can be handed to
/// asynchronous validators.
#[must_use]
pub fn walk_shared(root: &Arc<AstNode>) -> Vec<Arc<AstNode>> {
    let mut out = Vec::new();
    let mut stack = vec![Arc::clone(root)];
    while let Some(node) = stack.pop() {
        if let Some(children) = &node.children {
            stack.extend(children.iter().rev().cloned());
        }
        out.push(node);
    }
    out
}

/// Builder for [`AstNode`].
#[derive(Debug)]
pub struct NodeBuilder {
    kind: NodeKind,
    position: Option<Position>,
    children: Option<Vec<Arc<AstNode>>>,
    data: NodeData,
}

impl NodeBuilder {
    fn new(kind: NodeKind) -> Self {
        let children = kind.is_parent().then(Vec::new);
        Self {
            kind,
            position: None,
            children,
            data: NodeData::None,
        }
    }

    /// Sets the source span.
    #[must_use]
    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the source span from `(line, column)` pairs.
    #[must_use]
    pub fn at(self, start: (usize, usize), end: (usize, usize)) -> Self {
        self.position(Position::new(start, end))
    }

    /// Sets the payload.
    #[must_use]
    pub fn data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    /// Sets a [`NodeData::Literal`] payload.
    #[must_use]
    pub fn value(self, value: impl Into<String>) -> Self {
        self.data(NodeData::Literal {
            value: value.into(),
        })
    }

    /// Sets a [`NodeData::Resource`] payload.
    #[must_use]
    pub fn url(self, url: impl Into<String>) -> Self {
        self.data(NodeData::Resource {
            url: url.into(),
            title: None,
        })
    }

    /// Sets a [`NodeData::Heading`] payload.
    #[must_use]
    pub fn depth(self, depth: u8) -> Self {
        self.data(NodeData::Heading { depth })
    }

    /// Appends a child, turning the node into a parent if needed.
    #[must_use]
    pub fn child(mut self, child: Arc<AstNode>) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    /// Appends several children.
    #[must_use]
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Arc<AstNode>>,
    {
        self.children.get_or_insert_with(Vec::new).extend(children);
        self
    }

    /// Finishes the node.
    #[must_use]
    pub fn build(self) -> Arc<AstNode> {
        Arc::new(AstNode {
            id: NodeId::next(),
            kind: self.kind,
            position: self.position,
            children: self.children,
            data: self.data,
        })
    }
}
