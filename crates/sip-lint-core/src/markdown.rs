//! Markdown parser adapter.
//!
//! Builds the document tree from Markdown source with `pulldown-cmark`.
//! Kind names follow mdast so rules can be written against the usual
//! vocabulary (`root`, `yaml`, `heading`, `paragraph`, `link`, ...).

use crate::ast::{AstNode, NodeData, NodeKind, Point, Position};

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, MetadataBlockKind, Options, Parser, Tag};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Parses Markdown with an optional leading YAML front-matter block.
#[must_use]
pub fn parse(source: &str) -> Arc<AstNode> {
    let index = LineIndex::new(source);

    // pulldown-cmark reads an empty block as two thematic breaks. Blank the
    // fences out (offsets unchanged) and add the `yaml` node afterwards.
    let empty_yaml = empty_front_matter(source);
    let masked;
    let text = match &empty_yaml {
        Some(span) => {
            masked = blank_out(source, span.clone());
            masked.as_str()
        }
        None => source,
    };
    let parser = Parser::new_ext(text, options());

    let definitions: Vec<(usize, Arc<AstNode>)> = parser
        .reference_definitions()
        .iter()
        .map(|(label, def)| {
            let span = trim_span(source, def.span.clone());
            let node = AstNode::builder(NodeKind::Definition)
                .position(index.position(span.clone()))
                .data(NodeData::Definition {
                    identifier: label.to_lowercase(),
                    url: def.dest.to_string(),
                    title: def.title.as_ref().map(ToString::to_string),
                })
                .build();
            (span.start, node)
        })
        .collect();

    let mut stack = vec![Frame::new(NodeKind::Root, NodeData::None, 0..source.len())];

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(tag) => {
                let (kind, data) = map_tag(&tag);
                stack.push(Frame::new(kind, data, range));
            }
            Event::End(_) => {
                // The root frame is never popped by an end event.
                if stack.len() > 1 {
                    if let Some(frame) = stack.pop() {
                        let node = frame.finish(&index);
                        if let Some(parent) = stack.last_mut() {
                            parent.push_child(node, &index);
                        }
                    }
                }
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.push_text(&text, range);
                }
            }
            Event::SoftBreak => {
                if let Some(frame) = stack.last_mut() {
                    frame.push_text("\n", range);
                }
            }
            Event::Code(code) => push_leaf(
                &mut stack,
                &index,
                NodeKind::InlineCode,
                NodeData::Literal {
                    value: code.to_string(),
                },
                range,
            ),
            Event::Html(html) | Event::InlineHtml(html) => {
                let in_block = stack
                    .last()
                    .is_some_and(|frame| frame.literal.is_some() && frame.kind == NodeKind::Html);
                if in_block {
                    if let Some(frame) = stack.last_mut() {
                        frame.push_text(&html, range);
                    }
                } else {
                    push_leaf(
                        &mut stack,
                        &index,
                        NodeKind::Html,
                        NodeData::Literal {
                            value: html.to_string(),
                        },
                        range,
                    );
                }
            }
            Event::HardBreak => push_leaf(&mut stack, &index, NodeKind::Break, NodeData::None, range),
            Event::Rule => push_leaf(
                &mut stack,
                &index,
                NodeKind::ThematicBreak,
                NodeData::None,
                range,
            ),
            Event::FootnoteReference(label) => push_leaf(
                &mut stack,
                &index,
                NodeKind::FootnoteReference,
                NodeData::Footnote {
                    label: label.to_string(),
                },
                range,
            ),
            _ => {}
        }
    }

    // Unbalanced input cannot happen with pulldown-cmark, but fold any
    // leftover frames so no content is lost.
    while stack.len() > 1 {
        if let Some(frame) = stack.pop() {
            let node = frame.finish(&index);
            if let Some(parent) = stack.last_mut() {
                parent.push_child(node, &index);
            }
        }
    }

    let mut root = match stack.pop() {
        Some(frame) => frame,
        None => Frame::new(NodeKind::Root, NodeData::None, 0..source.len()),
    };
    root.flush_text(&index);

    if let Some(span) = empty_yaml {
        let yaml = AstNode::builder(NodeKind::Yaml)
            .value("")
            .position(index.position(trim_span(source, span)))
            .build();
        root.children.insert(0, yaml);
    }

    if !definitions.is_empty() {
        debug!("Found {} link reference definition(s)", definitions.len());
        let mut children: Vec<(usize, Arc<AstNode>)> = root
            .children
            .drain(..)
            .map(|child| {
                let start = child
                    .position()
                    .and_then(|p| p.start.offset)
                    .unwrap_or(0);
                (start, child)
            })
            .chain(definitions)
            .collect();
        children.sort_by_key(|(start, _)| *start);
        root.children = children.into_iter().map(|(_, child)| child).collect();
    }

    root.finish(&index)
}

/// Span of a leading `---` / `---` pair with nothing in between.
fn empty_front_matter(source: &str) -> Option<Range<usize>> {
    let mut lines = source.split_inclusive('\n');
    let first = lines.next()?;
    let second = lines.next()?;
    let is_fence = |line: &str| line.trim_end_matches(|c: char| c == '\n' || c == '\r') == "---";
    (is_fence(first) && is_fence(second)).then(|| 0..first.len() + second.len())
}

/// Replaces everything but line breaks in `span` with spaces.
fn blank_out(source: &str, span: Range<usize>) -> String {
    let blank: String = source[span.clone()]
        .chars()
        .map(|c| if c == '\n' || c == '\r' { c } else { ' ' })
        .collect();
    let mut out = String::with_capacity(source.len());
    out.push_str(&source[..span.start]);
    out.push_str(&blank);
    out.push_str(&source[span.end..]);
    out
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
}

fn map_tag(tag: &Tag<'_>) -> (NodeKind, NodeData) {
    match tag {
        Tag::Paragraph => (NodeKind::Paragraph, NodeData::None),
        Tag::Heading { level, .. } => (
            NodeKind::Heading,
            NodeData::Heading {
                depth: heading_depth(*level),
            },
        ),
        Tag::BlockQuote => (NodeKind::Blockquote, NodeData::None),
        Tag::CodeBlock(kind) => {
            let lang = match kind {
                CodeBlockKind::Fenced(info) => info
                    .split_whitespace()
                    .next()
                    .map(ToString::to_string),
                CodeBlockKind::Indented => None,
            };
            (
                NodeKind::Code,
                NodeData::Code {
                    lang,
                    value: String::new(),
                },
            )
        }
        Tag::HtmlBlock => (NodeKind::Html, NodeData::None),
        Tag::List(start) => (
            NodeKind::List,
            NodeData::List {
                ordered: start.is_some(),
                start: *start,
            },
        ),
        Tag::Item => (NodeKind::ListItem, NodeData::None),
        Tag::FootnoteDefinition(label) => (
            NodeKind::FootnoteDefinition,
            NodeData::Footnote {
                label: label.to_string(),
            },
        ),
        Tag::Table(_) => (NodeKind::Table, NodeData::None),
        Tag::TableHead | Tag::TableRow => (NodeKind::TableRow, NodeData::None),
        Tag::TableCell => (NodeKind::TableCell, NodeData::None),
        Tag::Emphasis => (NodeKind::Emphasis, NodeData::None),
        Tag::Strong => (NodeKind::Strong, NodeData::None),
        Tag::Strikethrough => (NodeKind::Delete, NodeData::None),
        Tag::Link {
            dest_url, title, ..
        } => (NodeKind::Link, resource(dest_url, title)),
        Tag::Image {
            dest_url, title, ..
        } => (NodeKind::Image, resource(dest_url, title)),
        Tag::MetadataBlock(MetadataBlockKind::YamlStyle) => (NodeKind::Yaml, NodeData::None),
        Tag::MetadataBlock(MetadataBlockKind::PlusesStyle) => {
            (NodeKind::Other("toml".to_string()), NodeData::None)
        }
        #[allow(unreachable_patterns)]
        _ => (NodeKind::Other("unknown".to_string()), NodeData::None),
    }
}

fn resource(url: &str, title: &str) -> NodeData {
    NodeData::Resource {
        url: url.to_string(),
        title: (!title.is_empty()).then(|| title.to_string()),
    }
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn push_leaf(
    stack: &mut [Frame],
    index: &LineIndex,
    kind: NodeKind,
    data: NodeData,
    range: Range<usize>,
) {
    let node = AstNode::builder(kind)
        .data(data)
        .position(index.position(range))
        .build();
    if let Some(frame) = stack.last_mut() {
        frame.push_child(node, index);
    }
}

/// Drops trailing whitespace from a span.
fn trim_span(source: &str, span: Range<usize>) -> Range<usize> {
    let end = span.end.min(source.len());
    let start = span.start.min(end);
    let trimmed = source[start..end].trim_end();
    start..start + trimmed.len()
}

/// Text run being merged from consecutive text events.
struct TextRun {
    value: String,
    range: Range<usize>,
}

/// Open element on the parse stack.
struct Frame {
    kind: NodeKind,
    data: NodeData,
    range: Range<usize>,
    children: Vec<Arc<AstNode>>,
    text: Option<TextRun>,
    /// Accumulates raw text for `yaml`, `code` and block `html`.
    literal: Option<String>,
}

impl Frame {
    fn new(kind: NodeKind, data: NodeData, range: Range<usize>) -> Self {
        let literal = matches!(
            kind,
            NodeKind::Yaml | NodeKind::Code | NodeKind::Html | NodeKind::Other(_)
        )
        .then(String::new);
        Self {
            kind,
            data,
            range,
            children: Vec::new(),
            text: None,
            literal,
        }
    }

    fn push_text(&mut self, text: &str, range: Range<usize>) {
        if let Some(literal) = &mut self.literal {
            literal.push_str(text);
            return;
        }
        match &mut self.text {
            Some(run) => {
                run.value.push_str(text);
                run.range.end = range.end;
            }
            None => {
                self.text = Some(TextRun {
                    value: text.to_string(),
                    range,
                });
            }
        }
    }

    fn flush_text(&mut self, index: &LineIndex) {
        if let Some(run) = self.text.take() {
            let node = AstNode::builder(NodeKind::Text)
                .value(run.value)
                .position(index.position(run.range))
                .build();
            self.children.push(node);
        }
    }

    fn push_child(&mut self, node: Arc<AstNode>, index: &LineIndex) {
        self.flush_text(index);
        self.children.push(node);
    }

    fn finish(mut self, index: &LineIndex) -> Arc<AstNode> {
        self.flush_text(index);
        let range = match self.kind {
            NodeKind::Root => self.range.clone(),
            _ => trim_span(index.source, self.range.clone()),
        };

        let data = match (self.data, self.literal.take()) {
            (NodeData::Code { lang, .. }, Some(value)) => NodeData::Code {
                lang,
                value: strip_newline(value),
            },
            (NodeData::None, Some(value)) => NodeData::Literal {
                value: strip_newline(value),
            },
            (data, _) => data,
        };

        let children = match self.kind {
            // Items of tight lists hold inline content directly.
            NodeKind::ListItem => wrap_phrasing(self.children),
            _ => self.children,
        };

        let mut builder = AstNode::builder(self.kind.clone())
            .data(data)
            .position(index.position(range));
        // Image alt text is not kept as children.
        if self.kind != NodeKind::Image && !children.is_empty() {
            builder = builder.children(children);
        }
        builder.build()
    }
}

fn is_phrasing(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Text
            | NodeKind::Emphasis
            | NodeKind::Strong
            | NodeKind::Delete
            | NodeKind::InlineCode
            | NodeKind::Link
            | NodeKind::Image
            | NodeKind::Break
            | NodeKind::FootnoteReference
    )
}

/// Groups consecutive inline children into paragraphs.
fn wrap_phrasing(children: Vec<Arc<AstNode>>) -> Vec<Arc<AstNode>> {
    let mut out = Vec::with_capacity(children.len());
    let mut run = Vec::new();
    for child in children {
        if is_phrasing(child.kind()) {
            run.push(child);
        } else {
            if !run.is_empty() {
                out.push(paragraph(std::mem::take(&mut run)));
            }
            out.push(child);
        }
    }
    if !run.is_empty() {
        out.push(paragraph(run));
    }
    out
}

fn paragraph(run: Vec<Arc<AstNode>>) -> Arc<AstNode> {
    let start = run.first().and_then(|n| n.position()).map(|p| p.start);
    let end = run.last().and_then(|n| n.position()).map(|p| p.end);
    let mut builder = AstNode::builder(NodeKind::Paragraph);
    if let (Some(start), Some(end)) = (start, end) {
        builder = builder.position(Position { start, end });
    }
    builder.children(run).build()
}

fn strip_newline(mut value: String) -> String {
    if value.ends_with('\n') {
        value.pop();
    }
    value
}

/// Maps byte offsets to 1-indexed line/column points.
struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    fn point(&self, offset: usize) -> Point {
        let offset = offset.min(self.source.len());
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let column = self
            .source
            .get(line_start..offset)
            .map_or(0, |s| s.chars().count())
            + 1;
        Point::new(line, column).with_offset(offset)
    }

    fn position(&self, range: Range<usize>) -> Position {
        Position {
            start: self.point(range.start),
            end: self.point(range.end),
        }
    }
}
