//! Core types for validation messages and results.

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A positioned, rule-attributed finding.
///
/// `line`/`column` are the end point of the reported node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Id of the rule that produced the message.
    pub rule_id: String,
    /// Human-readable message.
    pub message: String,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub fn new(
        rule_id: impl Into<String>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}",
            self.line, self.column, self.rule_id, self.message
        )
    }
}

/// Messages produced for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    /// Path of the validated document.
    pub file_path: PathBuf,
    /// Messages in emission order.
    pub messages: Vec<Message>,
}

impl FileResult {
    /// Creates a result for one document.
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>, messages: Vec<Message>) -> Self {
        Self {
            file_path: file_path.into(),
            messages,
        }
    }

    /// Returns true if the document passed every rule.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Result of validating a set of documents.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LintResult {
    /// One entry per validated document.
    pub files: Vec<FileResult>,
}

impl LintResult {
    /// Creates a new empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any document produced a message.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.files.iter().any(|f| !f.is_clean())
    }

    /// Total number of messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.files.iter().map(|f| f.messages.len()).sum()
    }

    /// Number of documents validated.
    #[must_use]
    pub fn files_checked(&self) -> usize {
        self.files.len()
    }

    /// Iterates `(path, message)` pairs in order.
    pub fn messages(&self) -> impl Iterator<Item = (&std::path::Path, &Message)> {
        self.files.iter().flat_map(|f| {
            f.messages
                .iter()
                .map(move |m| (f.file_path.as_path(), m))
        })
    }

    /// Formats messages as a failure report.
    #[must_use]
    pub fn format_report(&self) -> String {
        use std::fmt::Write;

        let mut report = String::new();
        for (path, m) in self.messages() {
            let _ = writeln!(report, "error[{}]: {}", m.rule_id, m.message);
            let _ = writeln!(report, "  -> {}:{}:{}", path.display(), m.line, m.column);
            let _ = writeln!(report);
        }
        let _ = writeln!(
            report,
            "Found {} problem(s) in {} file(s)",
            self.message_count(),
            self.files_checked()
        );
        report
    }
}

/// Byte offset of a 1-indexed `(line, column)` in `content`.
///
/// Columns count characters. Out-of-range positions clamp to the end.
#[must_use]
pub fn offset_for(content: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }

    let mut offset = 0;
    for (i, line_content) in content.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            let within = line_content
                .char_indices()
                .nth(column.saturating_sub(1))
                .map_or(line_content.len(), |(idx, _)| idx);
            return offset + within;
        }
        offset += line_content.len();
    }

    offset
}

/// Renders a [`Message`] with its source snippet through miette.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{message}")]
pub struct MessageDiagnostic {
    message: String,
    #[source_code]
    source_code: NamedSource<String>,
    #[label("{rule_id}")]
    span: SourceSpan,
    rule_id: String,
}

impl MessageDiagnostic {
    /// Builds a diagnostic pointing at the message position in `source`.
    #[must_use]
    pub fn new(message: &Message, file_name: &str, source: &str) -> Self {
        let end = offset_for(source, message.line, message.column);
        // Highlight the character just before the end point.
        let start = source[..end]
            .char_indices()
            .next_back()
            .map_or(end, |(idx, _)| idx);
        Self {
            message: message.message.clone(),
            source_code: NamedSource::new(file_name, source.to_string()),
            span: SourceSpan::from((start, end - start)),
            rule_id: message.rule_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message() -> Message {
        Message::new("copyright", "No copyright postamble found", 12, 5)
    }

    #[test]
    fn message_serializes_camel_case() {
        let rendered = toml::to_string(&make_message()).unwrap();
        assert!(rendered.contains("ruleId = \"copyright\""));
    }

    #[test]
    fn message_display() {
        insta::assert_snapshot!(
            make_message().to_string(),
            @"12:5: [copyright] No copyright postamble found"
        );
    }

    #[test]
    fn lint_result_counts() {
        let mut result = LintResult::new();
        result.files.push(FileResult::new("sip-1.md", vec![]));
        assert!(!result.has_errors());

        result
            .files
            .push(FileResult::new("sip-2.md", vec![make_message()]));
        assert!(result.has_errors());
        assert_eq!(result.message_count(), 1);
        assert_eq!(result.files_checked(), 2);
    }

    #[test]
    fn format_report_lists_messages() {
        let mut result = LintResult::new();
        result
            .files
            .push(FileResult::new("sip-2.md", vec![make_message()]));

        let report = result.format_report();
        assert!(report.contains("error[copyright]: No copyright postamble found"));
        assert!(report.contains("  -> sip-2.md:12:5"));
        assert!(report.contains("Found 1 problem(s) in 1 file(s)"));
    }

    #[test]
    fn test_offset_calculation() {
        let content = "line1\nline2\nline3";
        assert_eq!(offset_for(content, 1, 1), 0);
        assert_eq!(offset_for(content, 2, 1), 6);
        assert_eq!(offset_for(content, 2, 3), 8);
        assert_eq!(offset_for(content, 1, 6), 5);
    }

    #[test]
    fn offset_counts_characters() {
        let content = "é!\nx";
        assert_eq!(offset_for(content, 1, 2), 2);
        assert_eq!(offset_for(content, 2, 1), 4);
    }

    #[test]
    fn diagnostic_spans_last_character() {
        let source = "# Title\n";
        let message = Message::new("heading", "bad", 1, 8);
        let diagnostic = MessageDiagnostic::new(&message, "sip-1.md", source);
        assert_eq!(diagnostic.span.offset(), 6);
        assert_eq!(diagnostic.span.len(), 1);
    }
}
