//! Shared output formatting for validation results.

use anyhow::{Context, Result};
use miette::GraphicalReportHandler;
use sip_lint_core::{LintResult, MessageDiagnostic};
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::OutputFormat;

/// Print validation results in every requested format, in order.
pub fn print(result: &LintResult, formats: &[OutputFormat]) -> Result<()> {
    for format in formats {
        let rendered = render(result, *format)?;
        if !rendered.is_empty() {
            print!("{rendered}");
        }
    }
    Ok(())
}

/// Render validation results in one format.
pub fn render(result: &LintResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(result.format_report()),
        OutputFormat::Json => render_json(result),
        OutputFormat::Compact => Ok(render_compact(result)),
        OutputFormat::Github => {
            let workspace = std::env::var_os("GITHUB_WORKSPACE").map(PathBuf::from);
            Ok(render_github(result, workspace.as_deref()))
        }
        OutputFormat::Fancy => render_fancy(result, &GraphicalReportHandler::new()),
    }
}

fn render_json(result: &LintResult) -> Result<String> {
    let mut json = serde_json::to_string_pretty(result)?;
    json.push('\n');
    Ok(json)
}

fn render_compact(result: &LintResult) -> String {
    let mut out = String::new();
    for (path, m) in result.messages() {
        let _ = writeln!(
            out,
            "{}:{}:{}: [{}] {}",
            path.display(),
            m.line,
            m.column,
            m.rule_id,
            m.message
        );
    }
    out
}

/// Markdown body for a pull request review. Empty when nothing failed.
fn render_github(result: &LintResult, workspace: Option<&Path>) -> String {
    if !result.has_errors() {
        return String::new();
    }

    let errors: Vec<String> = result
        .messages()
        .map(|(path, m)| {
            let rel = workspace
                .and_then(|root| path.strip_prefix(root).ok())
                .unwrap_or(path)
                .display();
            format!(
                "- {} <span style=\"color:gray\">({})</span>\n\n  ➔ [`{rel}:{}`]({rel})",
                m.message, m.rule_id, m.line
            )
        })
        .collect();

    format!(
        "SIP validation failed with following errors:\n\n{}\n",
        errors.join("\n\n")
    )
}

fn render_fancy(result: &LintResult, handler: &GraphicalReportHandler) -> Result<String> {
    let mut out = String::new();
    for file in result.files.iter().filter(|f| !f.is_clean()) {
        let source = std::fs::read_to_string(&file.file_path)
            .with_context(|| format!("Failed to read {}", file.file_path.display()))?;
        let name = file.file_path.display().to_string();

        for m in &file.messages {
            let diagnostic = MessageDiagnostic::new(m, &name, &source);
            handler
                .render_report(&mut out, &diagnostic)
                .context("Failed to render diagnostic")?;
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::GraphicalTheme;
    use sip_lint_core::{FileResult, Message};

    fn sample(path: impl Into<PathBuf>) -> LintResult {
        let mut result = LintResult::new();
        result.files.push(FileResult::new(
            path,
            vec![
                Message::new(
                    "copyright",
                    "No copyright postamble found or is malformed",
                    3,
                    8,
                ),
                Message::new("filename", "File name is not sip-N.md", 3, 8),
            ],
        ));
        result.files.push(FileResult::new("sips/sip-2.md", vec![]));
        result
    }

    #[test]
    fn compact_one_line_per_message() {
        let out = render_compact(&sample("sips/notes.md"));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        insta::assert_snapshot!(
            lines[0],
            @"sips/notes.md:3:8: [copyright] No copyright postamble found or is malformed"
        );
    }

    #[test]
    fn text_uses_report_format() {
        let out = render(&sample("sips/notes.md"), OutputFormat::Text).unwrap();
        assert!(out.starts_with("error[copyright]: No copyright postamble found or is malformed\n"));
        assert!(out.ends_with("Found 2 problem(s) in 2 file(s)\n"));
    }

    #[test]
    fn json_serializes_result() {
        let out = render(&sample("sips/notes.md"), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["files"][0]["messages"][1]["ruleId"], "filename");
        assert_eq!(value["files"][1]["filePath"], "sips/sip-2.md");
    }

    #[test]
    fn github_body_relative_to_workspace() {
        let out = render_github(&sample("/work/sips/notes.md"), Some(Path::new("/work")));
        assert!(out.starts_with("SIP validation failed with following errors:\n\n"));
        assert!(out.contains(
            "- No copyright postamble found or is malformed <span style=\"color:gray\">(copyright)</span>\n\n  ➔ [`sips/notes.md:3`](sips/notes.md)"
        ));
    }

    #[test]
    fn github_body_empty_without_errors() {
        let mut result = LintResult::new();
        result.files.push(FileResult::new("sips/sip-1.md", vec![]));
        assert!(render_github(&result, None).is_empty());
    }

    #[test]
    fn fancy_renders_source_snippet() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\nSome text\n").unwrap();

        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        let out = render_fancy(&sample(&path), &handler).unwrap();
        assert!(out.contains("No copyright postamble found or is malformed"));
        assert!(out.contains("Some text"));
    }

    #[test]
    fn fancy_fails_for_missing_file() {
        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        assert!(render_fancy(&sample("/nonexistent/notes.md"), &handler).is_err());
    }
}
