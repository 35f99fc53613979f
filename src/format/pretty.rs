//! Human-readable output with source excerpts

use std::fmt::Write;

use super::SourceMaps;
use crate::validate::{Diagnostic, Severity, ValidationOutcome};

pub(super) fn render(outcome: &ValidationOutcome, sources: &SourceMaps) -> String {
    let mut out = format!(
        "{} error(s), {} warning(s)\n",
        outcome.count(Severity::Error),
        outcome.count(Severity::Warning)
    );

    for diagnostic in &outcome.diagnostics {
        out.push('\n');
        let path = if diagnostic.path.is_empty() { "/" } else { &diagnostic.path };
        let _ = writeln!(out, "{}[{}]: {}", diagnostic.severity, diagnostic.code, diagnostic.message);
        match diagnostic.line_start {
            Some(line) => {
                let _ = writeln!(out, "  --> {} {} (line {line})", diagnostic.source, path);
            }
            None => {
                let _ = writeln!(out, "  --> {} {}", diagnostic.source, path);
            }
        }
        if let Some(excerpt) = excerpt(diagnostic, sources) {
            out.push_str(&excerpt);
        }
    }
    out
}

/// The diagnosed line with carets under the diagnosed columns
fn excerpt(diagnostic: &Diagnostic, sources: &SourceMaps) -> Option<String> {
    let map = sources.get(&diagnostic.source)?;
    let line_number = diagnostic.line_start?;
    let text = map.line(line_number)?;

    let (start, width) = caret_range(
        text.chars().count(),
        diagnostic.character_start.unwrap_or(1),
        diagnostic.character_end,
        diagnostic.line_end != Some(line_number),
    );

    let gutter = line_number.to_string();
    let pad = " ".repeat(gutter.len());
    Some(format!(
        "{gutter} | {text}\n{pad} | {}{}\n",
        " ".repeat(start - 1),
        "^".repeat(width)
    ))
}

/// 1-based start column and caret count, clamped to the line.
///
/// A multi-line span underlines to the end of its first line.
pub(super) fn caret_range(
    line_len: usize,
    start: usize,
    end: Option<usize>,
    multi_line: bool,
) -> (usize, usize) {
    let last = line_len.max(1);
    let start = start.clamp(1, last);
    let end = if multi_line {
        last
    } else {
        end.unwrap_or(start).clamp(start, last)
    };
    (start, end - start + 1)
}
