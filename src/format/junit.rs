//! JUnit XML output
//!
//! One `<testcase>` per diagnostic; errors are failures, warnings and info
//! pass with the message in `<system-out>`.

use std::fmt::Write;

use crate::validate::{Diagnostic, Severity, ValidationOutcome};

const SUITE: &str = "calm-validate";

pub(super) fn render(outcome: &ValidationOutcome) -> String {
    let failures = outcome.count(Severity::Error);
    let tests = outcome.diagnostics.len().max(1);

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(xml, "<testsuites name=\"{SUITE}\" tests=\"{tests}\" failures=\"{failures}\">");
    let _ = writeln!(xml, "  <testsuite name=\"{SUITE}\" tests=\"{tests}\" failures=\"{failures}\">");

    if outcome.diagnostics.is_empty() {
        xml.push_str("    <testcase name=\"validation\" classname=\"calm\"/>\n");
    }
    for diagnostic in &outcome.diagnostics {
        testcase(&mut xml, diagnostic);
    }

    xml.push_str("  </testsuite>\n</testsuites>\n");
    xml
}

fn testcase(xml: &mut String, diagnostic: &Diagnostic) {
    let path = if diagnostic.path.is_empty() { "/" } else { &diagnostic.path };
    let _ = writeln!(
        xml,
        "    <testcase name=\"{}\" classname=\"{}\">",
        escape(&format!("{} {}", diagnostic.code, path)),
        escape(&diagnostic.source),
    );
    match diagnostic.severity {
        Severity::Error => {
            let _ = writeln!(
                xml,
                "      <failure message=\"{}\" type=\"{}\">{}</failure>",
                escape(&diagnostic.message),
                escape(&diagnostic.code),
                escape(&location(diagnostic)),
            );
        }
        Severity::Warning | Severity::Info => {
            let _ = writeln!(
                xml,
                "      <system-out>{}: {}</system-out>",
                diagnostic.severity,
                escape(&diagnostic.message),
            );
        }
    }
    xml.push_str("    </testcase>\n");
}

fn location(diagnostic: &Diagnostic) -> String {
    match diagnostic.line_start {
        Some(line) => format!("{} at {} (line {line})", diagnostic.source, diagnostic.path),
        None => format!("{} at {}", diagnostic.source, diagnostic.path),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_become_failures() {
        let outcome = ValidationOutcome::new(vec![
            Diagnostic::error("json-schema", "\"name\" is a required property", "/nodes/0"),
            Diagnostic::warning("core-schema-version-mismatch", "old <release>", "/$schema"),
        ]);
        let xml = render(&outcome);

        assert!(xml.contains("tests=\"2\" failures=\"1\""));
        assert_eq!(xml.matches("<testcase ").count(), 2);
        assert_eq!(xml.matches("<failure ").count(), 1);
        assert!(xml.contains("&quot;name&quot; is a required property"));
        assert!(xml.contains("old &lt;release&gt;"));
    }

    #[test]
    fn test_clean_outcome_has_one_passing_case() {
        let xml = render(&ValidationOutcome::new(Vec::new()));
        assert!(xml.contains("tests=\"1\" failures=\"0\""));
        assert!(xml.contains("<testcase name=\"validation\""));
        assert!(!xml.contains("<failure"));
    }
}
