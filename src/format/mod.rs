//! Diagnostics Formatter
//!
//! Renders a [`ValidationOutcome`] as JSON, JUnit XML or annotated source.

mod junit;
mod pretty;
mod source_map;

pub use source_map::SourceMap;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::validate::ValidationOutcome;

/// Source maps keyed by diagnostic source (`architecture`, `pattern`)
pub type SourceMaps = HashMap<String, SourceMap>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The diagnostic list as a JSON array
    #[default]
    Json,
    /// JUnit XML for CI systems
    Junit,
    /// Human-readable report with source excerpts
    Pretty,
}

pub fn format_outcome(
    outcome: &ValidationOutcome,
    format: OutputFormat,
    sources: &SourceMaps,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&outcome.diagnostics)?),
        OutputFormat::Junit => Ok(junit::render(outcome)),
        OutputFormat::Pretty => Ok(pretty::render(outcome, sources)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{Diagnostic, Span};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_round_trip() {
        let mut located = Diagnostic::error("duplicate-unique-id", "unique-id 'a' is already declared", "/nodes/1/unique-id")
            .with_schema_path("/properties/nodes");
        located.set_span(Span { line_start: 3, line_end: 3, character_start: 5, character_end: 20 });
        let outcome = ValidationOutcome::new(vec![
            located,
            Diagnostic::warning("core-schema-version-mismatch", "old", "/$schema").with_source("pattern"),
        ]);

        let text = format_outcome(&outcome, OutputFormat::Json, &SourceMaps::new()).unwrap();
        let parsed: Vec<Diagnostic> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, outcome.diagnostics);
    }

    #[test]
    fn test_format_names_parse() {
        let format: OutputFormat = serde_json::from_str("\"junit\"").unwrap();
        assert_eq!(format, OutputFormat::Junit);
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
    }
}
