//! Diagnostic types
//!
//! Everything the validator finds about a document is a [`Diagnostic`];
//! tool failures are [`crate::CalmError`]s instead.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Document a diagnostic was raised against
pub mod source {
    pub const ARCHITECTURE: &str = "architecture";
    pub const PATTERN: &str = "pattern";
}

/// 1-based line/column range in a document's text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line_start: usize,
    pub line_end: usize,
    pub character_start: usize,
    pub character_end: usize,
}

/// A single finding.
///
/// `path` is a JSON pointer into the document named by `source`. Line and
/// character positions are 1-based and only present once the diagnostic
/// has been mapped onto the document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
    pub source: String,
    #[serde(default)]
    pub line_start: Option<usize>,
    #[serde(default)]
    pub line_end: Option<usize>,
    #[serde(default)]
    pub character_start: Option<usize>,
    #[serde(default)]
    pub character_end: Option<usize>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            path: path.into(),
            schema_path: None,
            source: source::ARCHITECTURE.to_string(),
            line_start: None,
            line_end: None,
            character_start: None,
            character_end: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message, path)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message, path)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_schema_path(mut self, schema_path: impl Into<String>) -> Self {
        self.schema_path = Some(schema_path.into());
        self
    }

    pub fn set_span(&mut self, span: Span) {
        self.line_start = Some(span.line_start);
        self.line_end = Some(span.line_end);
        self.character_start = Some(span.character_start);
        self.character_end = Some(span.character_end);
    }

    pub fn span(&self) -> Option<Span> {
        Some(Span {
            line_start: self.line_start?,
            line_end: self.line_end?,
            character_start: self.character_start?,
            character_end: self.character_end?,
        })
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Aggregated result of one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub has_errors: bool,
    pub has_warnings: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationOutcome {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            has_errors: diagnostics.iter().any(|d| d.severity == Severity::Error),
            has_warnings: diagnostics.iter().any(|d| d.severity == Severity::Warning),
            diagnostics,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }

    /// Process exit code: non-zero on errors, or on warnings when `strict`
    pub fn exit_code(&self, strict: bool) -> i32 {
        if self.has_errors || (strict && self.has_warnings) {
            1
        } else {
            0
        }
    }
}

/// Append a reference token to a JSON pointer, escaping `~` and `/`
pub fn pointer_push(pointer: &str, token: impl std::fmt::Display) -> String {
    let token = token.to_string().replace('~', "~0").replace('/', "~1");
    format!("{pointer}/{token}")
}
