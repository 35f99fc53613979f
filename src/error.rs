//! Error types for pattern loading, generation and validation

use thiserror::Error;

/// Result type for CALM operations
pub type Result<T> = std::result::Result<T, CalmError>;

/// Errors that abort an operation.
///
/// Findings about the document being validated are never reported through
/// this type; they are collected as [`crate::Diagnostic`]s instead.
#[derive(Error, Debug)]
pub enum CalmError {
    #[error("Failed to load '{identifier}': {reason}")]
    Load { identifier: String, reason: String },

    #[error("Failed to parse '{identifier}': {reason}")]
    Parse { identifier: String, reason: String },

    #[error("No document loader can resolve '{0}'")]
    UnsupportedIdentifier(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Schema not found: {id}{}", format_suggestions(.suggestions))]
    SchemaNotFound { id: String, suggestions: Vec<String> },

    #[error("Failed to compile schema '{schema_id}': {reason}")]
    Compile { schema_id: String, reason: String },

    #[error("Unresolved reference '{reference}' (from schema '{schema_id}')")]
    UnresolvedReference { reference: String, schema_id: String },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}
