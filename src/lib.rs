//! CALM Patterns
//!
//! Pattern resolution, instantiation and validation for CALM (Common
//! Architecture Language Model) documents.
//!
//! ## Features
//!
//! - **Schema Directory**: indexes schema documents by `$id` and resolves
//!   `$ref` chains across documents into merged definitions
//! - **Generation**: instantiates a placeholder architecture from a pattern
//! - **Validation**: JSON Schema 2020-12 plus structural rules (identifier
//!   uniqueness, interface existence, timeline ordering)
//! - **Reporting**: JSON, JUnit XML and annotated-source output
//!
//! ## Example
//!
//! ```no_run
//! use calm_patterns::{instantiate, GenerateOptions, SchemaDirectory};
//!
//! # async fn example(pattern: serde_json::Value) -> calm_patterns::Result<()> {
//! let mut directory = SchemaDirectory::new();
//! directory.load_bundled()?;
//! directory.load_directory(std::path::Path::new("./schemas")).await?;
//!
//! let architecture = instantiate(&pattern, &directory, &GenerateOptions::default())?;
//! println!("{}", serde_json::to_string_pretty(&architecture)?);
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod config;
pub mod error;
pub mod format;
pub mod generate;
pub mod loader;
pub mod model;
pub mod schema;
pub mod server;
pub mod validate;

pub use checksum::Checksum;
pub use config::CalmConfig;
pub use error::{CalmError, Result};
pub use format::{format_outcome, OutputFormat, SourceMap, SourceMaps};
pub use generate::{instantiate, GenerateOptions};
pub use loader::{Document, DocumentLoader, LoaderChain};
pub use schema::{SchemaDirectory, SchemaDocument, BUNDLED_CALM_VERSION};
pub use validate::{
    compile, compile_offline, CompiledPattern, Diagnostic, Severity, ValidationOutcome,
    ValidationTarget,
};
