//! Schema Directory
//!
//! Loads schema documents, indexes them by `$id` and resolves `$ref`
//! pointers (across documents, through chains of refs, and around cycles)
//! into merged definitions.

mod bundled;
mod directory;
mod merge;
mod reference;

pub use bundled::{bundled_files, BUNDLED_CALM_VERSION};
pub use directory::{Resolution, SchemaDirectory, UnresolvedRef};
pub use merge::merge_definitions;
pub use reference::{absolutize, rebase_refs, Reference};
pub(crate) use reference::SchemaMember;

use serde_json::Value;
use std::sync::Arc;

/// Canonical schema identifier (the document's `$id`)
pub type SchemaId = String;

/// An immutable loaded schema.
///
/// Resolution never mutates `content`; merged definitions are always new values.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    /// Declared `$id`, without a trailing `#`
    pub id: SchemaId,
    /// Loader identifier the document came from (path, URL, `bundled:`)
    pub origin: String,
    pub content: Arc<Value>,
}

impl SchemaDocument {
    /// Build a document from its parsed value; `None` when it declares no `$id`
    pub fn from_value(origin: impl Into<String>, content: Value) -> Option<Self> {
        let id = content.get("$id").and_then(|v| v.as_str()).map(normalize_id)?;
        Some(Self {
            id,
            origin: origin.into(),
            content: Arc::new(content),
        })
    }
}

pub(crate) fn normalize_id(id: &str) -> SchemaId {
    id.trim_end_matches('#').to_string()
}
