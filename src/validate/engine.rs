//! JSON Schema evaluation
//!
//! Compiles a schema with the `jsonschema` crate (2020-12). Every document
//! in the [`SchemaDirectory`] is registered as a resource before the build.
//! References under the non-standard `defs` keyword are only discovered
//! while compiling and must already be in the registry by then.
//! Compilation never touches the network.

use jsonschema::{Draft, Resource, Retrieve, Uri, Validator};
use serde_json::Value;
use std::collections::HashMap;

use super::diagnostics::Diagnostic;
use crate::error::{CalmError, Result};
use crate::schema::{normalize_id, SchemaDirectory};

const DRAFT_2020_12: &str = "https://json-schema.org/draft/2020-12/schema";

/// Directory documents keyed by id, with custom dialects stripped
fn directory_schemas(directory: &SchemaDirectory) -> HashMap<String, Value> {
    directory
        .documents()
        .map(|doc| {
            let mut content = doc.content.as_ref().clone();
            strip_custom_dialect(&mut content);
            (doc.id.clone(), content)
        })
        .collect()
}

/// Fallback for ids the registry was not seeded with, such as a trailing-`#`
/// spelling of a directory id
struct DirectoryRetriever {
    schemas: HashMap<String, Value>,
}

impl Retrieve for DirectoryRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let id = normalize_id(uri.as_str());
        match self.schemas.get(&id) {
            Some(schema) => Ok(schema.clone()),
            None => Err(format!("schema '{id}' is not in the schema directory").into()),
        }
    }
}

pub(crate) struct SchemaEngine {
    validator: Validator,
}

impl SchemaEngine {
    /// Compile `schema`, failing if it names a dialect or `$ref` target the
    /// directory cannot supply
    pub(crate) fn compile(schema: &Value, directory: &SchemaDirectory) -> Result<Self> {
        let schema_id = schema
            .get("$id")
            .and_then(|v| v.as_str())
            .unwrap_or("<anonymous>")
            .to_string();

        if let Some(dialect) = custom_dialect(schema) {
            if !directory.contains(dialect) {
                return Err(CalmError::Compile {
                    schema_id,
                    reason: format!("schema dialect '{dialect}' is not loaded"),
                });
            }
        }

        let mut normalized = schema.clone();
        strip_custom_dialect(&mut normalized);

        let schemas = directory_schemas(directory);
        let own_id = schema.get("$id").and_then(|v| v.as_str()).map(normalize_id);

        let mut options = jsonschema::options();
        options.with_draft(Draft::Draft202012);
        for (id, content) in &schemas {
            if Some(id) == own_id.as_ref() {
                continue;
            }
            let resource: Resource = Draft::Draft202012.create_resource(content.clone());
            options.with_resource(id.as_str(), resource);
        }
        options.with_retriever(DirectoryRetriever { schemas });

        let validator = options.build(&normalized).map_err(|e| CalmError::Compile {
            schema_id: schema_id.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(schema_id = %schema_id, "compiled schema");
        Ok(Self { validator })
    }

    pub(crate) fn diagnostics(&self, instance: &Value) -> Vec<Diagnostic> {
        self.validator
            .iter_errors(instance)
            .map(|e| {
                Diagnostic::error("json-schema", e.to_string(), e.instance_path.to_string())
                    .with_schema_path(e.schema_path.to_string())
            })
            .collect()
    }
}

/// Meta-schema wrapping a dialect, for checking a pattern against the
/// dialect it declares
pub(crate) fn dialect_meta_schema(dialect: &str) -> Value {
    serde_json::json!({
        "$schema": DRAFT_2020_12,
        "$ref": dialect,
    })
}

/// `$schema` when it names something other than a published JSON Schema draft
pub(crate) fn custom_dialect(schema: &Value) -> Option<&str> {
    schema
        .get("$schema")
        .and_then(|v| v.as_str())
        .filter(|s| !is_standard_dialect(s))
}

fn is_standard_dialect(uri: &str) -> bool {
    uri.contains("json-schema.org/")
}

fn strip_custom_dialect(schema: &mut Value) {
    if custom_dialect(schema).is_some() {
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
        }
    }
}
