//! Validator
//!
//! Validation is two-phase. [`compile`] is async and may fetch schemas the
//! directory is missing; the resulting [`CompiledPattern`] validates
//! documents synchronously with JSON Schema plus the structural [`rules`].
//! A pattern that cannot be compiled is an error, not a finding.

mod diagnostics;
mod engine;
pub mod rules;
mod version;

pub use diagnostics::{pointer_push, source, Diagnostic, Severity, Span, ValidationOutcome};
pub use rules::{standard_rules, Rule};
pub use version::check_core_version;

use serde_json::Value;
use std::collections::{HashSet, VecDeque};

use engine::{custom_dialect, dialect_meta_schema, SchemaEngine};
use crate::error::{CalmError, Result};
use crate::format::{SourceMap, SourceMaps};
use crate::loader::{Document, DocumentLoader};
use crate::model::Architecture;
use crate::schema::{absolutize, normalize_id, Reference, SchemaDirectory, SchemaMember};

/// A pattern ready to validate documents
pub struct CompiledPattern {
    schema_id: Option<String>,
    engine: SchemaEngine,
    rules: Vec<Box<dyn Rule>>,
}

impl std::fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("schema_id", &self.schema_id)
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl CompiledPattern {
    pub fn schema_id(&self) -> Option<&str> {
        self.schema_id.as_deref()
    }

    /// JSON Schema findings followed by structural rule findings
    pub fn validate(&self, instance: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = self.engine.diagnostics(instance);
        if !self.rules.is_empty() {
            let architecture = Architecture::from_value(instance);
            for rule in &self.rules {
                diagnostics.extend(rule.check(&architecture));
            }
        }
        diagnostics
    }
}

/// Compile `pattern`, first loading any referenced schema the directory
/// does not hold yet. A schema that cannot be fetched fails the compile.
pub async fn compile(
    pattern: &Value,
    directory: &mut SchemaDirectory,
    loader: &dyn DocumentLoader,
) -> Result<CompiledPattern> {
    fetch_references(pattern, directory, loader).await?;
    compile_offline(pattern, directory)
}

/// Compile `pattern` against what the directory already holds
pub fn compile_offline(pattern: &Value, directory: &SchemaDirectory) -> Result<CompiledPattern> {
    Ok(CompiledPattern {
        schema_id: pattern.get("$id").and_then(|v| v.as_str()).map(str::to_string),
        engine: SchemaEngine::compile(pattern, directory)?,
        rules: standard_rules(),
    })
}

/// Compile the meta-schema a pattern is checked against: its declared dialect
fn compile_dialect(dialect: &str, directory: &SchemaDirectory) -> Result<CompiledPattern> {
    Ok(CompiledPattern {
        schema_id: Some(dialect.to_string()),
        engine: SchemaEngine::compile(&dialect_meta_schema(dialect), directory)?,
        rules: Vec::new(),
    })
}

/// Load every schema reachable from `schema` through `$schema`/`$ref`
/// that the directory does not contain and the loader can fetch
pub async fn fetch_references(
    schema: &Value,
    directory: &mut SchemaDirectory,
    loader: &dyn DocumentLoader,
) -> Result<()> {
    let mut queue: VecDeque<String> = external_ids(schema).into_iter().collect();
    let mut attempted = HashSet::new();

    while let Some(id) = queue.pop_front() {
        if directory.contains(&id) || !attempted.insert(id.clone()) || !loader.can_resolve(&id) {
            continue;
        }
        tracing::debug!(schema_id = %id, "fetching schema missing from the directory");
        let document = loader.resolve(&id).await.map_err(|e| CalmError::Compile {
            schema_id: id.clone(),
            reason: format!("could not load referenced schema: {e}"),
        })?;
        queue.extend(external_ids(&document.value));
        if directory.add_value(&document.identifier, document.value).is_none() {
            tracing::warn!(schema_id = %id, "fetched schema declares no $id");
        }
    }
    Ok(())
}

/// Absolute ids of other documents referenced from `schema`
fn external_ids(schema: &Value) -> Vec<String> {
    let base = schema.get("$id").and_then(|v| v.as_str());
    let mut ids = Vec::new();
    if let Some(dialect) = custom_dialect(schema) {
        ids.push(normalize_id(dialect));
    }
    collect_refs(schema, &mut |reference| {
        if let Some(id) = Reference::parse(reference).schema_id {
            ids.push(normalize_id(&absolutize(id, base)));
        }
    });
    ids.retain(|id| Some(id.as_str()) != base.map(normalize_id).as_deref());
    ids
}

fn collect_refs(value: &Value, found: &mut impl FnMut(&str)) {
    collect_refs_within(value, false, found);
}

fn collect_refs_within(value: &Value, in_schema_map: bool, found: &mut impl FnMut(&str)) {
    match value {
        Value::Object(obj) => {
            for (key, child) in obj {
                if let ("$ref", Value::String(reference), false) = (key.as_str(), child, in_schema_map) {
                    found(reference);
                    continue;
                }
                match SchemaMember::classify(key, in_schema_map) {
                    SchemaMember::Data => {}
                    SchemaMember::Schema => collect_refs_within(child, false, found),
                    SchemaMember::SchemaMap => collect_refs_within(child, true, found),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs_within(item, false, found)),
        _ => {}
    }
}

// =============================================================================
// Validation runs
// =============================================================================

/// What to validate
#[derive(Debug, Clone)]
pub enum ValidationTarget {
    /// An architecture against an explicit pattern
    ArchitectureWithPattern {
        architecture: Document,
        pattern: Document,
    },
    /// An architecture against the pattern named by its `$schema`
    Architecture(Document),
    /// A pattern against the dialect named by its `$schema`
    Pattern(Document),
}

impl ValidationTarget {
    pub fn from_parts(architecture: Option<Document>, pattern: Option<Document>) -> Result<Self> {
        match (architecture, pattern) {
            (Some(architecture), Some(pattern)) => Ok(Self::ArchitectureWithPattern {
                architecture,
                pattern,
            }),
            (Some(architecture), None) => Ok(Self::Architecture(architecture)),
            (None, Some(pattern)) => Ok(Self::Pattern(pattern)),
            (None, None) => Err(CalmError::InvalidOptions(
                "an architecture, a pattern, or both must be provided".to_string(),
            )),
        }
    }
}

/// Run a full validation and map findings onto the source documents.
///
/// Also returns the source maps used, so callers can render excerpts.
pub async fn run(
    target: &ValidationTarget,
    directory: &mut SchemaDirectory,
    loader: &dyn DocumentLoader,
) -> Result<(ValidationOutcome, SourceMaps)> {
    let mut diagnostics = Vec::new();
    let mut maps = SourceMaps::new();

    match target {
        ValidationTarget::ArchitectureWithPattern {
            architecture,
            pattern,
        } => {
            let compiled = compile(&pattern.value, directory, loader).await?;
            check_architecture(&compiled, architecture, Some(pattern), &mut diagnostics, &mut maps);
        }
        ValidationTarget::Architecture(architecture) => {
            let pattern = pattern_for(architecture, directory, loader).await?;
            let compiled = compile(&pattern.value, directory, loader).await?;
            check_architecture(&compiled, architecture, Some(&pattern), &mut diagnostics, &mut maps);
        }
        ValidationTarget::Pattern(pattern) => {
            let dialect = pattern
                .value
                .get("$schema")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    CalmError::InvalidPattern(format!("'{}' declares no $schema", pattern.identifier))
                })?;
            fetch_references(&dialect_meta_schema(dialect), directory, loader).await?;
            let compiled = compile_dialect(dialect, directory)?;

            let mut found: Vec<Diagnostic> = compiled
                .validate(&pattern.value)
                .into_iter()
                .chain(check_core_version(&pattern.value))
                .map(|d| d.with_source(source::PATTERN))
                .collect();
            locate(pattern, &mut found, source::PATTERN, &mut maps);
            diagnostics.extend(found);
        }
    }

    let outcome = ValidationOutcome::new(diagnostics);
    tracing::info!(
        errors = outcome.count(Severity::Error),
        warnings = outcome.count(Severity::Warning),
        "validation finished"
    );
    Ok((outcome, maps))
}

/// Validate an already-loaded architecture with a compiled pattern,
/// appending source-mapped findings
pub fn check_architecture(
    compiled: &CompiledPattern,
    architecture: &Document,
    pattern: Option<&Document>,
    diagnostics: &mut Vec<Diagnostic>,
    maps: &mut SourceMaps,
) {
    let mut found = compiled.validate(&architecture.value);
    locate(architecture, &mut found, source::ARCHITECTURE, maps);
    diagnostics.extend(found);

    if let Some(pattern) = pattern {
        let mut warnings: Vec<Diagnostic> = check_core_version(&pattern.value)
            .into_iter()
            .map(|d| d.with_source(source::PATTERN))
            .collect();
        if !warnings.is_empty() {
            locate(pattern, &mut warnings, source::PATTERN, maps);
            diagnostics.extend(warnings);
        }
    }
}

/// Attach line/column spans from `document`'s text. Only JSON text is
/// mapped; findings on YAML documents keep their pointer paths alone.
fn locate(document: &Document, found: &mut [Diagnostic], source: &str, maps: &mut SourceMaps) {
    if document.is_yaml() {
        tracing::debug!(identifier = %document.identifier, "no source locations for YAML documents");
        return;
    }
    let map = SourceMap::from_json(&document.text);
    map.annotate(found, source);
    maps.insert(source.to_string(), map);
}

/// The pattern an architecture declares through `$schema`
async fn pattern_for(
    architecture: &Document,
    directory: &mut SchemaDirectory,
    loader: &dyn DocumentLoader,
) -> Result<Document> {
    let id = architecture
        .value
        .get("$schema")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            CalmError::InvalidOptions(format!(
                "'{}' declares no $schema; pass a pattern explicitly",
                architecture.identifier
            ))
        })?;

    if let Some(doc) = directory.get_schema(id) {
        let text = serde_json::to_string_pretty(doc.content.as_ref())?;
        return Ok(Document {
            identifier: doc.id.clone(),
            text,
            value: doc.content.as_ref().clone(),
        });
    }
    if loader.can_resolve(id) {
        let document = loader.resolve(id).await?;
        directory.add_value(&document.identifier, document.value.clone());
        return Ok(document);
    }
    Err(CalmError::SchemaNotFound {
        id: id.to_string(),
        suggestions: directory.suggest(id, 3),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{InMemoryLoader, LoaderChain};
    use serde_json::json;

    fn core() -> Value {
        json!({
            "$id": "https://example.com/core.json",
            "defs": {
                "node": {
                    "type": "object",
                    "properties": {"unique-id": {"type": "string"}},
                    "required": ["unique-id"]
                }
            }
        })
    }

    fn pattern() -> Value {
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "$id": "https://example.com/pattern.json",
            "type": "object",
            "properties": {
                "nodes": {"type": "array", "items": {"$ref": "core.json#/defs/node"}}
            },
            "required": ["nodes"]
        })
    }

    fn document(identifier: &str, value: Value) -> Document {
        Document::parse(identifier, serde_json::to_string_pretty(&value).unwrap()).unwrap()
    }

    #[test]
    fn test_external_ids_are_absolute_and_exclude_self() {
        let ids = external_ids(&json!({
            "$schema": "https://calm.finos.org/release/1.1/meta/calm.json",
            "$id": "https://example.com/pattern.json",
            "properties": {
                "a": {"$ref": "core.json#/defs/node"},
                "b": {"$ref": "#/defs/local"},
                "c": {"const": {"$ref": "not-a-ref.json"}}
            }
        }));
        assert_eq!(
            ids,
            vec![
                "https://calm.finos.org/release/1.1/meta/calm.json".to_string(),
                "https://example.com/core.json".to_string(),
            ]
        );
    }

    #[test]
    fn test_external_ids_include_properties_named_like_keywords() {
        let ids = external_ids(&json!({
            "$id": "https://example.com/pattern.json",
            "properties": {
                "enum": {"$ref": "choices.json#/defs/choice"},
                "examples": {"items": {"$ref": "samples.json"}}
            },
            "default": {"$ref": "instance-data.json"}
        }));
        assert_eq!(
            ids,
            vec![
                "https://example.com/choices.json".to_string(),
                "https://example.com/samples.json".to_string(),
            ]
        );
    }

    #[test]
    fn test_compiled_pattern_runs_schema_and_rules() {
        let mut dir = SchemaDirectory::new();
        dir.add_value("core.json", core());
        let compiled = compile_offline(&pattern(), &dir).unwrap();

        let diags = compiled.validate(&json!({
            "nodes": [{"unique-id": "a"}, {"unique-id": "a"}, {"name": "no id"}]
        }));
        let codes: Vec<&str> = diags.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["json-schema", "duplicate-unique-id"]);
    }

    #[tokio::test]
    async fn test_compile_fetches_missing_schemas() {
        let loader = LoaderChain::new()
            .with(InMemoryLoader::new().with_document("https://example.com/core.json", core()));
        let mut dir = SchemaDirectory::new();

        let compiled = compile(&pattern(), &mut dir, &loader).await.unwrap();
        assert!(dir.contains("https://example.com/core.json"));
        assert!(compiled.validate(&json!({"nodes": [{"unique-id": "a"}]})).is_empty());
    }

    #[tokio::test]
    async fn test_compile_fails_when_reference_cannot_be_loaded() {
        let loader = LoaderChain::new();
        let mut dir = SchemaDirectory::new();
        let err = compile(&pattern(), &mut dir, &loader).await.unwrap_err();
        assert!(matches!(err, CalmError::Compile { .. }));
    }

    #[tokio::test]
    async fn test_architecture_mode_uses_declared_schema() {
        let mut dir = SchemaDirectory::new();
        dir.add_value("core.json", core());
        dir.add_value("pattern.json", pattern());
        let loader = LoaderChain::new();

        let architecture = document(
            "arch.json",
            json!({"$schema": "https://example.com/pattern.json", "nodes": [{"name": "x"}]}),
        );
        let target = ValidationTarget::from_parts(Some(architecture), None).unwrap();
        let (outcome, maps) = run(&target, &mut dir, &loader).await.unwrap();

        assert!(outcome.has_errors);
        assert_eq!(outcome.diagnostics[0].path, "/nodes/0");
        assert_eq!(outcome.diagnostics[0].line_start, Some(4));
        assert!(maps.contains_key(source::ARCHITECTURE));
    }

    #[tokio::test]
    async fn test_yaml_architecture_keeps_paths_without_locations() {
        let mut dir = SchemaDirectory::new();
        dir.add_value("core.json", core());
        dir.add_value("pattern.json", pattern());

        let architecture = document(
            "arch.yaml",
            json!({"$schema": "https://example.com/pattern.json", "nodes": [{"name": "x"}]}),
        );
        let target = ValidationTarget::Architecture(architecture);
        let (outcome, maps) = run(&target, &mut dir, &LoaderChain::new()).await.unwrap();

        assert_eq!(outcome.diagnostics[0].path, "/nodes/0");
        assert_eq!(outcome.diagnostics[0].line_start, None);
        assert!(!maps.contains_key(source::ARCHITECTURE));
    }

    #[tokio::test]
    async fn test_unknown_declared_schema_suggests_alternatives() {
        let mut dir = SchemaDirectory::new();
        dir.add_value("pattern.json", pattern());
        let architecture = document("arch.json", json!({"$schema": "https://example.com/patern.json"}));
        let target = ValidationTarget::Architecture(architecture);

        let err = run(&target, &mut dir, &LoaderChain::new()).await.unwrap_err();
        assert!(matches!(
            err,
            CalmError::SchemaNotFound { ref suggestions, .. }
                if suggestions.contains(&"https://example.com/pattern.json".to_string())
        ));
    }

    #[tokio::test]
    async fn test_pattern_mode_checks_against_dialect() {
        let mut dir = SchemaDirectory::new();
        dir.load_bundled().unwrap();
        let pattern = document(
            "pattern.json",
            json!({
                "$schema": "https://calm.finos.org/release/1.1/meta/calm.json",
                "$id": "https://example.com/p.json",
                "type": 12
            }),
        );
        let target = ValidationTarget::Pattern(pattern);
        let (outcome, _) = run(&target, &mut dir, &LoaderChain::new()).await.unwrap();

        assert!(outcome.has_errors);
        assert!(outcome.diagnostics.iter().all(|d| d.source == source::PATTERN));
        assert!(outcome.diagnostics.iter().any(|d| d.path == "/type"));
    }

    #[test]
    fn test_target_requires_a_document() {
        let err = ValidationTarget::from_parts(None, None).unwrap_err();
        assert!(matches!(err, CalmError::InvalidOptions(_)));
    }
}
