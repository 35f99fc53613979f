//! Schema index and `$ref` resolution

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::bundled::bundled_files;
use super::merge::merge_definitions;
use super::reference::{absolutize, rebase_refs, Reference};
use super::{normalize_id, SchemaDocument, SchemaId};
use crate::checksum::Checksum;
use crate::error::{CalmError, Result};
use crate::loader::{Document, DocumentLoader, FileSystemLoader, ScanConfig};

/// Bound on documents fetched at once during a load
pub const MAX_CONCURRENT_READS: usize = 16;

/// A reference that could not be followed during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRef {
    pub reference: String,
    /// Schema the reference was evaluated against, when known
    pub schema_id: Option<SchemaId>,
}

/// Outcome of resolving a reference.
///
/// `definition` is `{}` when nothing could be found. `unresolved` tells an
/// empty-because-missing definition apart from a genuinely unconstrained one.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub definition: Value,
    pub unresolved: Vec<UnresolvedRef>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Index of loaded schema documents keyed by `$id`.
///
/// Loads are additive and last-write-wins on id collisions. Resolution is
/// synchronous over the loaded index and performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct SchemaDirectory {
    schemas: HashMap<SchemaId, SchemaDocument>,
}

impl SchemaDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document, replacing any previous document with the same id
    pub fn insert(&mut self, document: SchemaDocument) -> Option<SchemaDocument> {
        let previous = self.schemas.insert(document.id.clone(), document);
        if let Some(prev) = &previous {
            tracing::debug!(id = %prev.id, origin = %prev.origin, "schema replaced by later load");
        }
        previous
    }

    /// Index a parsed document. Returns its id, or `None` when it was skipped
    /// because it declares no `$id`.
    pub fn add_value(&mut self, origin: &str, value: Value) -> Option<SchemaId> {
        match SchemaDocument::from_value(origin, value) {
            Some(document) => {
                let id = document.id.clone();
                self.insert(document);
                Some(id)
            }
            None => {
                tracing::warn!(origin, "skipping schema without a top-level $id");
                None
            }
        }
    }

    /// Load every schema-like file under `dir` (recursively).
    ///
    /// Up to [`MAX_CONCURRENT_READS`] files are read at once; documents are
    /// indexed in path order. A file that does not parse aborts the load.
    pub async fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        let files = FileSystemLoader::scan(dir, &ScanConfig::default())?;
        let loader = FileSystemLoader::new();
        let identifiers: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();

        let documents: Vec<Document> = stream::iter(identifiers.iter().map(|id| loader.resolve(id)))
            .buffered(MAX_CONCURRENT_READS)
            .try_collect()
            .await?;

        let mut loaded = 0;
        for document in documents {
            if self.add_value(&document.identifier, document.value).is_some() {
                loaded += 1;
            }
        }
        tracing::info!(directory = %dir.display(), loaded, total = self.len(), "loaded schema directory");
        Ok(loaded)
    }

    /// Load an explicit list of identifiers through `loader`.
    ///
    /// Unparsable documents abort the load; documents that cannot be fetched
    /// are logged and skipped.
    pub async fn load_identifiers(
        &mut self,
        identifiers: &[String],
        loader: &dyn DocumentLoader,
    ) -> Result<usize> {
        let results: Vec<Result<Document>> = stream::iter(identifiers.iter().map(|id| loader.resolve(id)))
            .buffered(MAX_CONCURRENT_READS)
            .collect()
            .await;

        let mut loaded = 0;
        for (identifier, result) in identifiers.iter().zip(results) {
            match result {
                Ok(document) => {
                    if self.add_value(&document.identifier, document.value).is_some() {
                        loaded += 1;
                    }
                }
                Err(e @ CalmError::Parse { .. }) => return Err(e),
                Err(e) => tracing::warn!(identifier = %identifier, error = %e, "could not load schema"),
            }
        }
        Ok(loaded)
    }

    /// Index the meta-schemas bundled with the tool
    pub fn load_bundled(&mut self) -> Result<usize> {
        let mut loaded = 0;
        for (path, content) in bundled_files() {
            let origin = format!("bundled:{}", path.display());
            let document = Document::parse(origin.clone(), content)?;
            if self.add_value(&origin, document.value).is_some() {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Raw document for an id
    pub fn get_schema(&self, id: &str) -> Option<&SchemaDocument> {
        self.schemas.get(id).or_else(|| self.schemas.get(&normalize_id(id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_schema(id).is_some()
    }

    /// Raw document for an id, or a not-found error carrying suggestions
    pub fn require_schema(&self, id: &str) -> Result<&SchemaDocument> {
        self.get_schema(id).ok_or_else(|| CalmError::SchemaNotFound {
            id: id.to_string(),
            suggestions: self.suggest(id, 3),
        })
    }

    /// All loaded ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.schemas.keys().map(|s| s.as_str()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &SchemaDocument> {
        self.schemas.values()
    }

    /// Checksum over every loaded document, in id order
    pub fn digest(&self) -> Checksum {
        let mut docs: Vec<&SchemaDocument> = self.schemas.values().collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Checksum::from_documents(docs.iter().map(|d| (d.id.as_str(), d.content.as_ref())))
    }

    /// Ids that look like `query`, best match first
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<String> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let file_name = query.rsplit('/').next().unwrap_or(query);
        let mut results: Vec<(i64, &str)> = Vec::new();

        for id in self.schemas.keys() {
            let score = matcher
                .fuzzy_match(id, query)
                .or_else(|| matcher.fuzzy_match(id, file_name));
            if let Some(score) = score {
                results.push((score, id));
            }
        }

        results.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        results
            .into_iter()
            .take(limit)
            .map(|(_, id)| id.to_string())
            .collect()
    }

    /// Resolve a reference to a merged definition, leniently.
    ///
    /// Anything that cannot be found yields `{}` (no additional constraints)
    /// and a logged warning. Use [`SchemaDirectory::resolve`] to find out
    /// whether that happened.
    pub fn get_definition(&self, reference: &str, current_schema: Option<&str>) -> Value {
        self.resolve(reference, current_schema).definition
    }

    /// Resolve a reference, recording every reference that could not be followed.
    ///
    /// `current_schema` is the id that document-local references (`#/...`)
    /// are evaluated against.
    pub fn resolve(&self, reference: &str, current_schema: Option<&str>) -> Resolution {
        let mut visited = HashSet::new();
        let mut unresolved = Vec::new();
        let definition = self.resolve_chain(reference, current_schema, &mut visited, &mut unresolved);
        Resolution {
            definition,
            unresolved,
        }
    }

    fn resolve_chain(
        &self,
        reference: &str,
        current_schema: Option<&str>,
        visited: &mut HashSet<(SchemaId, String)>,
        unresolved: &mut Vec<UnresolvedRef>,
    ) -> Value {
        let parsed = Reference::parse(reference);
        let schema_id = match parsed.schema_id {
            Some(raw) => self.lookup_id(raw, current_schema),
            None => match current_schema {
                Some(current) => normalize_id(current),
                None => {
                    tracing::warn!(reference, "local reference with no current schema");
                    unresolved.push(UnresolvedRef {
                        reference: reference.to_string(),
                        schema_id: None,
                    });
                    return empty();
                }
            },
        };

        if !visited.insert((schema_id.clone(), parsed.pointer.to_string())) {
            tracing::debug!(reference, schema_id = %schema_id, "reference cycle, stopping");
            return empty();
        }

        let Some(document) = self.get_schema(&schema_id) else {
            tracing::warn!(reference, schema_id = %schema_id, "referenced schema not loaded");
            unresolved.push(UnresolvedRef {
                reference: reference.to_string(),
                schema_id: Some(schema_id),
            });
            return empty();
        };

        let Some(raw) = document.content.pointer(parsed.pointer) else {
            tracing::warn!(reference, schema_id = %schema_id, "pointer not found in schema");
            unresolved.push(UnresolvedRef {
                reference: reference.to_string(),
                schema_id: Some(schema_id),
            });
            return empty();
        };

        let mut definition = raw.clone();
        rebase_refs(&mut definition, &document.id);

        let nested = match definition.as_object_mut() {
            Some(obj) => match obj.remove("$ref") {
                Some(Value::String(nested)) => Some(nested),
                Some(other) => {
                    obj.insert("$ref".to_string(), other);
                    None
                }
                None => None,
            },
            None => None,
        };

        match nested {
            Some(nested) => {
                let base = self.resolve_chain(&nested, Some(&document.id), visited, unresolved);
                merge_definitions(&base, &definition)
            }
            None => definition,
        }
    }

    /// Map a reference's schema part to a loaded id, trying the raw form
    /// first and then the form resolved against the current schema.
    fn lookup_id(&self, raw: &str, current_schema: Option<&str>) -> SchemaId {
        if self.contains(raw) {
            return normalize_id(raw);
        }
        normalize_id(&absolutize(raw, current_schema))
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}
