//! In-memory loader, mostly for tests and embedding

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;

use super::{Document, DocumentLoader};
use crate::error::{CalmError, Result};

#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    documents: HashMap<String, Value>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, identifier: impl Into<String>, value: Value) -> Self {
        self.insert(identifier, value);
        self
    }

    pub fn insert(&mut self, identifier: impl Into<String>, value: Value) {
        self.documents.insert(identifier.into(), value);
    }
}

impl DocumentLoader for InMemoryLoader {
    fn can_resolve(&self, identifier: &str) -> bool {
        self.documents.contains_key(identifier)
    }

    fn resolve<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<Document>> {
        Box::pin(async move {
            let value = self
                .documents
                .get(identifier)
                .cloned()
                .ok_or_else(|| CalmError::Load {
                    identifier: identifier.to_string(),
                    reason: "not present in memory".to_string(),
                })?;
            let text = serde_json::to_string_pretty(&value)?;
            Ok(Document {
                identifier: identifier.to_string(),
                text,
                value,
            })
        })
    }
}
