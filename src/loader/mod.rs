//! Document Loading
//!
//! Turns an identifier (file path or URL) into parsed JSON. Strategies are
//! pluggable through [`DocumentLoader`]; [`LoaderChain`] dispatches to the
//! first strategy that accepts an identifier.

mod fs;
mod http;
mod memory;

pub use fs::{FileSystemLoader, ScanConfig};
pub use http::HttpLoader;
pub use memory::InMemoryLoader;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::config::CalmConfig;
use crate::error::{CalmError, Result};

/// A loaded document: the original text plus its parsed value.
///
/// The text is kept so diagnostics can be mapped back to lines.
#[derive(Debug, Clone)]
pub struct Document {
    pub identifier: String,
    pub text: String,
    pub value: Value,
}

impl Document {
    /// Parse `text` as JSON, or YAML when the identifier has a YAML extension
    pub fn parse(identifier: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();
        let text = text.into();
        let value = parse_text(&identifier, &text)?;
        Ok(Self {
            identifier,
            text,
            value,
        })
    }

    /// Whether the text was parsed as YAML
    pub fn is_yaml(&self) -> bool {
        is_yaml(&self.identifier)
    }
}

/// Strategy for resolving identifiers to documents
pub trait DocumentLoader: Send + Sync {
    /// Whether this loader understands the identifier
    fn can_resolve(&self, identifier: &str) -> bool;

    /// Fetch and parse the document
    fn resolve<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<Document>>;
}

/// Ordered list of loaders; the first that can resolve an identifier wins
#[derive(Default)]
pub struct LoaderChain {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl LoaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filesystem and network loaders configured from `config`
    pub fn standard(config: &CalmConfig) -> Result<Self> {
        let http = HttpLoader::new(config.http_timeout(), &config.http.user_agent)?;
        Ok(Self::new().with(http).with(FileSystemLoader::new()))
    }

    pub fn with(mut self, loader: impl DocumentLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }
}

impl DocumentLoader for LoaderChain {
    fn can_resolve(&self, identifier: &str) -> bool {
        self.loaders.iter().any(|l| l.can_resolve(identifier))
    }

    fn resolve<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<Document>> {
        match self.loaders.iter().find(|l| l.can_resolve(identifier)) {
            Some(loader) => loader.resolve(identifier),
            None => Box::pin(async move {
                Err(CalmError::UnsupportedIdentifier(identifier.to_string()))
            }),
        }
    }
}

/// True for absolute `http`/`https` URLs
pub fn is_http_url(identifier: &str) -> bool {
    url::Url::parse(identifier)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Whether a path names a document the schema scan should pick up
pub fn has_schema_extension(identifier: &str) -> bool {
    let lower = identifier.to_ascii_lowercase();
    lower.ends_with(".json") || lower.ends_with(".yaml") || lower.ends_with(".yml")
}

fn is_yaml(identifier: &str) -> bool {
    let lower = identifier.to_ascii_lowercase();
    lower.ends_with(".yaml") || lower.ends_with(".yml")
}

fn parse_text(identifier: &str, text: &str) -> Result<Value> {
    if is_yaml(identifier) {
        serde_yaml::from_str(text).map_err(|e| CalmError::Parse {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })
    } else {
        serde_json::from_str(text).map_err(|e| CalmError::Parse {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_and_yaml() {
        let doc = Document::parse("a.json", r#"{"$id": "a"}"#).unwrap();
        assert_eq!(doc.value, json!({"$id": "a"}));

        let doc = Document::parse("a.yaml", "$id: a\nlist:\n  - 1\n").unwrap();
        assert_eq!(doc.value, json!({"$id": "a", "list": [1]}));
    }

    #[test]
    fn test_yaml_documents_are_flagged() {
        assert!(Document::parse("arch.YML", "nodes: []\n").unwrap().is_yaml());
        assert!(!Document::parse("arch.json", "{}").unwrap().is_yaml());
    }

    #[test]
    fn test_parse_failure_names_identifier() {
        let err = Document::parse("broken.json", "{").unwrap_err();
        assert!(matches!(err, CalmError::Parse { ref identifier, .. } if identifier == "broken.json"));
    }

    #[test]
    fn test_identifier_classification() {
        assert!(is_http_url("https://calm.finos.org/release/1.1/meta/core.json"));
        assert!(!is_http_url("patterns/api.json"));
        assert!(!is_http_url("file:///tmp/a.json"));
        assert!(has_schema_extension("x/Core.JSON"));
        assert!(has_schema_extension("x/pattern.yml"));
        assert!(!has_schema_extension("README.md"));
    }

    #[tokio::test]
    async fn test_chain_dispatches_to_first_capable_loader() {
        let memory = InMemoryLoader::new().with_document("mem://a", json!({"a": 1}));
        let chain = LoaderChain::new().with(memory);

        assert!(chain.can_resolve("mem://a"));
        let doc = chain.resolve("mem://a").await.unwrap();
        assert_eq!(doc.value, json!({"a": 1}));

        let err = chain.resolve("mem://missing").await.unwrap_err();
        assert!(matches!(err, CalmError::UnsupportedIdentifier(_)));
    }
}
