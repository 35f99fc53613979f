//! Filesystem loader and recursive schema scan

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{has_schema_extension, is_http_url, Document, DocumentLoader};
use crate::error::{CalmError, Result};

/// Configuration for directory scans
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Skip files whose path (relative to the scan root) starts with any of these
    pub skip_prefixes: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
            ],
        }
    }
}

/// Loads documents from local paths
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader {
    base: Option<PathBuf>,
}

impl FileSystemLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative identifiers against `base`
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn path_for(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier);
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Every schema-like file under `dir`, sorted by path.
    ///
    /// The sort keeps last-write-wins deterministic when two files declare
    /// the same `$id`.
    pub fn scan(dir: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(CalmError::Load {
                identifier: dir.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if !has_schema_extension(&path.to_string_lossy()) {
                continue;
            }

            let relative = path.strip_prefix(dir).unwrap_or(path);
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if config.skip_prefixes.iter().any(|p| relative_str.starts_with(p)) {
                continue;
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }
}

impl DocumentLoader for FileSystemLoader {
    fn can_resolve(&self, identifier: &str) -> bool {
        !is_http_url(identifier)
    }

    fn resolve<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<Document>> {
        Box::pin(async move {
            let path = self.path_for(identifier);
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CalmError::Load {
                    identifier: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            Document::parse(path.display().to_string(), text)
        })
    }
}
