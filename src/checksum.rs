//! Checksum utilities for identifying a loaded schema set

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum over schema content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute a single checksum over a sequence of `(id, document)` pairs.
    ///
    /// Callers must supply the pairs in a stable order; the digest is
    /// order-sensitive.
    pub fn from_documents<'a>(
        documents: impl IntoIterator<Item = (&'a str, &'a serde_json::Value)>,
    ) -> Self {
        let mut hasher = Sha256::new();
        for (id, value) in documents {
            hasher.update(id.as_bytes());
            hasher.update([0u8]);
            hasher.update(serde_json::to_string(value).unwrap_or_default().as_bytes());
            hasher.update([0u8]);
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_consistency() {
        let doc = json!({"$id": "a"});
        let c1 = Checksum::from_documents([("a", &doc)]);
        let c2 = Checksum::from_documents([("a", &doc)]);
        assert_eq!(c1, c2);
        assert_eq!(c1.as_str().len(), 64);
        assert_eq!(c1.short().len(), 12);
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let a = json!({"$id": "a", "title": "one"});
        let b = json!({"$id": "a", "title": "two"});
        assert_ne!(
            Checksum::from_documents([("a", &a)]),
            Checksum::from_documents([("a", &b)])
        );
    }

    #[test]
    fn test_id_boundaries_are_distinct() {
        let v = json!(1);
        assert_ne!(
            Checksum::from_documents([("ab", &v), ("c", &v)]),
            Checksum::from_documents([("a", &v), ("bc", &v)])
        );
    }
}
