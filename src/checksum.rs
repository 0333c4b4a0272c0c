//! Checksum utilities for model file identity

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum of a model AST
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a JSON value
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_bytes(canonical.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
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
        let ast = json!({"namespace": "org.acme@1.0.0", "declarations": []});
        assert_eq!(Checksum::from_json(&ast), Checksum::from_json(&ast.clone()));
    }

    #[test]
    fn test_checksum_different_content() {
        let a = Checksum::from_json(&json!({"namespace": "org.acme@1.0.0"}));
        let b = Checksum::from_json(&json!({"namespace": "org.acme@1.0.1"}));
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }
}
