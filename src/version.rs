//! Namespace versioning utilities
//!
//! Every model namespace carries a semantic version: `org.acme@1.2.3`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

static NAMESPACE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_$][\p{L}\p{N}_$]*$").expect("valid namespace pattern"));

/// A namespace name with its optional semantic version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedNamespace {
    /// Dotted namespace name (e.g., "org.acme")
    pub name: String,
    /// Semantic version (e.g., "1.2.3"); `None` for unversioned namespaces
    pub version: Option<Version>,
}

impl VersionedNamespace {
    /// Parse `org.acme@1.2.3` (or an unversioned `org.acme`)
    pub fn parse(namespace: &str) -> Result<Self> {
        let (name, version) = match namespace.split_once('@') {
            Some((name, version)) => {
                let version = Version::parse(version).map_err(|e| {
                    ModelError::illegal_model(format!(
                        "Invalid namespace version \"{}\" in \"{}\": {}",
                        version, namespace, e
                    ))
                })?;
                (name, Some(version))
            }
            None => (namespace, None),
        };

        if name.is_empty() || !name.split('.').all(|segment| NAMESPACE_SEGMENT.is_match(segment)) {
            return Err(ModelError::illegal_model(format!(
                "Invalid namespace \"{}\"",
                namespace
            )));
        }

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    /// Parse a namespace and reject it when it carries no version
    pub fn parse_versioned(namespace: &str) -> Result<Self> {
        let parsed = Self::parse(namespace)?;
        if !parsed.is_versioned() {
            return Err(ModelError::illegal_model(format!(
                "Namespace \"{}\" is not versioned; expected \"{}@<major>.<minor>.<patch>\"",
                namespace, namespace
            )));
        }
        Ok(parsed)
    }

    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> Option<String> {
        self.version.as_ref().map(Version::to_string)
    }

    /// Check if the two namespaces share a name and a major version
    pub fn is_compatible_with(&self, other: &VersionedNamespace) -> bool {
        match (&self.version, &other.version) {
            (Some(a), Some(b)) => self.name == other.name && a.major == b.major,
            _ => self.name == other.name,
        }
    }
}

impl fmt::Display for VersionedNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}
