//! Runtime instances
//!
//! A [`Resource`] is an instance of a class: identified (asset, participant,
//! identified concept) or not (plain concept, transaction, event). Property
//! values are [`Value`]s; pointers to other identified instances are
//! [`Relationship`]s rendered as `resource:<namespace>.<Type>#<id>` URIs.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::{ModelError, Result};
use crate::names::{fully_qualified_name, split_fqn};

/// URI scheme of relationship pointers
pub const RESOURCE_SCHEME: &str = "resource";

/// Characters escaped in identifiers, matching `encodeURIComponent`
const ID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
    Long(i64),
    Double(f64),
    DateTime(DateTime<FixedOffset>),
    /// Enum value name
    Enum(String),
    Array(Vec<Value>),
    /// Ordered map entries
    Map(Vec<(Value, Value)>),
    /// Embedded instance
    Concept(Box<Resource>),
    Relationship(Relationship),
}

impl Value {
    /// Name of the value's shape, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::DateTime(_) => "DateTime",
            Value::Enum(_) => "Enum",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
            Value::Concept(_) => "Concept",
            Value::Relationship(_) => "Relationship",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Value::Concept(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Resource> for Value {
    fn from(r: Resource) -> Self {
        Value::Concept(Box::new(r))
    }
}

impl From<Relationship> for Value {
    fn from(r: Relationship) -> Self {
        Value::Relationship(r)
    }
}

// =============================================================================
// Resource
// =============================================================================

/// An instance of a declared class
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    namespace: String,
    type_name: String,
    identifier_field: Option<String>,
    values: BTreeMap<String, Value>,
}

impl Resource {
    /// Bare instance; use a [`Factory`](crate::Factory) to get defaults and validation
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>, identifier_field: Option<String>) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
            identifier_field,
            values: BTreeMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fully_qualified_type(&self) -> String {
        fully_qualified_name(&self.namespace, &self.type_name)
    }

    pub fn is_identified(&self) -> bool {
        self.identifier_field.is_some()
    }

    pub fn identifier_field(&self) -> Option<&str> {
        self.identifier_field.as_deref()
    }

    pub fn identifier(&self) -> Option<&str> {
        let field = self.identifier_field.as_ref()?;
        match self.values.get(field) {
            Some(Value::String(id)) => Some(id),
            _ => None,
        }
    }

    pub fn set_identifier(&mut self, id: impl Into<String>) -> Result<()> {
        let field = self.identifier_field.clone().ok_or_else(|| {
            ModelError::validation(format!("Type {} is not identified", self.fully_qualified_type()))
        })?;
        self.values.insert(field, Value::String(id.into()));
        Ok(())
    }

    /// `org.acme@1.0.0.Car#ABC123`
    pub fn fully_qualified_identifier(&self) -> Option<String> {
        self.identifier()
            .map(|id| format!("{}#{}", self.fully_qualified_type(), id))
    }

    /// `resource:org.acme@1.0.0.Car#ABC123`
    pub fn to_uri(&self) -> Option<String> {
        self.to_relationship().map(|r| r.to_uri())
    }

    pub fn to_relationship(&self) -> Option<Relationship> {
        self.identifier()
            .map(|id| Relationship::new(&self.namespace, &self.type_name, id))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// =============================================================================
// Relationship
// =============================================================================

/// Typed pointer to an identified instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub namespace: String,
    pub type_name: String,
    pub identifier: String,
}

impl Relationship {
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
            identifier: identifier.into(),
        }
    }

    pub fn fully_qualified_type(&self) -> String {
        fully_qualified_name(&self.namespace, &self.type_name)
    }

    pub fn fully_qualified_identifier(&self) -> String {
        format!("{}#{}", self.fully_qualified_type(), self.identifier)
    }

    /// `resource:<namespace>.<Type>#<percent-encoded id>`
    pub fn to_uri(&self) -> String {
        format!(
            "{}:{}#{}",
            RESOURCE_SCHEME,
            self.fully_qualified_type(),
            utf8_percent_encode(&self.identifier, ID_ENCODE_SET)
        )
    }

    /// Parse a relationship URI.
    ///
    /// A bare identifier (no scheme) takes its namespace and type from the
    /// declared defaults.
    pub fn from_uri(uri: &str, default_namespace: &str, default_type: &str) -> Result<Self> {
        let parsed = match Url::parse(uri) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                if uri.is_empty() {
                    return Err(ModelError::validation("Invalid resource URI: identifier is empty"));
                }
                return Ok(Self::new(default_namespace, default_type, uri));
            }
            Err(e) => return Err(ModelError::validation(format!("Invalid URI: {}: {}", uri, e))),
        };

        if parsed.scheme() != RESOURCE_SCHEME {
            return Err(ModelError::validation(format!("Invalid URI scheme: {}", uri)));
        }
        if !parsed.username().is_empty()
            || parsed.password().is_some()
            || parsed.port().is_some()
            || parsed.query().is_some()
        {
            return Err(ModelError::validation(format!("Invalid resource URI format: {}", uri)));
        }

        let decode = |s: &str| percent_decode_str(s).decode_utf8_lossy().into_owned();
        let fqn = decode(parsed.path());
        let (namespace, type_name) = match split_fqn(&fqn) {
            Some((ns, name)) => (ns.to_string(), name.to_string()),
            None if !fqn.is_empty() => (default_namespace.to_string(), fqn.clone()),
            None => (default_namespace.to_string(), default_type.to_string()),
        };
        let identifier = parsed
            .fragment()
            .map(decode)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ModelError::validation(format!("Invalid resource URI format: {} has no identifier", uri)))?;

        Ok(Self { namespace, type_name, identifier })
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_identity() {
        let mut car = Resource::new("org.acme@1.0.0", "Car", Some("vin".to_string()));
        car.set_identifier("ABC 123").unwrap();
        assert_eq!(car.identifier(), Some("ABC 123"));
        assert_eq!(car.fully_qualified_identifier().as_deref(), Some("org.acme@1.0.0.Car#ABC 123"));
        assert_eq!(car.to_uri().as_deref(), Some("resource:org.acme@1.0.0.Car#ABC%20123"));

        let mut address = Resource::new("org.acme@1.0.0", "Address", None);
        assert!(address.set_identifier("x").is_err());
        assert_eq!(address.to_uri(), None);
    }

    #[test]
    fn test_relationship_uri_roundtrip() {
        let rel = Relationship::new("org.acme@1.0.0", "Car", "a/b#c");
        let uri = rel.to_uri();
        assert_eq!(uri, "resource:org.acme@1.0.0.Car#a%2Fb%23c");
        assert_eq!(Relationship::from_uri(&uri, "x@1.0.0", "Y").unwrap(), rel);
    }

    #[test]
    fn test_relationship_uri_defaults() {
        let rel = Relationship::from_uri("ABC123", "org.acme@1.0.0", "Car").unwrap();
        assert_eq!(rel.fully_qualified_identifier(), "org.acme@1.0.0.Car#ABC123");
    }

    #[test]
    fn test_relationship_uri_errors() {
        assert!(Relationship::from_uri("http://example.com/#1", "a@1.0.0", "B").is_err());
        assert!(Relationship::from_uri("resource:org.acme@1.0.0.Car", "a@1.0.0", "B").is_err());
        assert!(Relationship::from_uri("resource:org.acme@1.0.0.Car?x=1#1", "a@1.0.0", "B").is_err());
    }
}
