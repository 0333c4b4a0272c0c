//! Name helpers shared by the declaration graph, serializer and generator

/// Namespace of the built-in root model
pub const ROOT_NAMESPACE: &str = "concerto@1.0.0";

/// Root types importable by short name from every model file
pub const ROOT_TYPES: [&str; 5] = ["Concept", "Asset", "Participant", "Transaction", "Event"];

/// Type discriminator key on the wire
pub const CLASS_KEY: &str = "$class";

/// Wire key carrying the resource URI of a deduplicated resource
pub const ID_KEY: &str = "$id";

/// System identifier field
pub const IDENTIFIER_FIELD: &str = "$identifier";

/// System timestamp field of transactions and events
pub const TIMESTAMP_FIELD: &str = "$timestamp";

/// Synthetic property names for map keys and values
pub const MAP_KEY_FIELD: &str = "$key";
pub const MAP_VALUE_FIELD: &str = "$value";

/// Split `org.acme@1.0.0.Person` into `("org.acme@1.0.0", "Person")`.
///
/// Returns `None` for names with no namespace part.
pub fn split_fqn(fqn: &str) -> Option<(&str, &str)> {
    let (namespace, name) = fqn.rsplit_once('.')?;
    if namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some((namespace, name))
}

pub fn fully_qualified_name(namespace: &str, name: &str) -> String {
    format!("{}.{}", namespace, name)
}

/// `$`-prefixed names are reserved for system properties
pub fn is_system_property(name: &str) -> bool {
    name.starts_with('$')
}

pub fn is_root_type(fqn: &str) -> bool {
    matches!(split_fqn(fqn), Some((ROOT_NAMESPACE, name)) if ROOT_TYPES.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fqn_keeps_version() {
        assert_eq!(split_fqn("org.acme@1.0.0.Person"), Some(("org.acme@1.0.0", "Person")));
        assert_eq!(split_fqn("Person"), None);
        assert_eq!(fully_qualified_name("org.acme@1.0.0", "Person"), "org.acme@1.0.0.Person");
    }

    #[test]
    fn test_root_types() {
        assert!(is_root_type("concerto@1.0.0.Asset"));
        assert!(!is_root_type("org.acme@1.0.0.Asset"));
        assert!(is_system_property("$timestamp"));
        assert!(!is_system_property("timestamp"));
    }
}
