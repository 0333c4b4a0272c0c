//! Registry and declaration graph tests against the fixture models

mod common;

use std::sync::Arc;

use common::{extension, people, registry, vehicles, vehicles_with, GRAPH, PEOPLE, VEHICLES};
use model_registry::{Declaration, ModelInput, ModelRegistry, TypeIndex};
use pretty_assertions::assert_eq;
use serde_json::json;

fn property_names(registry: &ModelRegistry, fqn: &str) -> Vec<String> {
    registry
        .resolved_class(fqn)
        .unwrap()
        .properties
        .iter()
        .map(|p| p.name().to_string())
        .collect()
}

fn concept(name: &str, super_type: Option<&str>) -> serde_json::Value {
    let mut declaration = json!({
        "$class": "concerto.metamodel@1.0.0.ConceptDeclaration",
        "name": name,
        "isAbstract": false,
        "properties": [
            {"$class": "concerto.metamodel@1.0.0.StringProperty", "name": "label", "isArray": false, "isOptional": false}
        ]
    });
    if let Some(super_type) = super_type {
        declaration["superType"] = json!({"name": super_type});
    }
    declaration
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_fixtures_load() {
    let registry = registry();
    let namespaces: Vec<&str> = registry.namespaces().collect();
    assert_eq!(namespaces, [GRAPH, PEOPLE, VEHICLES]);

    let file = registry.model_file(VEHICLES).unwrap();
    assert_eq!(file.file_name(), Some("vehicles.json"));
    assert_eq!(file.declarations().len(), 8);
}

#[test]
fn test_imports_must_be_registered_together() {
    let mut registry = ModelRegistry::new().unwrap();
    let err = registry.add_model_file(vehicles()).unwrap_err();
    assert!(err.is_type_not_found());
    assert!(err.to_string().contains(PEOPLE));
    assert_eq!(registry.namespaces().count(), 0);
}

#[test]
fn test_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("people.json"), include_str!("fixtures/people.json")).unwrap();
    std::fs::write(dir.path().join("vehicles.json"), include_str!("fixtures/vehicles.json")).unwrap();

    let registry = ModelRegistry::from_directory(dir.path(), &Default::default()).unwrap();
    let namespaces: Vec<&str> = registry.namespaces().collect();
    assert_eq!(namespaces, [PEOPLE, VEHICLES]);
}

#[test]
fn test_metamodel_version_mismatch() {
    let value = json!({
        "$class": "concerto.metamodel@0.4.0.Model",
        "namespace": "org.acme.old@1.0.0",
        "declarations": []
    });
    let err = ModelInput::from_json(&value, None).unwrap_err();
    assert!(err.to_string().contains("Metamodel version mismatch"), "{}", err);
}

// =============================================================================
// Declaration Graph
// =============================================================================

#[test]
fn test_property_order_is_own_then_inherited() {
    let registry = registry();
    assert_eq!(
        property_names(&registry, "org.acme.vehicles@1.0.0.Car"),
        ["doors", "features", "vin", "color", "owner", "mileage", "registered", "$identifier"]
    );
    assert_eq!(
        property_names(&registry, "org.acme.vehicles@1.0.0.Sale"),
        ["vehicle", "buyer", "price", "$timestamp"]
    );
}

#[test]
fn test_identifier_is_inherited() {
    let registry = registry();
    let car = registry.resolved_class("org.acme.vehicles@1.0.0.Car").unwrap();
    assert_eq!(car.identifier.as_deref(), Some("vin"));
    assert!(car.has_explicit_identifier());

    let fleet = registry.resolved_class("org.acme.vehicles@1.0.0.Fleet").unwrap();
    assert!(!fleet.is_identified());
}

#[test]
fn test_identifier_cannot_be_redeclared() {
    let mut registry = registry();
    let bike = json!({
        "$class": "concerto.metamodel@1.0.0.AssetDeclaration",
        "name": "Bike",
        "isAbstract": false,
        "superType": {"name": "Vehicle"},
        "identified": {"$class": "concerto.metamodel@1.0.0.IdentifiedBy", "name": "serial"},
        "properties": [
            {"$class": "concerto.metamodel@1.0.0.StringProperty", "name": "serial", "isArray": false, "isOptional": false}
        ]
    });

    let err = registry.add_model_file(extension(vec![bike])).unwrap_err();
    assert!(
        err.to_string().contains("identifiers cannot be overridden"),
        "{}",
        err
    );
}

#[test]
fn test_class_cannot_extend_itself() {
    let mut registry = registry();
    let err = registry
        .add_model_file(extension(vec![concept("Loop", Some("Loop"))]))
        .unwrap_err();
    assert!(err.is_illegal_model());
    assert!(err.to_string().contains("Class Loop cannot extend itself"), "{}", err);
}

#[test]
fn test_cyclic_inheritance() {
    let mut registry = registry();
    let err = registry
        .add_model_file(extension(vec![concept("A", Some("B")), concept("B", Some("A"))]))
        .unwrap_err();
    assert!(err.to_string().contains("Cyclic inheritance detected"), "{}", err);
}

#[test]
fn test_map_keys_must_be_string_or_datetime() {
    let mut registry = registry();
    let map = json!({
        "$class": "concerto.metamodel@1.0.0.MapDeclaration",
        "name": "ByAddress",
        "key": {"$class": "concerto.metamodel@1.0.0.ObjectMapKeyType", "type": {"name": "Address"}},
        "value": {"$class": "concerto.metamodel@1.0.0.StringMapValueType"}
    });

    let err = registry.add_model_file(extension(vec![map])).unwrap_err();
    assert!(err.to_string().contains("Invalid map key type"), "{}", err);
}

#[test]
fn test_integer_map_keys_rejected_at_validation() {
    let scores = json!({
        "$class": "concerto.metamodel@1.0.0.MapDeclaration",
        "name": "Scores",
        "key": {"$class": "concerto.metamodel@1.0.0.IntegerMapKeyType"},
        "value": {"$class": "concerto.metamodel@1.0.0.StringMapValueType"}
    });

    let mut strict = ModelRegistry::new().unwrap();
    let err = strict
        .add_model_files(vec![people(), vehicles_with(vec![scores.clone()])], false)
        .unwrap_err();
    assert!(err.to_string().contains("Invalid map key type Integer"), "{}", err);

    let mut lenient = ModelRegistry::new().unwrap();
    lenient
        .add_model_files(vec![people(), vehicles_with(vec![scores, concept("Ok", None)])], true)
        .unwrap();
    assert!(lenient.resolved_class("org.acme.vehicles@1.0.0.Ok").is_ok());
    assert!(lenient.resolved_map("org.acme.vehicles@1.0.0.Features").is_ok());
    let err = lenient.resolved_map("org.acme.vehicles@1.0.0.Scores").unwrap_err();
    assert!(err.to_string().contains("failed validation"), "{}", err);
}

#[test]
fn test_relationship_needs_identified_target() {
    let mut registry = registry();
    let holder = json!({
        "$class": "concerto.metamodel@1.0.0.ConceptDeclaration",
        "name": "Holder",
        "isAbstract": false,
        "properties": [
            {
                "$class": "concerto.metamodel@1.0.0.RelationshipProperty",
                "name": "address",
                "type": {"name": "Address"},
                "isArray": false,
                "isOptional": false
            }
        ]
    });

    let err = registry.add_model_file(extension(vec![holder])).unwrap_err();
    assert!(err.to_string().contains("has an identifier"), "{}", err);
}

#[test]
fn test_assignable_classes() {
    let registry = registry();
    let names: Vec<&str> = registry
        .assignable_classes("org.acme.vehicles@1.0.0.Vehicle")
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, ["Vehicle", "Car", "Truck"]);

    assert!(registry.is_assignable("org.acme.vehicles@1.0.0.Car", "org.acme.vehicles@1.0.0.Vehicle"));
    assert!(registry.is_assignable("org.acme.vehicles@1.0.0.Car", "concerto@1.0.0.Asset"));
    assert!(!registry.is_assignable("org.acme.vehicles@1.0.0.Truck", "org.acme.vehicles@1.0.0.Car"));
}

#[test]
fn test_get_type_kinds() {
    let registry = registry();
    assert!(matches!(
        registry.get_type("org.acme.vehicles@1.0.0.Color"),
        Ok(Declaration::Enum(_))
    ));
    assert!(matches!(
        registry.get_type("org.acme.vehicles@1.0.0.Features"),
        Ok(Declaration::Map(_))
    ));
    assert!(matches!(
        registry.get_type("org.acme.vehicles@1.0.0.VIN"),
        Ok(Declaration::Scalar(_))
    ));

    let err = registry.get_type("org.acme.vehicles@1.0.0.Vehicl").unwrap_err();
    assert!(err.to_string().contains("Did you mean Vehicle?"), "{}", err);
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_failed_batch_leaves_registry_unchanged() {
    let mut registry = ModelRegistry::new().unwrap();
    registry.add_model_file(people()).unwrap();
    let before: *const TypeIndex = registry.index();

    let broken = vehicles_with(vec![concept("Broken", Some("Missing"))]);
    assert!(registry.add_model_files(vec![broken], false).is_err());

    assert_eq!(registry.namespaces().collect::<Vec<_>>(), [PEOPLE]);
    assert!(std::ptr::eq(before, registry.index()));
}

#[test]
fn test_lenient_batch_skips_invalid_declarations() {
    let mut registry = ModelRegistry::new().unwrap();
    let broken = vehicles_with(vec![concept("Broken", Some("Missing"))]);
    registry.add_model_files(vec![people(), broken], true).unwrap();

    assert!(registry.resolved_class("org.acme.vehicles@1.0.0.Car").is_ok());
    let err = registry.resolved_class("org.acme.vehicles@1.0.0.Broken").unwrap_err();
    assert!(err.to_string().contains("failed validation"), "{}", err);
}

#[test]
fn test_update_replaces_declarations() {
    let mut registry = registry();
    let before = registry.model_file(VEHICLES).unwrap().clone();

    let updated = registry
        .update_model_file(vehicles_with(vec![concept("Garage", None)]))
        .unwrap();
    assert!(!Arc::ptr_eq(&before, &updated));
    assert!(registry.resolved_class("org.acme.vehicles@1.0.0.Garage").is_ok());

    // clones taken before the update keep the old state
    let snapshot = registry.clone();
    registry.delete_model_file(GRAPH).unwrap();
    assert!(snapshot.model_file(GRAPH).is_some());
    assert!(registry.model_file(GRAPH).is_none());
}
