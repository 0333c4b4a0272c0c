//! Shared fixtures for the integration tests

#![allow(dead_code)]

use model_registry::{ModelInput, ModelRegistry, Resource};
use serde_json::Value;

pub const PEOPLE: &str = "org.acme.people@1.0.0";
pub const VEHICLES: &str = "org.acme.vehicles@1.0.0";
pub const GRAPH: &str = "org.acme.graph@1.0.0";

fn parse(content: &str, file_name: &str) -> ModelInput {
    let value: Value = serde_json::from_str(content).unwrap();
    ModelInput::from_json(&value, Some(file_name)).unwrap().remove(0)
}

pub fn input(value: Value) -> ModelInput {
    ModelInput::from_json(&value, Some("inline.json")).unwrap().remove(0)
}

pub fn people() -> ModelInput {
    parse(include_str!("../fixtures/people.json"), "people.json")
}

pub fn vehicles() -> ModelInput {
    parse(include_str!("../fixtures/vehicles.json"), "vehicles.json")
}

pub fn recursive() -> ModelInput {
    parse(include_str!("../fixtures/recursive.json"), "recursive.json")
}

/// Registry with every fixture loaded
pub fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new().unwrap();
    registry
        .add_model_files(vec![people(), vehicles(), recursive()], false)
        .unwrap();
    registry
}

/// `org.acme.vehicles` model with extra declarations appended
pub fn vehicles_with(extra: Vec<Value>) -> ModelInput {
    let mut value: Value = serde_json::from_str(include_str!("../fixtures/vehicles.json")).unwrap();
    value["declarations"].as_array_mut().unwrap().extend(extra);
    ModelInput::from_json(&value, Some("vehicles.json")).unwrap().remove(0)
}

/// Single-namespace model importing `Vehicle`
pub fn extension(declarations: Vec<Value>) -> ModelInput {
    input(serde_json::json!({
        "$class": "concerto.metamodel@1.0.0.Model",
        "namespace": "org.acme.extra@1.0.0",
        "imports": [
            {"$class": "concerto.metamodel@1.0.0.ImportType", "namespace": VEHICLES, "name": "Vehicle"},
            {"$class": "concerto.metamodel@1.0.0.ImportType", "namespace": PEOPLE, "name": "Address"}
        ],
        "declarations": declarations
    }))
}

/// A red car owned by alice@example.com
pub fn car(registry: &ModelRegistry, vin: &str) -> Resource {
    use model_registry::{Factory, Relationship};

    let factory = registry.factory();
    let mut car = factory.new_resource(VEHICLES, "Car", vin).unwrap();
    car.set("owner", Relationship::new(PEOPLE, "Person", "alice@example.com"));
    car
}
