//! Instance generator tests

mod common;

use common::{registry, GRAPH, PEOPLE, VEHICLES};
use model_registry::{GenerateOptions, GeneratorMode, ModelError, Value};
use pretty_assertions::assert_eq;

fn sample(seed: u64) -> GenerateOptions {
    GenerateOptions {
        mode: GeneratorMode::Sample,
        include_optional_fields: true,
        seed: Some(seed),
    }
}

#[test]
fn test_empty_car() {
    let registry = registry();
    let car = registry
        .instance_generator()
        .generate(VEHICLES, "Car", &GenerateOptions::default())
        .unwrap();

    assert_eq!(car.get("doors"), Some(&Value::Integer(4)));
    assert_eq!(car.get("color"), Some(&Value::Enum("RED".to_string())));
    assert!(!car.contains("mileage"));
    assert!(!car.contains("features"));

    let owner = match car.get("owner") {
        Some(Value::Relationship(rel)) => rel,
        other => panic!("Expected relationship, got {:?}", other),
    };
    assert_eq!(owner.fully_qualified_type(), "org.acme.people@1.0.0.Person");

    // the identifier honours the VIN scalar's regex
    registry.serializer().to_json(&car).unwrap();
}

#[test]
fn test_empty_optional_fields() {
    let registry = registry();
    let options = GenerateOptions {
        include_optional_fields: true,
        ..GenerateOptions::default()
    };
    let car = registry
        .instance_generator()
        .generate(VEHICLES, "Car", &options)
        .unwrap();

    assert_eq!(car.get("mileage"), Some(&Value::Integer(0)));
    assert_eq!(car.get("features"), Some(&Value::Map(Vec::new())));
    assert!(matches!(car.get("registered"), Some(Value::DateTime(_))));
}

#[test]
fn test_abstract_type_uses_first_concrete_subclass() {
    let registry = registry();
    let vehicle = registry
        .instance_generator()
        .generate(VEHICLES, "Vehicle", &GenerateOptions::default())
        .unwrap();
    assert_eq!(vehicle.type_name(), "Car");

    let sale = registry
        .instance_generator()
        .generate(VEHICLES, "Sale", &GenerateOptions::default())
        .unwrap();
    match sale.get("vehicle") {
        Some(Value::Relationship(rel)) => assert_eq!(rel.type_name, "Car"),
        other => panic!("Expected relationship, got {:?}", other),
    }
    assert!(matches!(sale.get("$timestamp"), Some(Value::DateTime(_))));
}

#[test]
fn test_sample_is_valid_and_reproducible() {
    let registry = registry();
    let generator = registry.instance_generator();
    let serializer = registry.serializer();

    for seed in 0..20 {
        let person = generator.generate(PEOPLE, "Person", &sample(seed)).unwrap();
        let json = serializer.to_json(&person).unwrap();
        assert_eq!(serializer.from_json(&json).unwrap(), person);

        let fleet = generator.generate(VEHICLES, "Fleet", &sample(seed)).unwrap();
        serializer.to_json(&fleet).unwrap();
    }

    let first = generator.generate(VEHICLES, "Car", &sample(42)).unwrap();
    let second = generator.generate(VEHICLES, "Car", &sample(42)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_sample_fills_arrays() {
    let registry = registry();
    let fleet = registry
        .instance_generator()
        .generate(VEHICLES, "Fleet", &sample(7))
        .unwrap();
    let vehicles = fleet.get("vehicles").and_then(Value::as_array).unwrap();
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0].as_resource().unwrap().type_name(), "Car");
}

#[test]
fn test_recursive_model() {
    let registry = registry();
    let generator = registry.instance_generator();

    let err = generator
        .generate(GRAPH, "Chain", &GenerateOptions::default())
        .unwrap_err();
    assert!(matches!(err, ModelError::InstanceGeneration(_)));
    assert_eq!(err.to_string(), "Model is recursive.");

    // arrays and optional fields stop the recursion
    let tree = generator.generate(GRAPH, "Tree", &sample(1)).unwrap();
    assert_eq!(tree.get("children"), Some(&Value::Array(Vec::new())));
    assert!(!tree.contains("parent"));
}

#[test]
fn test_unknown_type() {
    let registry = registry();
    let err = registry
        .instance_generator()
        .generate(VEHICLES, "Boat", &GenerateOptions::default())
        .unwrap_err();
    assert!(err.is_type_not_found());
}

#[test]
fn test_mode_parsing() {
    assert_eq!("sample".parse::<GeneratorMode>(), Ok(GeneratorMode::Sample));
    assert_eq!("empty".parse::<GeneratorMode>(), Ok(GeneratorMode::Empty));
    assert!("random".parse::<GeneratorMode>().is_err());
    assert_eq!(GeneratorMode::Sample.to_string(), "sample");
}
