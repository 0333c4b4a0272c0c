//! Generic serializer tests: wire format, validation and options

mod common;

use common::{car, registry, PEOPLE, VEHICLES};
use model_registry::{DecodeOptions, EncodeOptions, Factory, ModelError, Relationship, Resource, Value};
use pretty_assertions::assert_eq;
use serde_json::{json, Value as Json};

const OWNER_URI: &str = "resource:org.acme.people@1.0.0.Person#alice%40example.com";

fn keys(json: &Json) -> Vec<&str> {
    json.as_object().unwrap().keys().map(String::as_str).collect()
}

fn decode_err(json: Json) -> ModelError {
    registry().serializer().from_json(&json).unwrap_err()
}

fn car_json() -> Json {
    json!({
        "$class": "org.acme.vehicles@1.0.0.Car",
        "vin": "ABC12",
        "color": "BLUE",
        "owner": OWNER_URI,
        "doors": 3
    })
}

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn test_encode_follows_declaration_order() {
    let registry = registry();
    let mut car = car(&registry, "ABC12");
    car.set("mileage", Value::Integer(1200));

    let json = registry.serializer().to_json(&car).unwrap();
    assert_eq!(
        json,
        json!({
            "$class": "org.acme.vehicles@1.0.0.Car",
            "doors": 4,
            "vin": "ABC12",
            "color": "RED",
            "owner": OWNER_URI,
            "mileage": 1200,
            "$identifier": "ABC12"
        })
    );
    assert_eq!(
        keys(&json),
        ["$class", "doors", "vin", "color", "owner", "mileage", "$identifier"]
    );
}

#[test]
fn test_encode_rejects_undeclared_property() {
    let registry = registry();
    let mut car = car(&registry, "ABC12");
    car.set("wheels", Value::Integer(4));

    let err = registry.serializer().to_json(&car).unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("property named `wheels`"), "{}", err);
}

#[test]
fn test_encode_reports_missing_field_path() {
    let registry = registry();
    let mut car = car(&registry, "ABC12");
    car.remove("owner");

    let err = registry.serializer().to_json(&car).unwrap_err();
    assert_eq!(err.path(), Some("$.owner"));
    assert!(err.to_string().contains("missing the required field `owner`"), "{}", err);
}

#[test]
fn test_encode_without_validation_skips_checks() {
    let registry = registry();
    let mut car = car(&registry, "ABC12");
    car.remove("owner");

    let options = EncodeOptions {
        validate: false,
        ..EncodeOptions::default()
    };
    let json = registry.serializer().to_json_with(&car, &options).unwrap();
    assert!(json.get("owner").is_none());
}

#[test]
fn test_encode_datetime_in_offset() {
    let registry = registry();
    let mut car = car(&registry, "ABC12");
    let registered = chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05+02:00").unwrap();
    car.set("registered", Value::DateTime(registered));

    let serializer = registry.serializer();
    let json = serializer.to_json(&car).unwrap();
    assert_eq!(json["registered"], "2024-01-02T01:04:05.000Z");

    let options = EncodeOptions {
        utc_offset: -300,
        ..EncodeOptions::default()
    };
    let json = serializer.to_json_with(&car, &options).unwrap();
    assert_eq!(json["registered"], "2024-01-01T20:04:05.000-05:00");
}

#[test]
fn test_encode_map() {
    let registry = registry();
    let mut car = car(&registry, "ABC12");
    car.set(
        "features",
        Value::Map(vec![
            (Value::from("sunroof"), Value::Boolean(true)),
            (Value::from("towbar"), Value::Boolean(false)),
        ]),
    );

    let json = registry.serializer().to_json(&car).unwrap();
    assert_eq!(json["features"], json!({"sunroof": true, "towbar": false}));
}

// =============================================================================
// Relationships
// =============================================================================

#[test]
fn test_embedded_resource_in_relationship() {
    let registry = registry();
    let factory = registry.factory();
    let mut owner = factory.new_resource(PEOPLE, "Person", "alice@example.com").unwrap();
    owner.set("name", "Alice");

    let mut car = car(&registry, "ABC12");
    car.set("owner", owner);

    let serializer = registry.serializer();
    let err = serializer.to_json(&car).unwrap_err();
    assert!(err.to_string().contains("Did not find a relationship"), "{}", err);

    let as_uri = EncodeOptions {
        convert_resources_to_relationships: true,
        ..EncodeOptions::default()
    };
    assert_eq!(serializer.to_json_with(&car, &as_uri).unwrap()["owner"], OWNER_URI);

    let as_id = EncodeOptions {
        convert_resources_to_id: true,
        ..as_uri
    };
    assert_eq!(serializer.to_json_with(&car, &as_id).unwrap()["owner"], "alice@example.com");

    let embedded = EncodeOptions {
        permit_resources_for_relationships: true,
        ..EncodeOptions::default()
    };
    let json = serializer.to_json_with(&car, &embedded).unwrap();
    assert_eq!(
        json["owner"],
        json!({
            "$class": "org.acme.people@1.0.0.Person",
            "email": "alice@example.com",
            "name": "Alice",
            "$identifier": "alice@example.com"
        })
    );
}

#[test]
fn test_repeated_embedded_resource_becomes_pointer() {
    let registry = registry();
    let factory = registry.factory();
    let mut owner = factory.new_resource(PEOPLE, "Person", "alice@example.com").unwrap();
    owner.set("name", "Alice");

    let mut first = car(&registry, "ABC12");
    first.set("owner", owner.clone());
    let mut second = car(&registry, "XYZ34");
    second.set("owner", owner);
    let mut fleet = factory.new_concept(VEHICLES, "Fleet").unwrap();
    fleet.set("name", "North");
    fleet.set("vehicles", Value::Array(vec![first.into(), second.into()]));

    let embedded = EncodeOptions {
        permit_resources_for_relationships: true,
        ..EncodeOptions::default()
    };
    let json = registry.serializer().to_json_with(&fleet, &embedded).unwrap();
    assert_eq!(json["vehicles"][0]["owner"]["name"], "Alice");
    assert_eq!(json["vehicles"][1]["owner"], OWNER_URI);

    let as_id = EncodeOptions {
        convert_resources_to_id: true,
        ..embedded
    };
    let json = registry.serializer().to_json_with(&fleet, &as_id).unwrap();
    assert_eq!(json["vehicles"][0]["owner"]["name"], "Alice");
    assert_eq!(json["vehicles"][1]["owner"], "alice@example.com");
}

#[test]
fn test_decode_relationship_forms() {
    let serializer = registry().serializer();

    let mut json = car_json();
    json["owner"] = json!("bob@example.com");
    let car = serializer.from_json(&json).unwrap();
    assert_eq!(
        car.get("owner"),
        Some(&Value::Relationship(Relationship::new(PEOPLE, "Person", "bob@example.com")))
    );

    let car = serializer.from_json(&car_json()).unwrap();
    assert_eq!(
        car.get("owner"),
        Some(&Value::Relationship(Relationship::new(PEOPLE, "Person", "alice@example.com")))
    );
}

#[test]
fn test_decode_relationship_to_subtype() {
    let serializer = registry().serializer();
    let sale = json!({
        "$class": "org.acme.vehicles@1.0.0.Sale",
        "vehicle": "resource:org.acme.vehicles@1.0.0.Truck#TRK01",
        "buyer": OWNER_URI,
        "price": 15000.5,
        "$timestamp": "2024-05-01T10:00:00.000Z"
    });
    let resource = serializer.from_json(&sale).unwrap();
    assert_eq!(
        resource.get("vehicle"),
        Some(&Value::Relationship(Relationship::new(VEHICLES, "Truck", "TRK01")))
    );
    let expected = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap();
    assert_eq!(resource.get("$timestamp"), Some(&Value::DateTime(expected)));

    let mut wrong = sale.clone();
    wrong["vehicle"] = json!(OWNER_URI);
    let err = serializer.from_json(&wrong).unwrap_err();
    assert_eq!(err.path(), Some("$.vehicle"));
    assert!(err.to_string().contains("not assignable"), "{}", err);
}

#[test]
fn test_decode_object_for_relationship() {
    let registry = registry();
    let mut json = car_json();
    json["owner"] = json!({
        "$class": "org.acme.people@1.0.0.Person",
        "email": "alice@example.com",
        "name": "Alice"
    });

    let err = registry.serializer().from_json(&json).unwrap_err();
    assert_eq!(err.path(), Some("$.owner"));

    let options = DecodeOptions {
        accept_resources_for_relationships: true,
        ..DecodeOptions::default()
    };
    let car = registry.serializer().from_json_with(&json, &options).unwrap();
    let owner = car.get("owner").and_then(Value::as_resource).unwrap();
    assert_eq!(owner.identifier(), Some("alice@example.com"));
}

// =============================================================================
// Deduplication
// =============================================================================

#[test]
fn test_deduplicate_resources() {
    let registry = registry();
    let car = car(&registry, "ABC12");
    let mut fleet = registry.factory().new_concept(VEHICLES, "Fleet").unwrap();
    fleet.set("name", "North");
    fleet.set("vehicles", Value::Array(vec![car.clone().into(), car.into()]));

    let options = EncodeOptions {
        deduplicate_resources: true,
        ..EncodeOptions::default()
    };
    let json = registry.serializer().to_json_with(&fleet, &options).unwrap();
    let vehicles = json["vehicles"].as_array().unwrap();
    assert_eq!(vehicles[0]["$id"], "resource:org.acme.vehicles@1.0.0.Car#ABC12");
    assert_eq!(keys(&vehicles[0])[..2], ["$class", "$id"]);
    assert_eq!(vehicles[1], "resource:org.acme.vehicles@1.0.0.Car#ABC12");

    let plain = registry.serializer().to_json(&fleet).unwrap();
    assert_eq!(plain["vehicles"][0], plain["vehicles"][1]);
    assert!(plain["vehicles"][0].get("$id").is_none());
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn test_roundtrip() {
    let registry = registry();
    let serializer = registry.serializer();
    let mut original = car(&registry, "ABC12");
    original.set("mileage", Value::Integer(52000));
    original.set("features", Value::Map(vec![(Value::from("sunroof"), Value::Boolean(true))]));
    let registered = chrono::DateTime::parse_from_rfc3339("2023-07-14T09:30:00.250Z").unwrap();
    original.set("registered", Value::DateTime(registered));

    let json = serializer.to_json(&original).unwrap();
    let decoded = serializer.from_json(&json).unwrap();
    assert_eq!(decoded, original);
    assert_eq!(serializer.to_json(&decoded).unwrap(), json);
}

#[test]
fn test_decode_polymorphic_array() {
    let serializer = registry().serializer();
    let fleet = json!({
        "$class": "org.acme.vehicles@1.0.0.Fleet",
        "name": "North",
        "vehicles": [
            car_json(),
            {
                "$class": "org.acme.vehicles@1.0.0.Truck",
                "vin": "TRK01",
                "owner": OWNER_URI,
                "payload": 7.5
            }
        ]
    });

    let resource = serializer.from_json(&fleet).unwrap();
    let vehicles = resource.get("vehicles").and_then(Value::as_array).unwrap();
    let types: Vec<&str> = vehicles
        .iter()
        .filter_map(Value::as_resource)
        .map(Resource::type_name)
        .collect();
    assert_eq!(types, ["Car", "Truck"]);
    // default applied to the omitted enum field
    assert_eq!(vehicles[1].as_resource().unwrap().get("color"), Some(&Value::Enum("RED".to_string())));

    let mut wrong = fleet.clone();
    wrong["vehicles"][1] = json!({
        "$class": "org.acme.people@1.0.0.Person",
        "email": "bob@example.com",
        "name": "Bob"
    });
    let err = serializer.from_json(&wrong).unwrap_err();
    assert_eq!(err.path(), Some("$.vehicles[1]"));
}

#[test]
fn test_decode_requires_class() {
    let err = decode_err(json!({"vin": "ABC12"}));
    assert_eq!(
        err.to_string(),
        "Invalid JSON data. Does not contain a $class type identifier."
    );
    assert!(decode_err(json!(["not", "an", "object"])).is_validation());
}

#[test]
fn test_decode_rejects_abstract_type() {
    let mut json = car_json();
    json["$class"] = json!("org.acme.vehicles@1.0.0.Vehicle");
    let err = decode_err(json);
    assert!(err.to_string().contains("Cannot instantiate abstract type"), "{}", err);
}

#[test]
fn test_decode_rejects_unknown_properties() {
    let mut json = car_json();
    json["wheels"] = json!(4);
    json["trim"] = json!("LX");
    let err = decode_err(json);
    assert_eq!(
        err.to_string(),
        "Unexpected properties for type org.acme.vehicles@1.0.0.Car: wheels, trim"
    );

    let mut json = car_json();
    json["$version"] = json!(2);
    let err = decode_err(json);
    assert!(err.to_string().starts_with("Unexpected reserved properties"), "{}", err);

    // only transactions and events carry a timestamp
    let mut json = car_json();
    json["$timestamp"] = json!("2024-01-01T00:00:00.000Z");
    let err = decode_err(json);
    assert_eq!(
        err.to_string(),
        "Unexpected reserved properties for type org.acme.vehicles@1.0.0.Car: $timestamp"
    );
    assert_eq!(err.path(), Some("$"));

    // nulls are treated as absent
    let mut json = car_json();
    json["wheels"] = Json::Null;
    json["mileage"] = Json::Null;
    let car = registry().serializer().from_json(&json).unwrap();
    assert!(!car.contains("mileage"));
}

#[test]
fn test_decode_field_validation() {
    let mut json = car_json();
    json["color"] = json!("PURPLE");
    let err = decode_err(json);
    assert_eq!(err.path(), Some("$.color"));

    let mut json = car_json();
    json["vin"] = json!("abc12");
    let err = decode_err(json);
    assert_eq!(err.path(), Some("$.vin"));
    assert!(err.to_string().contains("failed to match validation regex"), "{}", err);

    let mut json = car_json();
    json["doors"] = json!(9);
    let err = decode_err(json);
    assert!(err.to_string().contains("outside upper bound 5"), "{}", err);

    let mut json = car_json();
    json["doors"] = json!("four");
    let err = decode_err(json);
    assert_eq!(
        err.to_string(),
        "Expected value at path `$.doors` to be of type `Integer`"
    );

    let mut json = car_json();
    json["features"] = json!({"sunroof": "yes"});
    let err = decode_err(json);
    assert_eq!(err.path(), Some("$.features.sunroof"));
}

#[test]
fn test_decode_whole_float_as_integer() {
    let mut json = car_json();
    json["doors"] = json!(4.0);
    let car = registry().serializer().from_json(&json).unwrap();
    assert_eq!(car.get("doors"), Some(&Value::Integer(4)));

    let mut json = car_json();
    json["doors"] = json!(3.5);
    assert!(decode_err(json).is_validation());
}

#[test]
fn test_decode_missing_required_field() {
    let mut json = car_json();
    json.as_object_mut().unwrap().remove("owner");
    let err = decode_err(json);
    assert_eq!(err.path(), Some("$.owner"));
}

#[test]
fn test_decode_empty_identifier() {
    let person = json!({
        "$class": "org.acme.people@1.0.0.Person",
        "email": "",
        "name": "Nobody"
    });
    let err = decode_err(person);
    assert!(err.to_string().contains("has an empty identifier"), "{}", err);
}

#[test]
fn test_decode_nested_path() {
    let person = json!({
        "$class": "org.acme.people@1.0.0.Person",
        "email": "alice@example.com",
        "name": "Alice",
        "address": {"street": "1 Main St", "city": "Springfield", "zip": "ABCDE"}
    });
    let err = decode_err(person);
    assert_eq!(err.path(), Some("$.address.zip"));
}

#[test]
fn test_strict_datetime() {
    let registry = registry();
    let mut json = car_json();
    json["registered"] = json!("2024-01-02T03:04:05");

    let err = registry.serializer().from_json(&json).unwrap_err();
    assert_eq!(err.path(), Some("$.registered"));

    let lenient = DecodeOptions {
        strict_qualified_date_times: false,
        utc_offset: 60,
        ..DecodeOptions::default()
    };
    let car = registry.serializer().from_json_with(&json, &lenient).unwrap();
    let encoded = registry.serializer().to_json(&car).unwrap();
    assert_eq!(encoded["registered"], "2024-01-02T02:04:05.000Z");
}

#[test]
fn test_decode_without_validation() {
    let mut json = car_json();
    json["color"] = json!("PURPLE");
    json.as_object_mut().unwrap().remove("owner");

    let options = DecodeOptions {
        validate: false,
        ..DecodeOptions::default()
    };
    let car = registry().serializer().from_json_with(&json, &options).unwrap();
    assert_eq!(car.get("color"), Some(&Value::Enum("PURPLE".to_string())));
    assert!(!car.contains("owner"));
}
