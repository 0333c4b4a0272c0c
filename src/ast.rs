//! Metamodel AST
//!
//! Serde types for the `concerto.metamodel@1.0.0` JSON tree produced by the
//! external schema parser. Every node carries a `$class` discriminator; the
//! tagged enums below dispatch on it. Deserializing a model IS its structural
//! validation against the metamodel: a node with an unknown or mismatched
//! `$class` is rejected with [`ModelError::Metamodel`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Location, ModelError, Result};

/// Namespace of the metamodel this crate understands
pub const METAMODEL_NAMESPACE: &str = "concerto.metamodel@1.0.0";

const METAMODEL_NAME: &str = "concerto.metamodel";

// =============================================================================
// Model
// =============================================================================

/// One namespace worth of declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(rename = "$class")]
    pub class: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
}

/// A bundle of models, as emitted when parsing several files at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Models {
    #[serde(rename = "$class")]
    pub class: String,
    #[serde(default)]
    pub models: Vec<Model>,
}

impl Model {
    /// Create an empty model for a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            class: format!("{}.Model", METAMODEL_NAMESPACE),
            namespace: namespace.into(),
            source_uri: None,
            imports: Vec::new(),
            declarations: Vec::new(),
            decorators: Vec::new(),
        }
    }

    /// Validate a JSON tree against the metamodel and convert it
    pub fn from_json(value: &Value) -> Result<Self> {
        check_node_class(value, "Model")?;
        Model::deserialize(value).map_err(|e| ModelError::Metamodel(e.to_string()))
    }

    /// Convert back to the JSON tree form
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Parse either a single `Model` or a `Models` bundle
pub fn parse_models(value: &Value) -> Result<Vec<Model>> {
    let class = node_class(value)?;
    if class.ends_with(".Models") {
        check_node_class(value, "Models")?;
        let bundle = Models::deserialize(value).map_err(|e| ModelError::Metamodel(e.to_string()))?;
        Ok(bundle.models)
    } else {
        Ok(vec![Model::from_json(value)?])
    }
}

fn node_class(value: &Value) -> Result<&str> {
    value
        .get("$class")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::Metamodel("AST node does not contain a $class discriminator".to_string()))
}

fn check_node_class(value: &Value, expected: &str) -> Result<()> {
    let class = node_class(value)?;
    let Some((namespace, name)) = class.rsplit_once('.') else {
        return Err(ModelError::Metamodel(format!("Invalid $class \"{}\"", class)));
    };

    if namespace != METAMODEL_NAMESPACE {
        let base = namespace.split('@').next().unwrap_or(namespace);
        if base == METAMODEL_NAME {
            return Err(ModelError::Metamodel(format!(
                "Metamodel version mismatch: expected \"{}\", found \"{}\"",
                METAMODEL_NAMESPACE, namespace
            )));
        }
        return Err(ModelError::Metamodel(format!(
            "Invalid $class \"{}\"; expected a {} node",
            class, METAMODEL_NAMESPACE
        )));
    }

    if name != expected {
        return Err(ModelError::Metamodel(format!(
            "Expected a {} node, found \"{}\"",
            expected, class
        )));
    }
    Ok(())
}

// =============================================================================
// Imports
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum Import {
    #[serde(rename = "concerto.metamodel@1.0.0.ImportAll")]
    All(ImportAll),
    #[serde(rename = "concerto.metamodel@1.0.0.ImportType")]
    Type(ImportType),
    #[serde(rename = "concerto.metamodel@1.0.0.ImportTypes")]
    Types(ImportTypes),
}

impl Import {
    pub fn namespace(&self) -> &str {
        match self {
            Import::All(i) => &i.namespace,
            Import::Type(i) => &i.namespace,
            Import::Types(i) => &i.namespace,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            Import::All(i) => i.uri.as_deref(),
            Import::Type(i) => i.uri.as_deref(),
            Import::Types(i) => i.uri.as_deref(),
        }
    }
}

/// Wildcard import of every type in a namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportAll {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportType {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTypes {
    pub namespace: String,
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

// =============================================================================
// Shared nodes
// =============================================================================

/// Reference to a declared type, optionally already namespace-qualified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIdentifier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl TypeIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: None }
    }

    /// The name as it should be resolved: `ns.Name` when qualified
    pub fn reference(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decorator {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<DecoratorArgument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum DecoratorArgument {
    #[serde(rename = "concerto.metamodel@1.0.0.DecoratorString")]
    String { value: String },
    #[serde(rename = "concerto.metamodel@1.0.0.DecoratorNumber")]
    Number { value: f64 },
    #[serde(rename = "concerto.metamodel@1.0.0.DecoratorBoolean")]
    Boolean { value: bool },
    #[serde(rename = "concerto.metamodel@1.0.0.DecoratorTypeReference")]
    TypeReference {
        #[serde(rename = "type")]
        type_id: TypeIdentifier,
        #[serde(default, rename = "isArray")]
        is_array: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringRegexValidator {
    pub pattern: String,
    #[serde(default)]
    pub flags: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringLengthValidator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
}

/// Integer, Long and Double domain validators share this shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainValidator<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<T>,
}

// =============================================================================
// Declarations
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum Declaration {
    #[serde(rename = "concerto.metamodel@1.0.0.ConceptDeclaration")]
    Concept(ClassDeclaration),
    #[serde(rename = "concerto.metamodel@1.0.0.AssetDeclaration")]
    Asset(ClassDeclaration),
    #[serde(rename = "concerto.metamodel@1.0.0.ParticipantDeclaration")]
    Participant(ClassDeclaration),
    #[serde(rename = "concerto.metamodel@1.0.0.TransactionDeclaration")]
    Transaction(ClassDeclaration),
    #[serde(rename = "concerto.metamodel@1.0.0.EventDeclaration")]
    Event(ClassDeclaration),
    #[serde(rename = "concerto.metamodel@1.0.0.EnumDeclaration")]
    Enum(EnumDeclaration),
    #[serde(rename = "concerto.metamodel@1.0.0.MapDeclaration")]
    Map(MapDeclaration),
    #[serde(rename = "concerto.metamodel@1.0.0.StringScalar")]
    StringScalar(StringScalar),
    #[serde(rename = "concerto.metamodel@1.0.0.IntegerScalar")]
    IntegerScalar(NumericScalar<i64>),
    #[serde(rename = "concerto.metamodel@1.0.0.LongScalar")]
    LongScalar(NumericScalar<i64>),
    #[serde(rename = "concerto.metamodel@1.0.0.DoubleScalar")]
    DoubleScalar(NumericScalar<f64>),
    #[serde(rename = "concerto.metamodel@1.0.0.BooleanScalar")]
    BooleanScalar(BooleanScalar),
    #[serde(rename = "concerto.metamodel@1.0.0.DateTimeScalar")]
    DateTimeScalar(DateTimeScalar),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Concept(d)
            | Declaration::Asset(d)
            | Declaration::Participant(d)
            | Declaration::Transaction(d)
            | Declaration::Event(d) => &d.name,
            Declaration::Enum(d) => &d.name,
            Declaration::Map(d) => &d.name,
            Declaration::StringScalar(d) => &d.name,
            Declaration::IntegerScalar(d) | Declaration::LongScalar(d) => &d.name,
            Declaration::DoubleScalar(d) => &d.name,
            Declaration::BooleanScalar(d) => &d.name,
            Declaration::DateTimeScalar(d) => &d.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDeclaration {
    pub name: String,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_type: Option<TypeIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identified: Option<Identified>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum Identified {
    /// System identifier (`$identifier`)
    #[serde(rename = "concerto.metamodel@1.0.0.Identified")]
    System,
    /// Explicit identifying field
    #[serde(rename = "concerto.metamodel@1.0.0.IdentifiedBy")]
    By { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumDeclaration {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDeclaration {
    pub name: String,
    pub key: MapKeyType,
    pub value: MapValueType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum MapKeyType {
    #[serde(rename = "concerto.metamodel@1.0.0.StringMapKeyType")]
    String,
    #[serde(rename = "concerto.metamodel@1.0.0.DateTimeMapKeyType")]
    DateTime,
    #[serde(rename = "concerto.metamodel@1.0.0.IntegerMapKeyType")]
    Integer,
    #[serde(rename = "concerto.metamodel@1.0.0.LongMapKeyType")]
    Long,
    #[serde(rename = "concerto.metamodel@1.0.0.DoubleMapKeyType")]
    Double,
    #[serde(rename = "concerto.metamodel@1.0.0.BooleanMapKeyType")]
    Boolean,
    #[serde(rename = "concerto.metamodel@1.0.0.ObjectMapKeyType")]
    Object {
        #[serde(rename = "type")]
        type_id: TypeIdentifier,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum MapValueType {
    #[serde(rename = "concerto.metamodel@1.0.0.StringMapValueType")]
    String,
    #[serde(rename = "concerto.metamodel@1.0.0.IntegerMapValueType")]
    Integer,
    #[serde(rename = "concerto.metamodel@1.0.0.LongMapValueType")]
    Long,
    #[serde(rename = "concerto.metamodel@1.0.0.DoubleMapValueType")]
    Double,
    #[serde(rename = "concerto.metamodel@1.0.0.BooleanMapValueType")]
    Boolean,
    #[serde(rename = "concerto.metamodel@1.0.0.DateTimeMapValueType")]
    DateTime,
    #[serde(rename = "concerto.metamodel@1.0.0.ObjectMapValueType")]
    Object {
        #[serde(rename = "type")]
        type_id: TypeIdentifier,
    },
    #[serde(rename = "concerto.metamodel@1.0.0.RelationshipMapValueType")]
    Relationship {
        #[serde(rename = "type")]
        type_id: TypeIdentifier,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringScalar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<StringRegexValidator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_validator: Option<StringLengthValidator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericScalar<T> {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<DomainValidator<T>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanScalar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeScalar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum Property {
    #[serde(rename = "concerto.metamodel@1.0.0.StringProperty")]
    String(StringProperty),
    #[serde(rename = "concerto.metamodel@1.0.0.IntegerProperty")]
    Integer(NumericProperty<i64>),
    #[serde(rename = "concerto.metamodel@1.0.0.LongProperty")]
    Long(NumericProperty<i64>),
    #[serde(rename = "concerto.metamodel@1.0.0.DoubleProperty")]
    Double(NumericProperty<f64>),
    #[serde(rename = "concerto.metamodel@1.0.0.BooleanProperty")]
    Boolean(BooleanProperty),
    #[serde(rename = "concerto.metamodel@1.0.0.DateTimeProperty")]
    DateTime(DateTimeProperty),
    #[serde(rename = "concerto.metamodel@1.0.0.ObjectProperty")]
    Object(ObjectProperty),
    #[serde(rename = "concerto.metamodel@1.0.0.RelationshipProperty")]
    Relationship(RelationshipProperty),
    #[serde(rename = "concerto.metamodel@1.0.0.EnumProperty")]
    Enum(EnumProperty),
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::String(p) => &p.name,
            Property::Integer(p) | Property::Long(p) => &p.name,
            Property::Double(p) => &p.name,
            Property::Boolean(p) => &p.name,
            Property::DateTime(p) => &p.name,
            Property::Object(p) => &p.name,
            Property::Relationship(p) => &p.name,
            Property::Enum(p) => &p.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringProperty {
    pub name: String,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<StringRegexValidator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_validator: Option<StringLengthValidator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericProperty<T> {
    pub name: String,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<DomainValidator<T>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanProperty {
    pub name: String,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeProperty {
    pub name: String,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Field whose type is a declared type (class, enum, scalar or map)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: TypeIdentifier,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_optional: bool,
    /// Default enum value name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: TypeIdentifier,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumProperty {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}
