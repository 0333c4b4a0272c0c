//! Declarations: classes, scalars, maps and enums

use std::collections::HashSet;
use std::fmt;

use super::decorator::{build_decorators, Decorator, DecoratorTarget};
use super::model_file::BuildContext;
use super::property::{DefaultValue, EnumValue, Field, PrimitiveType, Property, RelationshipDeclaration, TypeRef};
use super::validator::{NumberValidator, StringValidator, Validator};
use crate::ast;
use crate::error::{Location, ModelError, Result};
use crate::names::{fully_qualified_name, MAP_KEY_FIELD, MAP_VALUE_FIELD, ROOT_NAMESPACE};

// =============================================================================
// Kinds
// =============================================================================

/// The five class-family declaration kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Concept,
    Asset,
    Participant,
    Transaction,
    Event,
}

impl ClassKind {
    /// Short name of the root declaration of this kind
    pub fn root_name(&self) -> &'static str {
        match self {
            ClassKind::Concept => "Concept",
            ClassKind::Asset => "Asset",
            ClassKind::Participant => "Participant",
            ClassKind::Transaction => "Transaction",
            ClassKind::Event => "Event",
        }
    }

    pub fn root_fqn(&self) -> String {
        fully_qualified_name(ROOT_NAMESPACE, self.root_name())
    }

    /// Transactions and events carry a `$timestamp`
    pub fn is_timestamped(&self) -> bool {
        matches!(self, ClassKind::Transaction | ClassKind::Event)
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Class(ClassKind),
    Scalar,
    Map,
    Enum,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKind::Class(kind) => write!(f, "{}", kind),
            DeclarationKind::Scalar => f.write_str("Scalar"),
            DeclarationKind::Map => f.write_str("Map"),
            DeclarationKind::Enum => f.write_str("Enum"),
        }
    }
}

/// How instances of a class are identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// System identifier held in `$identifier`
    System,
    /// A declared String field
    Explicit(String),
}

// =============================================================================
// Declarations
// =============================================================================

#[derive(Debug, Clone)]
pub struct ClassDeclaration {
    pub name: String,
    pub namespace: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    /// Explicit supertype as written; `None` means the root of `kind`
    pub super_type: Option<ast::TypeIdentifier>,
    pub identified: Option<Identifier>,
    /// Declared properties only; system fields are added by the type index
    pub properties: Vec<Property>,
    pub decorators: Vec<Decorator>,
    pub location: Option<Location>,
}

impl ClassDeclaration {
    pub fn fqn(&self) -> String {
        fully_qualified_name(&self.namespace, &self.name)
    }

    pub fn own_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    fn from_ast(node: &ast::ClassDeclaration, kind: ClassKind, ctx: &BuildContext<'_>) -> Result<Self> {
        let mut properties = Vec::with_capacity(node.properties.len());

        for prop in &node.properties {
            if matches!(prop, ast::Property::Enum(_)) {
                return Err(ctx.illegal(
                    format!("Class {} cannot declare enum value {}", node.name, prop.name()),
                    node.location.as_ref(),
                ));
            }
            properties.push(Property::from_ast(prop, &node.name, ctx)?);
        }

        let identified = node.identified.as_ref().map(|i| match i {
            ast::Identified::System => Identifier::System,
            ast::Identified::By { name } => Identifier::Explicit(name.clone()),
        });

        Ok(Self {
            name: node.name.clone(),
            namespace: ctx.namespace.to_string(),
            kind,
            is_abstract: node.is_abstract,
            super_type: node.super_type.clone(),
            identified,
            properties,
            decorators: build_decorators(&node.decorators, &ctx.target(&node.name), ctx.factories, ctx.file_name)?,
            location: node.location.clone(),
        })
    }
}

/// A named primitive with its own validator and default
#[derive(Debug, Clone)]
pub struct ScalarDeclaration {
    pub name: String,
    pub namespace: String,
    pub primitive: PrimitiveType,
    pub validator: Option<Validator>,
    pub default_value: Option<DefaultValue>,
    pub decorators: Vec<Decorator>,
    pub location: Option<Location>,
}

impl ScalarDeclaration {
    pub fn fqn(&self) -> String {
        fully_qualified_name(&self.namespace, &self.name)
    }

    /// Synthetic field standing in for a field of this scalar type
    pub fn unbox(&self, field: &Field) -> Field {
        Field {
            name: field.name.clone(),
            type_ref: TypeRef::Primitive(self.primitive),
            is_array: field.is_array,
            is_optional: field.is_optional,
            validator: self.validator.clone(),
            default_value: self.default_value.clone(),
            decorators: field.decorators.clone(),
            location: field.location.clone(),
        }
    }

    fn from_ast(node: &ast::Declaration, ctx: &BuildContext<'_>) -> Result<Self> {
        let (name, primitive, validator, default_value, decorators, location) = match node {
            ast::Declaration::StringScalar(s) => {
                let validator = StringValidator::from_ast(s.validator.as_ref(), s.length_validator.as_ref())
                    .map_err(|e| ctx.locate(e, s.location.as_ref()))?;
                if let (Some(v), Some(default)) = (&validator, &s.default_value) {
                    v.validate(&s.name, default).map_err(|e| {
                        ctx.illegal(format!("Default value for scalar {} is invalid: {}", s.name, e), s.location.as_ref())
                    })?;
                }
                (
                    &s.name,
                    PrimitiveType::String,
                    validator.map(Validator::String),
                    s.default_value.clone().map(DefaultValue::String),
                    &s.decorators,
                    &s.location,
                )
            }
            ast::Declaration::IntegerScalar(s) | ast::Declaration::LongScalar(s) => {
                let primitive = if matches!(node, ast::Declaration::IntegerScalar(_)) {
                    PrimitiveType::Integer
                } else {
                    PrimitiveType::Long
                };
                let validator = s
                    .validator
                    .as_ref()
                    .map(NumberValidator::from_ast_i64)
                    .transpose()
                    .map_err(|e| ctx.locate(e, s.location.as_ref()))?;
                check_scalar_default(ctx, &s.name, validator.as_ref(), s.default_value.map(|v| v as f64), s.location.as_ref())?;
                (
                    &s.name,
                    primitive,
                    validator.map(Validator::Number),
                    s.default_value.map(DefaultValue::Integer),
                    &s.decorators,
                    &s.location,
                )
            }
            ast::Declaration::DoubleScalar(s) => {
                let validator = s
                    .validator
                    .as_ref()
                    .map(NumberValidator::from_ast_f64)
                    .transpose()
                    .map_err(|e| ctx.locate(e, s.location.as_ref()))?;
                check_scalar_default(ctx, &s.name, validator.as_ref(), s.default_value, s.location.as_ref())?;
                (
                    &s.name,
                    PrimitiveType::Double,
                    validator.map(Validator::Number),
                    s.default_value.map(DefaultValue::Double),
                    &s.decorators,
                    &s.location,
                )
            }
            ast::Declaration::BooleanScalar(s) => (
                &s.name,
                PrimitiveType::Boolean,
                None,
                s.default_value.map(DefaultValue::Boolean),
                &s.decorators,
                &s.location,
            ),
            ast::Declaration::DateTimeScalar(s) => (
                &s.name,
                PrimitiveType::DateTime,
                None,
                s.default_value.clone().map(DefaultValue::String),
                &s.decorators,
                &s.location,
            ),
            other => {
                return Err(ModelError::Metamodel(format!(
                    "{} is not a scalar declaration",
                    other.name()
                )))
            }
        };

        Ok(Self {
            name: name.clone(),
            namespace: ctx.namespace.to_string(),
            primitive,
            validator,
            default_value,
            decorators: build_decorators(decorators, &ctx.target(name), ctx.factories, ctx.file_name)?,
            location: location.clone(),
        })
    }
}

fn check_scalar_default(
    ctx: &BuildContext<'_>,
    name: &str,
    validator: Option<&NumberValidator>,
    default: Option<f64>,
    location: Option<&Location>,
) -> Result<()> {
    if let (Some(v), Some(default)) = (validator, default) {
        v.validate(name, default).map_err(|e| {
            ctx.illegal(format!("Default value for scalar {} is invalid: {}", name, e), location)
        })?;
    }
    Ok(())
}

/// Key/value dictionary type
#[derive(Debug, Clone)]
pub struct MapDeclaration {
    pub name: String,
    pub namespace: String,
    pub key_type: TypeRef,
    pub value_type: TypeRef,
    /// Values are relationships to the value type
    pub value_is_relationship: bool,
    pub decorators: Vec<Decorator>,
    pub location: Option<Location>,
}

impl MapDeclaration {
    pub fn fqn(&self) -> String {
        fully_qualified_name(&self.namespace, &self.name)
    }

    /// Synthetic `$key` field
    pub fn key_field(&self) -> Field {
        let mut field = Field::synthetic(MAP_KEY_FIELD, self.key_type.clone());
        field.location = self.location.clone();
        field
    }

    /// Synthetic `$value` property
    pub fn value_property(&self) -> Property {
        match (&self.value_type, self.value_is_relationship) {
            (TypeRef::Named(type_id), true) => Property::Relationship(RelationshipDeclaration {
                name: MAP_VALUE_FIELD.to_string(),
                type_id: type_id.clone(),
                is_array: false,
                is_optional: false,
                decorators: Vec::new(),
                location: self.location.clone(),
            }),
            _ => {
                let mut field = Field::synthetic(MAP_VALUE_FIELD, self.value_type.clone());
                field.location = self.location.clone();
                Property::Field(field)
            }
        }
    }

    fn from_ast(node: &ast::MapDeclaration, ctx: &BuildContext<'_>) -> Result<Self> {
        let key_type = match &node.key {
            ast::MapKeyType::String => TypeRef::Primitive(PrimitiveType::String),
            ast::MapKeyType::DateTime => TypeRef::Primitive(PrimitiveType::DateTime),
            ast::MapKeyType::Integer => TypeRef::Primitive(PrimitiveType::Integer),
            ast::MapKeyType::Long => TypeRef::Primitive(PrimitiveType::Long),
            ast::MapKeyType::Double => TypeRef::Primitive(PrimitiveType::Double),
            ast::MapKeyType::Boolean => TypeRef::Primitive(PrimitiveType::Boolean),
            ast::MapKeyType::Object { type_id } => TypeRef::Named(type_id.clone()),
        };
        let (value_type, value_is_relationship) = match &node.value {
            ast::MapValueType::String => (TypeRef::Primitive(PrimitiveType::String), false),
            ast::MapValueType::Integer => (TypeRef::Primitive(PrimitiveType::Integer), false),
            ast::MapValueType::Long => (TypeRef::Primitive(PrimitiveType::Long), false),
            ast::MapValueType::Double => (TypeRef::Primitive(PrimitiveType::Double), false),
            ast::MapValueType::Boolean => (TypeRef::Primitive(PrimitiveType::Boolean), false),
            ast::MapValueType::DateTime => (TypeRef::Primitive(PrimitiveType::DateTime), false),
            ast::MapValueType::Object { type_id } => (TypeRef::Named(type_id.clone()), false),
            ast::MapValueType::Relationship { type_id } => (TypeRef::Named(type_id.clone()), true),
        };

        Ok(Self {
            name: node.name.clone(),
            namespace: ctx.namespace.to_string(),
            key_type,
            value_type,
            value_is_relationship,
            decorators: build_decorators(&node.decorators, &ctx.target(&node.name), ctx.factories, ctx.file_name)?,
            location: node.location.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct EnumDeclaration {
    pub name: String,
    pub namespace: String,
    pub values: Vec<EnumValue>,
    pub decorators: Vec<Decorator>,
    pub location: Option<Location>,
}

impl EnumDeclaration {
    pub fn fqn(&self) -> String {
        fully_qualified_name(&self.namespace, &self.name)
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.values.iter().any(|v| v.name == name)
    }

    fn from_ast(node: &ast::EnumDeclaration, ctx: &BuildContext<'_>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut values = Vec::with_capacity(node.properties.len());

        for prop in &node.properties {
            let ast::Property::Enum(value) = prop else {
                return Err(ctx.illegal(
                    format!("Enum {} can only contain enum values, found field {}", node.name, prop.name()),
                    node.location.as_ref(),
                ));
            };
            if !seen.insert(value.name.as_str()) {
                return Err(ctx.illegal(
                    format!("Duplicate enum value {} in enum {}", value.name, node.name),
                    value.location.as_ref().or(node.location.as_ref()),
                ));
            }
            let target = DecoratorTarget {
                namespace: ctx.namespace,
                declaration: Some(&node.name),
                property: Some(&value.name),
            };
            values.push(EnumValue {
                name: value.name.clone(),
                decorators: build_decorators(&value.decorators, &target, ctx.factories, ctx.file_name)?,
                location: value.location.clone(),
            });
        }

        Ok(Self {
            name: node.name.clone(),
            namespace: ctx.namespace.to_string(),
            values,
            decorators: build_decorators(&node.decorators, &ctx.target(&node.name), ctx.factories, ctx.file_name)?,
            location: node.location.clone(),
        })
    }
}

// =============================================================================
// Declaration
// =============================================================================

#[derive(Debug, Clone)]
pub enum Declaration {
    Class(ClassDeclaration),
    Scalar(ScalarDeclaration),
    Map(MapDeclaration),
    Enum(EnumDeclaration),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Class(d) => &d.name,
            Declaration::Scalar(d) => &d.name,
            Declaration::Map(d) => &d.name,
            Declaration::Enum(d) => &d.name,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Declaration::Class(d) => &d.namespace,
            Declaration::Scalar(d) => &d.namespace,
            Declaration::Map(d) => &d.namespace,
            Declaration::Enum(d) => &d.namespace,
        }
    }

    pub fn fqn(&self) -> String {
        fully_qualified_name(self.namespace(), self.name())
    }

    pub fn kind(&self) -> DeclarationKind {
        match self {
            Declaration::Class(d) => DeclarationKind::Class(d.kind),
            Declaration::Scalar(_) => DeclarationKind::Scalar,
            Declaration::Map(_) => DeclarationKind::Map,
            Declaration::Enum(_) => DeclarationKind::Enum,
        }
    }

    pub fn decorators(&self) -> &[Decorator] {
        match self {
            Declaration::Class(d) => &d.decorators,
            Declaration::Scalar(d) => &d.decorators,
            Declaration::Map(d) => &d.decorators,
            Declaration::Enum(d) => &d.decorators,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Declaration::Class(d) => d.location.as_ref(),
            Declaration::Scalar(d) => d.location.as_ref(),
            Declaration::Map(d) => d.location.as_ref(),
            Declaration::Enum(d) => d.location.as_ref(),
        }
    }

    pub fn as_class(&self) -> Option<&ClassDeclaration> {
        match self {
            Declaration::Class(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarDeclaration> {
        match self {
            Declaration::Scalar(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapDeclaration> {
        match self {
            Declaration::Map(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDeclaration> {
        match self {
            Declaration::Enum(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn from_ast(node: &ast::Declaration, ctx: &BuildContext<'_>) -> Result<Self> {
        let declaration = match node {
            ast::Declaration::Concept(c) => Declaration::Class(ClassDeclaration::from_ast(c, ClassKind::Concept, ctx)?),
            ast::Declaration::Asset(c) => Declaration::Class(ClassDeclaration::from_ast(c, ClassKind::Asset, ctx)?),
            ast::Declaration::Participant(c) => {
                Declaration::Class(ClassDeclaration::from_ast(c, ClassKind::Participant, ctx)?)
            }
            ast::Declaration::Transaction(c) => {
                Declaration::Class(ClassDeclaration::from_ast(c, ClassKind::Transaction, ctx)?)
            }
            ast::Declaration::Event(c) => Declaration::Class(ClassDeclaration::from_ast(c, ClassKind::Event, ctx)?),
            ast::Declaration::Enum(e) => Declaration::Enum(EnumDeclaration::from_ast(e, ctx)?),
            ast::Declaration::Map(m) => Declaration::Map(MapDeclaration::from_ast(m, ctx)?),
            ast::Declaration::StringScalar(_)
            | ast::Declaration::IntegerScalar(_)
            | ast::Declaration::LongScalar(_)
            | ast::Declaration::DoubleScalar(_)
            | ast::Declaration::BooleanScalar(_)
            | ast::Declaration::DateTimeScalar(_) => Declaration::Scalar(ScalarDeclaration::from_ast(node, ctx)?),
        };
        Ok(declaration)
    }
}
