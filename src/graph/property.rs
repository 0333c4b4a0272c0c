//! Properties of declarations: fields, relationships and enum values

use std::fmt;

use super::decorator::{build_decorators, Decorator, DecoratorTarget};
use super::model_file::BuildContext;
use super::validator::{NumberValidator, StringValidator, Validator};
use crate::ast;
use crate::error::{Location, Result};
use crate::names::is_system_property;

/// Built-in primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Boolean,
    DateTime,
    Double,
    Integer,
    Long,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 6] = [
        PrimitiveType::String,
        PrimitiveType::Boolean,
        PrimitiveType::DateTime,
        PrimitiveType::Double,
        PrimitiveType::Integer,
        PrimitiveType::Long,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::String => "String",
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::DateTime => "DateTime",
            PrimitiveType::Double => "Double",
            PrimitiveType::Integer => "Integer",
            PrimitiveType::Long => "Long",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, PrimitiveType::Double | PrimitiveType::Integer | PrimitiveType::Long)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target type of a field as written in the model
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive(PrimitiveType),
    /// Declared type, resolved against the owning file's imports
    Named(ast::TypeIdentifier),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{}", p),
            TypeRef::Named(id) => write!(f, "{}", id.reference()),
        }
    }
}

/// Declared default of a field or scalar
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// String, DateTime text or enum value name
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub type_ref: TypeRef,
    pub is_array: bool,
    pub is_optional: bool,
    pub validator: Option<Validator>,
    pub default_value: Option<DefaultValue>,
    pub decorators: Vec<Decorator>,
    pub location: Option<Location>,
}

impl Field {
    /// Required, non-array field with no validator, default or decorators
    pub fn synthetic(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            is_array: false,
            is_optional: false,
            validator: None,
            default_value: None,
            decorators: Vec::new(),
            location: None,
        }
    }

    pub fn primitive(&self) -> Option<PrimitiveType> {
        match &self.type_ref {
            TypeRef::Primitive(p) => Some(*p),
            TypeRef::Named(_) => None,
        }
    }
}

/// A typed pointer to an identified class
#[derive(Debug, Clone)]
pub struct RelationshipDeclaration {
    pub name: String,
    pub type_id: ast::TypeIdentifier,
    pub is_array: bool,
    pub is_optional: bool,
    pub decorators: Vec<Decorator>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone)]
pub enum Property {
    Field(Field),
    Relationship(RelationshipDeclaration),
    EnumValue(EnumValue),
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Field(f) => &f.name,
            Property::Relationship(r) => &r.name,
            Property::EnumValue(e) => &e.name,
        }
    }

    pub fn is_array(&self) -> bool {
        match self {
            Property::Field(f) => f.is_array,
            Property::Relationship(r) => r.is_array,
            Property::EnumValue(_) => false,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Property::Field(f) => f.is_optional,
            Property::Relationship(r) => r.is_optional,
            Property::EnumValue(_) => false,
        }
    }

    pub fn is_system(&self) -> bool {
        is_system_property(self.name())
    }

    pub fn decorators(&self) -> &[Decorator] {
        match self {
            Property::Field(f) => &f.decorators,
            Property::Relationship(r) => &r.decorators,
            Property::EnumValue(e) => &e.decorators,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Property::Field(f) => f.location.as_ref(),
            Property::Relationship(r) => r.location.as_ref(),
            Property::EnumValue(e) => e.location.as_ref(),
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Property::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Convert an AST property owned by `declaration`
    pub(crate) fn from_ast(node: &ast::Property, declaration: &str, ctx: &BuildContext<'_>) -> Result<Self> {
        let target = DecoratorTarget {
            namespace: ctx.namespace,
            declaration: Some(declaration),
            property: Some(node.name()),
        };

        let property = match node {
            ast::Property::String(p) => {
                let validator = StringValidator::from_ast(p.validator.as_ref(), p.length_validator.as_ref())
                    .map_err(|e| ctx.locate(e, p.location.as_ref()))?;
                if let (Some(v), Some(default)) = (&validator, &p.default_value) {
                    v.validate(&p.name, default).map_err(|e| {
                        ctx.illegal(format!("Default value for field {} is invalid: {}", p.name, e), p.location.as_ref())
                    })?;
                }
                Property::Field(Field {
                    name: p.name.clone(),
                    type_ref: TypeRef::Primitive(PrimitiveType::String),
                    is_array: p.is_array,
                    is_optional: p.is_optional,
                    validator: validator.map(Validator::String),
                    default_value: p.default_value.clone().map(DefaultValue::String),
                    decorators: build_decorators(&p.decorators, &target, ctx.factories, ctx.file_name)?,
                    location: p.location.clone(),
                })
            }
            ast::Property::Integer(p) | ast::Property::Long(p) => {
                let primitive = if matches!(node, ast::Property::Integer(_)) {
                    PrimitiveType::Integer
                } else {
                    PrimitiveType::Long
                };
                let validator = p
                    .validator
                    .as_ref()
                    .map(NumberValidator::from_ast_i64)
                    .transpose()
                    .map_err(|e| ctx.locate(e, p.location.as_ref()))?;
                check_numeric_default(ctx, &p.name, validator.as_ref(), p.default_value.map(|v| v as f64), p.location.as_ref())?;
                Property::Field(Field {
                    name: p.name.clone(),
                    type_ref: TypeRef::Primitive(primitive),
                    is_array: p.is_array,
                    is_optional: p.is_optional,
                    validator: validator.map(Validator::Number),
                    default_value: p.default_value.map(DefaultValue::Integer),
                    decorators: build_decorators(&p.decorators, &target, ctx.factories, ctx.file_name)?,
                    location: p.location.clone(),
                })
            }
            ast::Property::Double(p) => {
                let validator = p
                    .validator
                    .as_ref()
                    .map(NumberValidator::from_ast_f64)
                    .transpose()
                    .map_err(|e| ctx.locate(e, p.location.as_ref()))?;
                check_numeric_default(ctx, &p.name, validator.as_ref(), p.default_value, p.location.as_ref())?;
                Property::Field(Field {
                    name: p.name.clone(),
                    type_ref: TypeRef::Primitive(PrimitiveType::Double),
                    is_array: p.is_array,
                    is_optional: p.is_optional,
                    validator: validator.map(Validator::Number),
                    default_value: p.default_value.map(DefaultValue::Double),
                    decorators: build_decorators(&p.decorators, &target, ctx.factories, ctx.file_name)?,
                    location: p.location.clone(),
                })
            }
            ast::Property::Boolean(p) => Property::Field(Field {
                name: p.name.clone(),
                type_ref: TypeRef::Primitive(PrimitiveType::Boolean),
                is_array: p.is_array,
                is_optional: p.is_optional,
                validator: None,
                default_value: p.default_value.map(DefaultValue::Boolean),
                decorators: build_decorators(&p.decorators, &target, ctx.factories, ctx.file_name)?,
                location: p.location.clone(),
            }),
            ast::Property::DateTime(p) => Property::Field(Field {
                name: p.name.clone(),
                type_ref: TypeRef::Primitive(PrimitiveType::DateTime),
                is_array: p.is_array,
                is_optional: p.is_optional,
                validator: None,
                default_value: None,
                decorators: build_decorators(&p.decorators, &target, ctx.factories, ctx.file_name)?,
                location: p.location.clone(),
            }),
            ast::Property::Object(p) => Property::Field(Field {
                name: p.name.clone(),
                type_ref: TypeRef::Named(p.type_id.clone()),
                is_array: p.is_array,
                is_optional: p.is_optional,
                validator: None,
                default_value: p.default_value.clone().map(DefaultValue::String),
                decorators: build_decorators(&p.decorators, &target, ctx.factories, ctx.file_name)?,
                location: p.location.clone(),
            }),
            ast::Property::Relationship(p) => Property::Relationship(RelationshipDeclaration {
                name: p.name.clone(),
                type_id: p.type_id.clone(),
                is_array: p.is_array,
                is_optional: p.is_optional,
                decorators: build_decorators(&p.decorators, &target, ctx.factories, ctx.file_name)?,
                location: p.location.clone(),
            }),
            ast::Property::Enum(p) => Property::EnumValue(EnumValue {
                name: p.name.clone(),
                decorators: build_decorators(&p.decorators, &target, ctx.factories, ctx.file_name)?,
                location: p.location.clone(),
            }),
        };

        Ok(property)
    }
}

fn check_numeric_default(
    ctx: &BuildContext<'_>,
    name: &str,
    validator: Option<&NumberValidator>,
    default: Option<f64>,
    location: Option<&Location>,
) -> Result<()> {
    if let (Some(v), Some(default)) = (validator, default) {
        v.validate(name, default).map_err(|e| {
            ctx.illegal(format!("Default value for field {} is invalid: {}", name, e), location)
        })?;
    }
    Ok(())
}
