//! Resource -> wire tree

use std::collections::HashSet;

use serde_json::{Map, Number, Value as Json};

use super::datetime::format_datetime;
use super::path::WirePath;
use super::EncodeOptions;
use crate::error::{ModelError, Result};
use crate::graph::{Declaration, Field, PrimitiveType, ResolvedProperty, Validator};
use crate::names::{CLASS_KEY, IDENTIFIER_FIELD, ID_KEY};
use crate::registry::ModelRegistry;
use crate::resource::{Relationship, Resource, Value};

pub(super) struct Encoder<'a> {
    registry: &'a ModelRegistry,
    options: &'a EncodeOptions,
    /// Fully-qualified identifiers of resources already written
    seen: HashSet<String>,
}

impl<'a> Encoder<'a> {
    pub fn new(registry: &'a ModelRegistry, options: &'a EncodeOptions) -> Self {
        Self {
            registry,
            options,
            seen: HashSet::new(),
        }
    }

    pub fn encode_root(mut self, resource: &Resource) -> Result<Json> {
        self.encode_resource(resource, None, &WirePath::root())
    }

    fn encode_resource(&mut self, resource: &Resource, declared: Option<&str>, path: &WirePath) -> Result<Json> {
        let registry = self.registry;
        let fqn = resource.fully_qualified_type();
        let class = registry.resolved_class(&fqn)?;
        let label = resource.fully_qualified_identifier().unwrap_or_else(|| fqn.clone());

        if self.options.validate {
            if class.is_abstract {
                return Err(ModelError::validation_at(
                    path,
                    format!("Cannot serialize an instance of the abstract type `{}`", fqn),
                ));
            }
            if let Some(declared) = declared {
                if !registry.is_assignable(&fqn, declared) {
                    return Err(ModelError::validation_at(
                        path,
                        format!(
                            "Instance of type `{}` at path `{}` is not assignable to the declared type `{}`",
                            fqn, path, declared
                        ),
                    ));
                }
            }
            if let Some((name, _)) = resource.values().find(|(name, _)| class.property(name).is_none()) {
                return Err(ModelError::validation_at(
                    path.field(name),
                    format!(
                        "Instance `{}` has a property named `{}`, which is not declared in `{}`",
                        label, name, fqn
                    ),
                ));
            }
        }

        let mut out = Map::new();
        out.insert(CLASS_KEY.to_string(), Json::String(fqn.clone()));

        if let Some(fqid) = resource.fully_qualified_identifier() {
            self.seen.insert(fqid);
            if self.options.deduplicate_resources {
                if let Some(uri) = resource.to_uri() {
                    out.insert(ID_KEY.to_string(), Json::String(uri));
                }
            }
        }

        for prop in &class.properties {
            let name = prop.name();

            if name == IDENTIFIER_FIELD && class.has_explicit_identifier() {
                if let Some(id) = resource.identifier() {
                    out.insert(name.to_string(), Json::String(id.to_string()));
                }
                continue;
            }

            let child = path.field(name);
            let Some(value) = resource.get(name) else {
                if self.options.validate && !prop.is_optional() {
                    return Err(ModelError::validation_at(
                        &child,
                        format!("The instance `{}` is missing the required field `{}`", label, name),
                    ));
                }
                continue;
            };

            let encoded = self.encode_property(prop, value, &child)?;
            out.insert(name.to_string(), encoded);
        }

        Ok(Json::Object(out))
    }

    fn encode_property(&mut self, prop: &ResolvedProperty, value: &Value, path: &WirePath) -> Result<Json> {
        if !prop.is_array() {
            return self.encode_item(prop, value, path);
        }
        let Value::Array(items) = value else {
            return Err(type_error(path, &prop.type_label()));
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(self.encode_item(prop, item, &path.index(i))?);
        }
        Ok(Json::Array(out))
    }

    fn encode_item(&mut self, prop: &ResolvedProperty, value: &Value, path: &WirePath) -> Result<Json> {
        if prop.is_relationship() {
            return self.encode_relationship(prop, value, path);
        }
        if let Some(field) = prop.effective_field() {
            if let Some(primitive) = field.primitive() {
                return self.encode_primitive(field, primitive, value, path);
            }
        }

        let registry = self.registry;
        let Some(target) = prop.target_fqn() else {
            return Err(type_error(path, &prop.item_type_label()));
        };

        match registry.get_type(target)? {
            Declaration::Class(_) => {
                let Value::Concept(resource) = value else {
                    return Err(type_error(path, target));
                };
                if self.options.deduplicate_resources {
                    if let Some(uri) = self.already_seen(resource) {
                        return Ok(Json::String(uri));
                    }
                }
                self.encode_resource(resource, Some(target), path)
            }
            Declaration::Enum(declaration) => {
                let name = match value {
                    Value::Enum(name) | Value::String(name) => name,
                    _ => return Err(type_error(path, target)),
                };
                if self.options.validate && !declaration.has_value(name) {
                    return Err(ModelError::validation_at(
                        path,
                        format!(
                            "Value `{}` at path `{}` is not a valid value of the enum `{}`",
                            name, path, target
                        ),
                    ));
                }
                Ok(Json::String(name.clone()))
            }
            Declaration::Map(_) => {
                let Value::Map(entries) = value else {
                    return Err(type_error(path, target));
                };
                self.encode_map(target, entries, path)
            }
            Declaration::Scalar(_) => Err(type_error(path, target)),
        }
    }

    fn encode_relationship(&mut self, prop: &ResolvedProperty, value: &Value, path: &WirePath) -> Result<Json> {
        let registry = self.registry;
        let target = prop.target_fqn().unwrap_or_default();

        match value {
            Value::Relationship(rel) => {
                if self.options.validate && !registry.is_assignable(&rel.fully_qualified_type(), target) {
                    return Err(ModelError::validation_at(
                        path,
                        format!(
                            "Relationship at path `{}` points to `{}`, which is not assignable to `{}`",
                            path,
                            rel.fully_qualified_type(),
                            target
                        ),
                    ));
                }
                Ok(Json::String(self.pointer(rel)))
            }
            Value::Concept(resource) => {
                if self.options.convert_resources_to_relationships {
                    let rel = resource.to_relationship().ok_or_else(|| {
                        ModelError::validation_at(
                            path,
                            format!("Resource at path `{}` has no identifier and cannot be a relationship", path),
                        )
                    })?;
                    return Ok(Json::String(self.pointer(&rel)));
                }
                if !self.options.permit_resources_for_relationships {
                    return Err(ModelError::validation_at(
                        path,
                        format!(
                            "Did not find a relationship for `{}` at path `{}`; found an embedded resource",
                            target, path
                        ),
                    ));
                }
                if self.already_seen(resource).is_some() {
                    if let Some(rel) = resource.to_relationship() {
                        return Ok(Json::String(self.pointer(&rel)));
                    }
                }
                self.encode_resource(resource, Some(target), path)
            }
            _ => Err(type_error(path, &prop.item_type_label())),
        }
    }

    fn encode_map(&mut self, target: &str, entries: &[(Value, Value)], path: &WirePath) -> Result<Json> {
        let registry = self.registry;
        let map = registry.resolved_map(target)?;
        let key_field = map
            .key
            .effective_field()
            .ok_or_else(|| type_error(path, target))?;
        let key_primitive = key_field.primitive().ok_or_else(|| type_error(path, target))?;

        let mut out = Map::new();
        for (key, value) in entries {
            let Json::String(key_text) = self.encode_primitive(key_field, key_primitive, key, path)? else {
                return Err(type_error(path, key_primitive.name()));
            };
            let child = path.field(&key_text);
            let encoded = self.encode_item(&map.value, value, &child)?;
            out.insert(key_text, encoded);
        }
        Ok(Json::Object(out))
    }

    fn encode_primitive(&self, field: &Field, primitive: PrimitiveType, value: &Value, path: &WirePath) -> Result<Json> {
        if self.options.validate {
            check_primitive(field, primitive, value, path)?;
        }

        match value {
            Value::String(s) | Value::Enum(s) => Ok(Json::String(s.clone())),
            Value::Boolean(b) => Ok(Json::Bool(*b)),
            Value::Integer(i) | Value::Long(i) => Ok(Json::from(*i)),
            Value::Double(d) => Number::from_f64(*d)
                .map(Json::Number)
                .ok_or_else(|| ModelError::validation_at(path, format!("Value at path `{}` is not a finite number", path))),
            Value::DateTime(dt) => Ok(Json::String(format_datetime(dt, self.options.utc_offset))),
            _ => Err(type_error(path, primitive.name())),
        }
    }

    /// URI form, or the bare identifier with `convert_resources_to_id`
    fn pointer(&self, rel: &Relationship) -> String {
        if self.options.convert_resources_to_id {
            rel.identifier.clone()
        } else {
            rel.to_uri()
        }
    }

    fn already_seen(&self, resource: &Resource) -> Option<String> {
        let fqid = resource.fully_qualified_identifier()?;
        if self.seen.contains(&fqid) {
            resource.to_uri()
        } else {
            None
        }
    }
}

fn type_error(path: &WirePath, expected: &str) -> ModelError {
    ModelError::validation_at(
        path,
        format!("Expected value at path `{}` to be of type `{}`", path, expected),
    )
}

/// Shape and validator check of a primitive value
pub(super) fn check_primitive(field: &Field, primitive: PrimitiveType, value: &Value, path: &WirePath) -> Result<()> {
    let path_text = path.to_string();
    match (primitive, value) {
        (PrimitiveType::String, Value::String(s)) => {
            if let Some(Validator::String(v)) = &field.validator {
                v.validate(&path_text, s)?;
            }
        }
        (PrimitiveType::Integer | PrimitiveType::Long, Value::Integer(i) | Value::Long(i)) => {
            if let Some(Validator::Number(v)) = &field.validator {
                v.validate(&path_text, *i as f64)?;
            }
        }
        (PrimitiveType::Double, Value::Double(d)) => {
            if let Some(Validator::Number(v)) = &field.validator {
                v.validate(&path_text, *d)?;
            }
        }
        (PrimitiveType::Double, Value::Integer(i) | Value::Long(i)) => {
            if let Some(Validator::Number(v)) = &field.validator {
                v.validate(&path_text, *i as f64)?;
            }
        }
        (PrimitiveType::Boolean, Value::Boolean(_)) | (PrimitiveType::DateTime, Value::DateTime(_)) => {}
        _ => return Err(type_error(path, primitive.name())),
    }
    Ok(())
}
