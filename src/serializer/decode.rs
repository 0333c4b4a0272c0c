//! Wire tree -> Resource

use serde_json::{Map, Value as Json};

use super::datetime::parse_datetime;
use super::encode::check_primitive;
use super::path::WirePath;
use super::DecodeOptions;
use crate::error::{ModelError, Result};
use crate::factory::Factory;
use crate::graph::{Declaration, Field, PrimitiveType, ResolvedClass, ResolvedProperty};
use crate::names::{is_system_property, split_fqn, CLASS_KEY, IDENTIFIER_FIELD, ID_KEY, TIMESTAMP_FIELD};
use crate::registry::ModelRegistry;
use crate::resource::{Relationship, Resource, Value};

pub(super) struct Decoder<'a> {
    registry: &'a ModelRegistry,
    factory: &'a dyn Factory,
    options: &'a DecodeOptions,
}

impl<'a> Decoder<'a> {
    pub fn new(registry: &'a ModelRegistry, factory: &'a dyn Factory, options: &'a DecodeOptions) -> Self {
        Self {
            registry,
            factory,
            options,
        }
    }

    pub fn decode_root(&self, json: &Json) -> Result<Resource> {
        let missing_class = || ModelError::validation("Invalid JSON data. Does not contain a $class type identifier.");
        let object = json.as_object().ok_or_else(missing_class)?;
        let fqn = object.get(CLASS_KEY).and_then(Json::as_str).ok_or_else(missing_class)?;
        self.decode_resource(fqn, object, &WirePath::root())
    }

    fn decode_resource(&self, fqn: &str, object: &Map<String, Json>, path: &WirePath) -> Result<Resource> {
        let class = self.registry.resolved_class(fqn)?;
        if class.is_abstract {
            return Err(ModelError::validation_at(
                path,
                format!("Cannot instantiate abstract type `{}`", fqn),
            ));
        }
        check_keys(class, object, path)?;

        let mut resource = match &class.identifier {
            Some(id_field) => {
                let id = object.get(id_field).and_then(Json::as_str).unwrap_or_default();
                self.factory.new_resource(&class.namespace, &class.name, id)?
            }
            None => self.factory.new_concept(&class.namespace, &class.name)?,
        };

        for prop in &class.properties {
            let name = prop.name();
            if name == IDENTIFIER_FIELD && class.has_explicit_identifier() {
                continue;
            }
            match object.get(name) {
                None | Some(Json::Null) => {}
                Some(json) => {
                    let value = self.decode_property(prop, json, &path.field(name))?;
                    resource.set(name, value);
                }
            }
        }

        if self.options.validate {
            for prop in &class.properties {
                let name = prop.name();
                if prop.is_optional() || resource.contains(name) {
                    continue;
                }
                if name == IDENTIFIER_FIELD && class.has_explicit_identifier() {
                    continue;
                }
                return Err(ModelError::validation_at(
                    path.field(name),
                    format!("The instance `{}` is missing the required field `{}`", fqn, name),
                ));
            }
            if class.is_identified() && resource.identifier().map_or(true, str::is_empty) {
                return Err(ModelError::validation_at(
                    path,
                    format!("The instance of `{}` has an empty identifier", fqn),
                ));
            }
        }

        Ok(resource)
    }

    fn decode_property(&self, prop: &ResolvedProperty, json: &Json, path: &WirePath) -> Result<Value> {
        if !prop.is_array() {
            return self.decode_item(prop, json, path);
        }
        let Json::Array(items) = json else {
            return Err(type_error(path, &prop.type_label()));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.decode_item(prop, item, &path.index(i)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    fn decode_item(&self, prop: &ResolvedProperty, json: &Json, path: &WirePath) -> Result<Value> {
        if prop.is_relationship() {
            return self.decode_relationship(prop, json, path);
        }
        if let Some(field) = prop.effective_field() {
            if let Some(primitive) = field.primitive() {
                return self.decode_primitive(field, primitive, json, path);
            }
        }

        let target = prop
            .target_fqn()
            .ok_or_else(|| type_error(path, &prop.item_type_label()))?;

        match self.registry.get_type(target)? {
            Declaration::Class(_) => {
                let Json::Object(object) = json else {
                    return Err(type_error(path, target));
                };
                self.decode_nested(target, object, path).map(Value::from)
            }
            Declaration::Enum(declaration) => {
                let name = json.as_str().ok_or_else(|| type_error(path, target))?;
                if self.options.validate && !declaration.has_value(name) {
                    return Err(ModelError::validation_at(
                        path,
                        format!(
                            "Value `{}` at path `{}` is not a valid value of the enum `{}`",
                            name, path, target
                        ),
                    ));
                }
                Ok(Value::Enum(name.to_string()))
            }
            Declaration::Map(_) => {
                let Json::Object(object) = json else {
                    return Err(type_error(path, target));
                };
                self.decode_map(target, object, path)
            }
            Declaration::Scalar(_) => Err(type_error(path, target)),
        }
    }

    /// Nested object: runtime type from its own `$class`, else the declared type
    fn decode_nested(&self, declared: &str, object: &Map<String, Json>, path: &WirePath) -> Result<Resource> {
        let runtime = object.get(CLASS_KEY).and_then(Json::as_str).unwrap_or(declared);
        if !self.registry.is_assignable(runtime, declared) {
            return Err(ModelError::validation_at(
                path,
                format!(
                    "Instance of type `{}` at path `{}` is not assignable to the declared type `{}`",
                    runtime, path, declared
                ),
            ));
        }
        self.decode_resource(runtime, object, path)
    }

    fn decode_relationship(&self, prop: &ResolvedProperty, json: &Json, path: &WirePath) -> Result<Value> {
        let target = prop.target_fqn().unwrap_or_default();
        let (namespace, type_name) = split_fqn(target).unwrap_or(("", target));

        match json {
            Json::String(uri) => {
                let rel = Relationship::from_uri(uri, namespace, type_name)
                    .map_err(|e| ModelError::validation_at(path, e.to_string()))?;
                if self.options.validate && !self.registry.is_assignable(&rel.fully_qualified_type(), target) {
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
                Ok(Value::Relationship(rel))
            }
            Json::Object(object) if self.options.accept_resources_for_relationships => {
                self.decode_nested(target, object, path).map(Value::from)
            }
            _ => Err(ModelError::validation_at(
                path,
                format!("Expected value at path `{}` to be a relationship to `{}`", path, target),
            )),
        }
    }

    fn decode_map(&self, target: &str, object: &Map<String, Json>, path: &WirePath) -> Result<Value> {
        let map = self.registry.resolved_map(target)?;
        let key_field = map
            .key
            .effective_field()
            .ok_or_else(|| type_error(path, target))?;
        let key_primitive = key_field.primitive().ok_or_else(|| type_error(path, target))?;

        let mut entries = Vec::with_capacity(object.len());
        for (key, json) in object {
            if is_system_property(key) {
                continue;
            }
            let child = path.field(key);
            let key_value = self.decode_primitive(key_field, key_primitive, &Json::String(key.clone()), &child)?;
            let value = self.decode_item(&map.value, json, &child)?;
            entries.push((key_value, value));
        }
        Ok(Value::Map(entries))
    }

    fn decode_primitive(&self, field: &Field, primitive: PrimitiveType, json: &Json, path: &WirePath) -> Result<Value> {
        let value = match primitive {
            PrimitiveType::String => json.as_str().map(|s| Value::String(s.to_string())),
            PrimitiveType::Boolean => json.as_bool().map(Value::Boolean),
            PrimitiveType::Integer => integral(json).map(Value::Integer),
            PrimitiveType::Long => integral(json).map(Value::Long),
            PrimitiveType::Double => json.as_f64().map(Value::Double),
            PrimitiveType::DateTime => json
                .as_str()
                .and_then(|s| {
                    parse_datetime(
                        s,
                        self.options.strict_qualified_date_times,
                        self.options.utc_offset,
                    )
                })
                .map(Value::DateTime),
        }
        .ok_or_else(|| type_error(path, primitive.name()))?;

        if self.options.validate {
            check_primitive(field, primitive, &value, path)?;
        }
        Ok(value)
    }
}

/// Reject reserved and undeclared keys before anything is populated
fn check_keys(class: &ResolvedClass, object: &Map<String, Json>, path: &WirePath) -> Result<()> {
    let mut reserved = Vec::new();
    let mut unknown = Vec::new();

    for (key, value) in object {
        if value.is_null() {
            continue;
        }
        match key.as_str() {
            CLASS_KEY | ID_KEY | IDENTIFIER_FIELD => {}
            TIMESTAMP_FIELD if class.is_timestamped() => {}
            key if is_system_property(key) => reserved.push(key),
            key if class.property(key).is_none() => unknown.push(key),
            _ => {}
        }
    }

    if !reserved.is_empty() {
        return Err(ModelError::validation_at(
            path,
            format!(
                "Unexpected reserved properties for type {}: {}",
                class.fqn,
                reserved.join(", ")
            ),
        ));
    }
    if !unknown.is_empty() {
        return Err(ModelError::validation_at(
            path,
            format!("Unexpected properties for type {}: {}", class.fqn, unknown.join(", ")),
        ));
    }
    Ok(())
}

/// Integer value of a JSON number with no fractional part
fn integral(json: &Json) -> Option<i64> {
    if let Some(i) = json.as_i64() {
        return Some(i);
    }
    let f = json.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn type_error(path: &WirePath, expected: &str) -> ModelError {
    ModelError::validation_at(
        path,
        format!("Expected value at path `{}` to be of type `{}`", path, expected),
    )
}
