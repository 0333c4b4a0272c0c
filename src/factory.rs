//! Instance construction
//!
//! The [`Factory`] trait is the single way the serializer and the instance
//! generator create instances. [`ModelFactory`] is the registry-backed
//! implementation: it refuses abstract and non-class types, assigns declared
//! defaults and stamps `$timestamp` on transactions and events.

use chrono::{Offset, Utc};

use crate::error::{ModelError, Result};
use crate::graph::{DefaultValue, PrimitiveType, ResolvedClass, ResolvedProperty};
use crate::names::{fully_qualified_name, TIMESTAMP_FIELD};
use crate::registry::ModelRegistry;
use crate::resource::{Relationship, Resource, Value};
use crate::serializer::datetime::parse_datetime;

pub trait Factory: Send + Sync {
    /// New instance of an identified class
    fn new_resource(&self, namespace: &str, type_name: &str, id: &str) -> Result<Resource>;

    /// New instance of a class without an identifier
    fn new_concept(&self, namespace: &str, type_name: &str) -> Result<Resource>;

    /// Pointer to an instance of an identified class
    fn new_relationship(&self, namespace: &str, type_name: &str, id: &str) -> Result<Relationship>;
}

#[derive(Clone)]
pub struct ModelFactory {
    registry: ModelRegistry,
}

impl ModelFactory {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    fn instantiable(&self, namespace: &str, type_name: &str) -> Result<&ResolvedClass> {
        let fqn = fully_qualified_name(namespace, type_name);
        let class = self.registry.resolved_class(&fqn)?;
        if class.is_abstract {
            return Err(ModelError::validation(format!(
                "Cannot instantiate the abstract type \"{}\"",
                fqn
            )));
        }
        Ok(class)
    }

    fn initialize(&self, class: &ResolvedClass, resource: &mut Resource) -> Result<()> {
        for prop in &class.properties {
            if let Some(value) = default_value(prop)? {
                resource.set(prop.name(), value);
            }
        }
        if class.is_timestamped() {
            resource.set(TIMESTAMP_FIELD, Value::DateTime(Utc::now().with_timezone(&Utc.fix())));
        }
        Ok(())
    }
}

impl Factory for ModelFactory {
    fn new_resource(&self, namespace: &str, type_name: &str, id: &str) -> Result<Resource> {
        let class = self.instantiable(namespace, type_name)?;
        if !class.is_identified() {
            return Err(ModelError::validation(format!(
                "Type \"{}\" is not identified; use new_concept",
                class.fqn
            )));
        }

        let mut resource = Resource::new(namespace, type_name, class.identifier.clone());
        self.initialize(class, &mut resource)?;
        resource.set_identifier(id)?;
        Ok(resource)
    }

    fn new_concept(&self, namespace: &str, type_name: &str) -> Result<Resource> {
        let class = self.instantiable(namespace, type_name)?;
        if class.is_identified() {
            return Err(ModelError::validation(format!(
                "Type \"{}\" is identified; use new_resource",
                class.fqn
            )));
        }

        let mut resource = Resource::new(namespace, type_name, None);
        self.initialize(class, &mut resource)?;
        Ok(resource)
    }

    fn new_relationship(&self, namespace: &str, type_name: &str, id: &str) -> Result<Relationship> {
        let fqn = fully_qualified_name(namespace, type_name);
        let class = self.registry.resolved_class(&fqn)?;
        if !class.is_identified() {
            return Err(ModelError::validation(format!(
                "Cannot create a relationship to \"{}\": the type is not identified",
                fqn
            )));
        }
        Ok(Relationship::new(namespace, type_name, id))
    }
}

/// Declared default of a property as a runtime value
pub(crate) fn default_value(prop: &ResolvedProperty) -> Result<Option<Value>> {
    let Some(field) = prop.effective_field() else {
        return Ok(None);
    };
    let Some(default) = &field.default_value else {
        return Ok(None);
    };

    let value = match (field.primitive(), default) {
        (Some(PrimitiveType::String), DefaultValue::String(s)) => Value::String(s.clone()),
        (Some(PrimitiveType::Boolean), DefaultValue::Boolean(b)) => Value::Boolean(*b),
        (Some(PrimitiveType::Integer), DefaultValue::Integer(i)) => Value::Integer(*i),
        (Some(PrimitiveType::Long), DefaultValue::Integer(i)) => Value::Long(*i),
        (Some(PrimitiveType::Double), DefaultValue::Double(d)) => Value::Double(*d),
        (Some(PrimitiveType::Double), DefaultValue::Integer(i)) => Value::Double(*i as f64),
        (Some(PrimitiveType::DateTime), DefaultValue::String(s)) => {
            let parsed = parse_datetime(s, false, 0).ok_or_else(|| {
                ModelError::illegal_model(format!("Invalid DateTime default \"{}\" for field {}", s, field.name))
            })?;
            Value::DateTime(parsed)
        }
        // Object fields only carry enum defaults
        (None, DefaultValue::String(s)) => Value::Enum(s.clone()),
        (_, other) => {
            return Err(ModelError::illegal_model(format!(
                "Default value {:?} does not match the type of field {}",
                other, field.name
            )))
        }
    };

    Ok(Some(if prop.is_array() { Value::Array(vec![value]) } else { value }))
}
