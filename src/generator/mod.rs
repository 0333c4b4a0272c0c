//! Instance Generator
//!
//! Builds a valid instance of a class by walking its resolved properties the
//! same way the serializer does. Primitive values come from a
//! [`ValueGenerator`]: [`EmptyValueGenerator`] for zero values or
//! [`SampleValueGenerator`] for random data within the declared validators.
//!
//! Abstract types are replaced by their first concrete subclass (the class
//! itself, then descendants depth-first in declaration order). A stack of the
//! classes being generated stops recursive models: a required field that
//! would re-enter a class on the stack is an error, an array field becomes
//! empty and an optional field is left unset.

pub mod values;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::factory::{Factory, ModelFactory};
use crate::graph::{
    Declaration, Field, PrimitiveType, ResolvedClass, ResolvedProperty, StringValidator, Validator,
};
use crate::names::{fully_qualified_name, is_system_property};
use crate::registry::ModelRegistry;
use crate::resource::{Resource, Value};

pub use values::{EmptyValueGenerator, SampleValueGenerator, ValueGenerator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    /// Zero values and empty arrays
    #[default]
    Empty,
    /// Random values within validator bounds
    Sample,
}

impl FromStr for GeneratorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "empty" => Ok(GeneratorMode::Empty),
            "sample" => Ok(GeneratorMode::Sample),
            other => Err(format!("Unknown generator mode '{}', expected 'empty' or 'sample'", other)),
        }
    }
}

impl fmt::Display for GeneratorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorMode::Empty => f.write_str("empty"),
            GeneratorMode::Sample => f.write_str("sample"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    pub mode: GeneratorMode,
    /// Also populate optional fields
    pub include_optional_fields: bool,
    /// Seed for [`GeneratorMode::Sample`]; unseeded runs differ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Clone)]
pub struct InstanceGenerator {
    registry: ModelRegistry,
    factory: Arc<dyn Factory>,
}

impl InstanceGenerator {
    pub fn new(registry: ModelRegistry) -> Self {
        let factory = Arc::new(ModelFactory::new(registry.clone()));
        Self { registry, factory }
    }

    pub fn with_factory(registry: ModelRegistry, factory: Arc<dyn Factory>) -> Self {
        Self { registry, factory }
    }

    pub fn generate(&self, namespace: &str, type_name: &str, options: &GenerateOptions) -> Result<Resource> {
        match options.mode {
            GeneratorMode::Empty => self.generate_with(
                namespace,
                type_name,
                &mut EmptyValueGenerator::new(),
                options.include_optional_fields,
            ),
            GeneratorMode::Sample => self.generate_with(
                namespace,
                type_name,
                &mut SampleValueGenerator::new(options.seed),
                options.include_optional_fields,
            ),
        }
    }

    /// Generate with a caller-supplied value source
    pub fn generate_with(
        &self,
        namespace: &str,
        type_name: &str,
        values: &mut dyn ValueGenerator,
        include_optional_fields: bool,
    ) -> Result<Resource> {
        let fqn = fully_qualified_name(namespace, type_name);
        let mut walk = Walk {
            registry: &self.registry,
            factory: self.factory.as_ref(),
            values,
            include_optional_fields,
            stack: Vec::new(),
        };
        walk.class_instance(&fqn)
    }
}

struct Walk<'r, 'v> {
    registry: &'r ModelRegistry,
    factory: &'r dyn Factory,
    values: &'v mut dyn ValueGenerator,
    include_optional_fields: bool,
    /// Concrete classes currently being generated
    stack: Vec<String>,
}

impl<'r, 'v> Walk<'r, 'v> {
    fn class_instance(&mut self, declared: &str) -> Result<Resource> {
        let class = self.concrete(declared)?;
        self.stack.push(class.fqn.clone());
        let result = self.populate(class);
        self.stack.pop();
        result
    }

    fn concrete(&self, fqn: &str) -> Result<&'r ResolvedClass> {
        let registry = self.registry;
        let class = registry.resolved_class(fqn)?;
        if !class.is_abstract {
            return Ok(class);
        }
        registry
            .assignable_classes(fqn)
            .into_iter()
            .find(|c| !c.is_abstract)
            .ok_or_else(|| ModelError::InstanceGeneration(format!("No concrete extending type for \"{}\"", fqn)))
    }

    fn populate(&mut self, class: &'r ResolvedClass) -> Result<Resource> {
        let mut resource = match &class.identifier {
            Some(id_field) => {
                let id = self.values.identifier(identifier_validator(class, id_field));
                self.factory.new_resource(&class.namespace, &class.name, &id)?
            }
            None => self.factory.new_concept(&class.namespace, &class.name)?,
        };

        for prop in &class.properties {
            let name = prop.name();
            // `$identifier` and `$timestamp` are set by the factory
            if is_system_property(name) || class.identifier.as_deref() == Some(name) {
                continue;
            }
            if prop.is_optional() && !self.include_optional_fields {
                continue;
            }
            if resource.contains(name) {
                continue;
            }
            if let Some(value) = self.property_value(prop)? {
                resource.set(name, value);
            }
        }

        Ok(resource)
    }

    fn property_value(&mut self, prop: &ResolvedProperty) -> Result<Option<Value>> {
        let reenters = self.reenters(prop);

        if prop.is_array() {
            if reenters {
                return Ok(Some(Value::Array(Vec::new())));
            }
            let len = self.values.array_length();
            let items = (0..len).map(|_| self.item_value(prop)).collect::<Result<Vec<_>>>()?;
            return Ok(Some(Value::Array(items)));
        }

        if reenters {
            if prop.is_optional() {
                return Ok(None);
            }
            return Err(ModelError::InstanceGeneration("Model is recursive.".to_string()));
        }
        self.item_value(prop).map(Some)
    }

    /// The property holds a class that is already being generated
    fn reenters(&self, prop: &ResolvedProperty) -> bool {
        if prop.is_relationship() {
            return false;
        }
        let Some(target) = prop.target_fqn() else {
            return false;
        };
        if !matches!(self.registry.get_type(target), Ok(Declaration::Class(_))) {
            return false;
        }
        self.concrete(target)
            .map(|class| self.stack.contains(&class.fqn))
            .unwrap_or(false)
    }

    fn item_value(&mut self, prop: &ResolvedProperty) -> Result<Value> {
        let registry = self.registry;

        if prop.is_relationship() {
            let target = prop.target_fqn().unwrap_or_default();
            let class = self.concrete(target)?;
            let id_field = class.identifier.as_deref().unwrap_or_default();
            let id = self.values.identifier(identifier_validator(class, id_field));
            return self
                .factory
                .new_relationship(&class.namespace, &class.name, &id)
                .map(Value::Relationship);
        }

        if let Some(field) = prop.effective_field() {
            if let Some(primitive) = field.primitive() {
                return Ok(self.primitive_value(field, primitive));
            }
        }

        let target = prop.target_fqn().ok_or_else(|| {
            ModelError::InstanceGeneration(format!("Cannot generate a value for field \"{}\"", prop.name()))
        })?;

        match registry.get_type(target)? {
            Declaration::Class(_) => self.class_instance(target).map(Value::from),
            Declaration::Enum(declaration) => {
                if declaration.values.is_empty() {
                    return Err(ModelError::InstanceGeneration(format!("Enum \"{}\" has no values", target)));
                }
                let index = self.values.enum_index(declaration.values.len()) % declaration.values.len();
                Ok(Value::Enum(declaration.values[index].name.clone()))
            }
            Declaration::Map(_) => self.map_value(target),
            Declaration::Scalar(_) => Err(ModelError::InstanceGeneration(format!(
                "Scalar \"{}\" was not unboxed for field \"{}\"",
                target,
                prop.name()
            ))),
        }
    }

    fn map_value(&mut self, target: &str) -> Result<Value> {
        let registry = self.registry;
        let map = registry.resolved_map(target)?;
        let (Some(key_field), Some(key_primitive)) = (map.key.effective_field(), map.key.primitive()) else {
            return Err(ModelError::InstanceGeneration(format!("Map \"{}\" has no usable key type", target)));
        };

        let count = if self.reenters(&map.value) { 0 } else { self.values.array_length() };
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let key = self.primitive_value(key_field, key_primitive);
            let value = self.item_value(&map.value)?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }

    fn primitive_value(&mut self, field: &Field, primitive: PrimitiveType) -> Value {
        let number = field.validator.as_ref().and_then(Validator::as_number);
        let string = field.validator.as_ref().and_then(Validator::as_string);
        match primitive {
            PrimitiveType::String => Value::String(self.values.string(string)),
            PrimitiveType::Boolean => Value::Boolean(self.values.boolean()),
            PrimitiveType::Integer => Value::Integer(self.values.integer(number)),
            PrimitiveType::Long => Value::Long(self.values.long(number)),
            PrimitiveType::Double => Value::Double(self.values.double(number)),
            PrimitiveType::DateTime => Value::DateTime(self.values.date_time()),
        }
    }
}

fn identifier_validator<'c>(class: &'c ResolvedClass, id_field: &str) -> Option<&'c StringValidator> {
    class
        .property(id_field)
        .and_then(ResolvedProperty::effective_field)
        .and_then(|f| f.validator.as_ref())
        .and_then(Validator::as_string)
}
