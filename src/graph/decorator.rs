//! Decorators and the decorator factory extension point

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::ast;
use crate::error::{Location, ModelError, Result};

/// A decorator argument
#[derive(Debug, Clone, PartialEq)]
pub enum DecoratorValue {
    String(String),
    Number(f64),
    Boolean(bool),
    /// Reference to a declared type, resolved during validation
    TypeReference { type_id: ast::TypeIdentifier, is_array: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub name: String,
    pub arguments: Vec<DecoratorValue>,
    pub location: Option<Location>,
}

impl Decorator {
    /// Pass-through conversion of an AST decorator
    pub fn from_ast(node: &ast::Decorator) -> Self {
        let arguments = node
            .arguments
            .iter()
            .map(|arg| match arg {
                ast::DecoratorArgument::String { value } => DecoratorValue::String(value.clone()),
                ast::DecoratorArgument::Number { value } => DecoratorValue::Number(*value),
                ast::DecoratorArgument::Boolean { value } => DecoratorValue::Boolean(*value),
                ast::DecoratorArgument::TypeReference { type_id, is_array } => DecoratorValue::TypeReference {
                    type_id: type_id.clone(),
                    is_array: *is_array,
                },
            })
            .collect();
        Self {
            name: node.name.clone(),
            arguments,
            location: node.location.clone(),
        }
    }

    pub fn type_references(&self) -> impl Iterator<Item = &ast::TypeIdentifier> {
        self.arguments.iter().filter_map(|arg| match arg {
            DecoratorValue::TypeReference { type_id, .. } => Some(type_id),
            _ => None,
        })
    }
}

/// Where a decorator is attached, e.g. `org.acme@1.0.0.Car.vin`
#[derive(Debug, Clone, Copy)]
pub struct DecoratorTarget<'a> {
    pub namespace: &'a str,
    pub declaration: Option<&'a str>,
    pub property: Option<&'a str>,
}

impl fmt::Display for DecoratorTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.namespace)?;
        if let Some(declaration) = self.declaration {
            write!(f, ".{}", declaration)?;
        }
        if let Some(property) = self.property {
            write!(f, ".{}", property)?;
        }
        Ok(())
    }
}

/// Pluggable constructor for decorators.
///
/// Factories are consulted in registration order; the first to return a
/// decorator wins. When none does, the decorator is converted as-is.
pub trait DecoratorFactory: Send + Sync {
    fn new_decorator(&self, target: &DecoratorTarget<'_>, node: &ast::Decorator) -> Result<Option<Decorator>>;
}

/// Convert the decorators of one model element, rejecting duplicate names
pub(crate) fn build_decorators(
    nodes: &[ast::Decorator],
    target: &DecoratorTarget<'_>,
    factories: &[Arc<dyn DecoratorFactory>],
    file_name: Option<&str>,
) -> Result<Vec<Decorator>> {
    let mut seen = HashSet::new();
    let mut decorators = Vec::with_capacity(nodes.len());

    for node in nodes {
        if !seen.insert(node.name.as_str()) {
            return Err(ModelError::illegal_model_at(
                format!("Duplicate decorator {} on {}", node.name, target),
                file_name,
                node.location.as_ref(),
            ));
        }

        let mut built = None;
        for factory in factories {
            if let Some(decorator) = factory.new_decorator(target, node)? {
                built = Some(decorator);
                break;
            }
        }
        decorators.push(built.unwrap_or_else(|| Decorator::from_ast(node)));
    }

    Ok(decorators)
}
