//! Error types for the model registry

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// A position in a model source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub offset: u32,
}

/// Source range attached to AST nodes by the external parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.start.line, self.start.column)
    }
}

/// Model registry errors
#[derive(Error, Debug)]
pub enum ModelError {
    /// Structural or semantic violation in a declared model
    #[error("{message}{}", context_suffix(.file_name, .location))]
    IllegalModel {
        message: String,
        file_name: Option<String>,
        location: Option<Location>,
    },

    /// The AST does not conform to the metamodel
    #[error("Metamodel error: {0}")]
    Metamodel(String),

    /// A namespace or type name could not be resolved
    #[error("{message}")]
    TypeNotFound { type_name: String, message: String },

    /// Wire data does not conform to its declaration
    #[error("{message}")]
    Validation { message: String, path: Option<String> },

    /// The instance generator could not fabricate a value
    #[error("{0}")]
    InstanceGeneration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn context_suffix(file_name: &Option<String>, location: &Option<Location>) -> String {
    match (file_name, location) {
        (Some(file), Some(loc)) => format!(" File '{}' {}", file, loc),
        (Some(file), None) => format!(" File '{}'", file),
        (None, Some(loc)) => format!(" ({})", loc),
        (None, None) => String::new(),
    }
}

impl ModelError {
    pub fn illegal_model(message: impl Into<String>) -> Self {
        ModelError::IllegalModel {
            message: message.into(),
            file_name: None,
            location: None,
        }
    }

    /// Illegal model error carrying the source context of the offending node
    pub fn illegal_model_at(
        message: impl Into<String>,
        file_name: Option<&str>,
        location: Option<&Location>,
    ) -> Self {
        ModelError::IllegalModel {
            message: message.into(),
            file_name: file_name.map(String::from),
            location: location.cloned(),
        }
    }

    pub fn type_not_found(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ModelError::TypeNotFound {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ModelError::Validation {
            message: message.into(),
            path: None,
        }
    }

    /// Validation error located at a `$.a.b[0]` style path
    pub fn validation_at(path: impl fmt::Display, message: impl Into<String>) -> Self {
        ModelError::Validation {
            message: message.into(),
            path: Some(path.to_string()),
        }
    }

    pub fn is_illegal_model(&self) -> bool {
        matches!(self, ModelError::IllegalModel { .. })
    }

    pub fn is_type_not_found(&self) -> bool {
        matches!(self, ModelError::TypeNotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ModelError::Validation { .. })
    }

    /// Path of a validation failure, if one was recorded
    pub fn path(&self) -> Option<&str> {
        match self {
            ModelError::Validation { path, .. } => path.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_model_context() {
        let location = Location {
            start: Position { line: 3, column: 5, offset: 40 },
            end: Position { line: 3, column: 12, offset: 47 },
            source: None,
        };
        let err = ModelError::illegal_model_at("Duplicate class name Car", Some("cars.cto"), Some(&location));
        assert_eq!(err.to_string(), "Duplicate class name Car File 'cars.cto' line 3 column 5");
        assert!(err.is_illegal_model());
    }

    #[test]
    fn test_validation_path() {
        let err = ModelError::validation_at("$.owner.name", "Expected value at path `$.owner.name` to be of type `String`");
        assert_eq!(err.path(), Some("$.owner.name"));
        assert!(err.is_validation());
    }
}
