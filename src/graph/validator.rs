//! Field validators
//!
//! Numeric range and string regex/length constraints attached to fields and
//! scalar declarations. Validators are checked for well-formedness when the
//! model file is built, and applied to values by the serializer.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::ast;
use crate::error::{ModelError, Result};

#[derive(Debug, Clone)]
pub enum Validator {
    Number(NumberValidator),
    String(StringValidator),
}

impl Validator {
    pub fn as_number(&self) -> Option<&NumberValidator> {
        match self {
            Validator::Number(v) => Some(v),
            Validator::String(_) => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringValidator> {
        match self {
            Validator::String(v) => Some(v),
            Validator::Number(_) => None,
        }
    }
}

// =============================================================================
// Numbers
// =============================================================================

/// Inclusive lower/upper bounds for Integer, Long and Double fields
#[derive(Debug, Clone, PartialEq)]
pub struct NumberValidator {
    lower: Option<f64>,
    upper: Option<f64>,
}

impl NumberValidator {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Result<Self> {
        match (lower, upper) {
            (None, None) => Err(ModelError::illegal_model(
                "Invalid range, lower and upper bound cannot both be missing",
            )),
            (Some(l), Some(u)) if l > u => Err(ModelError::illegal_model(format!(
                "Lower bound {} must be less than or equal to upper bound {}",
                l, u
            ))),
            _ => Ok(Self { lower, upper }),
        }
    }

    pub(crate) fn from_ast_i64(validator: &ast::DomainValidator<i64>) -> Result<Self> {
        Self::new(validator.lower.map(|v| v as f64), validator.upper.map(|v| v as f64))
    }

    pub(crate) fn from_ast_f64(validator: &ast::DomainValidator<f64>) -> Result<Self> {
        Self::new(validator.lower, validator.upper)
    }

    pub fn lower(&self) -> Option<f64> {
        self.lower
    }

    pub fn upper(&self) -> Option<f64> {
        self.upper
    }

    /// Check a value; `path` names the field in the error
    pub fn validate(&self, path: &str, value: f64) -> Result<()> {
        if let Some(lower) = self.lower {
            if value < lower {
                return Err(ModelError::validation_at(
                    path,
                    format!("Value {} at path `{}` is outside lower bound {}", value, path, lower),
                ));
            }
        }
        if let Some(upper) = self.upper {
            if value > upper {
                return Err(ModelError::validation_at(
                    path,
                    format!("Value {} at path `{}` is outside upper bound {}", value, path, upper),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for NumberValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "range=[{},{}]", bound(self.lower), bound(self.upper))
    }
}

// =============================================================================
// Strings
// =============================================================================

/// Regex and/or length constraint for String fields
#[derive(Debug, Clone)]
pub struct StringValidator {
    pattern: Option<String>,
    flags: String,
    regex: Option<Regex>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl StringValidator {
    /// Build from a JS-style pattern with `i`, `m`, `s`, `u` flags and optional length bounds
    pub fn new(
        pattern: Option<(&str, &str)>,
        min_length: Option<i64>,
        max_length: Option<i64>,
    ) -> Result<Self> {
        let regex = match pattern {
            Some((pattern, flags)) => Some(compile_pattern(pattern, flags)?),
            None => None,
        };

        let to_len = |bound: Option<i64>, label: &str| -> Result<Option<usize>> {
            bound
                .map(|b| {
                    usize::try_from(b).map_err(|_| {
                        ModelError::illegal_model(format!("{} must be a non-negative integer, got {}", label, b))
                    })
                })
                .transpose()
        };
        let min_length = to_len(min_length, "minLength")?;
        let max_length = to_len(max_length, "maxLength")?;

        if let (Some(min), Some(max)) = (min_length, max_length) {
            if min > max {
                return Err(ModelError::illegal_model(format!(
                    "minLength {} must be less than or equal to maxLength {}",
                    min, max
                )));
            }
        }
        if regex.is_none() && min_length.is_none() && max_length.is_none() {
            return Err(ModelError::illegal_model(
                "String validator must specify a pattern or a length bound",
            ));
        }

        Ok(Self {
            pattern: pattern.map(|(p, _)| p.to_string()),
            flags: pattern.map(|(_, f)| f.to_string()).unwrap_or_default(),
            regex,
            min_length,
            max_length,
        })
    }

    pub(crate) fn from_ast(
        regex: Option<&ast::StringRegexValidator>,
        length: Option<&ast::StringLengthValidator>,
    ) -> Result<Option<Self>> {
        if regex.is_none() && length.is_none() {
            return Ok(None);
        }
        let pattern = regex.map(|r| (r.pattern.as_str(), r.flags.as_str()));
        let min = length.and_then(|l| l.min_length);
        let max = length.and_then(|l| l.max_length);
        Self::new(pattern, min, max).map(Some)
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Pattern with the flags folded in as an inline group, e.g. `(?i)abc`
    pub fn inline_pattern(&self) -> Option<String> {
        self.pattern.as_deref().map(|p| with_inline_flags(p, &self.flags))
    }

    pub fn min_length(&self) -> Option<usize> {
        self.min_length
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Length is counted in chars
    pub fn validate(&self, path: &str, value: &str) -> Result<()> {
        let length = value.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                return Err(ModelError::validation_at(
                    path,
                    format!("The string length of \"{}\" at path `{}` should be at least {}", value, path, min),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(ModelError::validation_at(
                    path,
                    format!("The string length of \"{}\" at path `{}` should not exceed {}", value, path, max),
                ));
            }
        }
        if let Some(regex) = &self.regex {
            if !regex.is_match(value) {
                return Err(ModelError::validation_at(
                    path,
                    format!(
                        "Value \"{}\" at path `{}` failed to match validation regex: /{}/{}",
                        value,
                        path,
                        self.pattern.as_deref().unwrap_or_default(),
                        self.flags
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn with_inline_flags(pattern: &str, flags: &str) -> String {
    let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
    if inline.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", inline, pattern)
    }
}

fn compile_pattern(pattern: &str, flags: &str) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            // Rust regexes are always Unicode-aware
            'u' => {}
            other => {
                return Err(ModelError::illegal_model(format!(
                    "Unsupported regex flag \"{}\" in /{}/{}",
                    other, pattern, flags
                )))
            }
        }
    }
    builder.build().map_err(|e| {
        ModelError::illegal_model(format!("Invalid regex /{}/{}: {}", pattern, flags, e))
    })
}
