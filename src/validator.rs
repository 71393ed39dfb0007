//! JSON Schema validation against a [`CompiledSchema`].

use crate::error::ApiError;
use crate::lineschema::Direction;
use crate::schema::CompiledSchema;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// JSON pointer into the validated document (empty for the root)
    pub location: String,
    /// Schema keyword that failed (`required`, `type`, `enum`, ...)
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.location, self.message)
        }
    }
}

/// Every issue found in one document, in validator order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub direction: Direction,
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed document. No validator means success.
pub fn validate_value(document: &Value, schema: &CompiledSchema) -> Result<(), ValidationError> {
    let Some(validator) = schema.validator() else {
        return Ok(());
    };
    let issues: Vec<_> = validator
        .iter_errors(document)
        .map(|error| {
            let schema_path = error.schema_path.to_string();
            let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_string();
            ValidationIssue::new(error.instance_path.to_string(), keyword, error.to_string())
        })
        .collect();
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            direction: schema.direction(),
            issues,
        })
    }
}

/// Validate a serialized document. Never mutates its input.
pub fn validate(document: &[u8], schema: &CompiledSchema) -> Result<(), ApiError> {
    if !schema.has_validator() {
        return Ok(());
    }
    let value: Value = serde_json::from_slice(document)?;
    validate_value(&value, schema)?;
    Ok(())
}
