use super::cache::fingerprint;
use crate::coerce::CoercionTable;
use crate::defaults::DefaultSet;
use crate::error::SchemaCompileError;
use crate::lineschema::{Direction, LineSchema};
use crate::projection::Projection;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Immutable per-route artifact derived from one line schema.
pub struct CompiledSchema {
    direction: Direction,
    fingerprint: String,
    line_schema: LineSchema,
    json_schema: Value,
    validator: Option<jsonschema::Validator>,
    defaults: DefaultSet,
    coercions: CoercionTable,
    projection: Option<Projection>,
}

impl CompiledSchema {
    /// An artifact that declines validation, defaulting and coercion.
    #[must_use]
    pub fn empty(direction: Direction) -> Self {
        Self {
            direction,
            fingerprint: fingerprint(""),
            line_schema: LineSchema::default(),
            json_schema: Value::Null,
            validator: None,
            defaults: DefaultSet::default(),
            coercions: CoercionTable::default(),
            projection: None,
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// First 16 hex chars of the SHA-256 of the schema text.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn line_schema(&self) -> &LineSchema {
        &self.line_schema
    }

    /// Derived JSON Schema document; `null` when validation is declined.
    #[must_use]
    pub fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    pub(crate) fn validator(&self) -> Option<&jsonschema::Validator> {
        self.validator.as_ref()
    }

    #[must_use]
    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    #[must_use]
    pub fn defaults(&self) -> &DefaultSet {
        &self.defaults
    }

    #[must_use]
    pub fn coercions(&self) -> &CoercionTable {
        &self.coercions
    }

    #[must_use]
    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_schema.is_empty()
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("direction", &self.direction)
            .field("fingerprint", &self.fingerprint)
            .field("fields", &self.line_schema.fields.len())
            .field("validator", &self.validator.is_some())
            .field("coercions", &self.coercions.len())
            .finish_non_exhaustive()
    }
}

/// Compile line-schema text for one direction. Blank text is an error.
pub fn compile(text: &str, direction: Direction) -> Result<CompiledSchema, SchemaCompileError> {
    if text.trim().is_empty() {
        return Err(SchemaCompileError::Empty);
    }
    let line_schema = LineSchema::parse(text)?;
    if let Some(declared) = line_schema.meta.direction {
        if declared != direction {
            warn!(
                declared = %declared,
                compiled_as = %direction,
                "Line schema meta direction differs from its use"
            );
        }
    }

    let json_schema = line_schema.json_schema(direction)?;
    // 2020-12 treats `format` as an annotation unless asked to assert it
    let validator = jsonschema::options()
        .should_validate_formats(true)
        .build(&json_schema)
        .map_err(|e| SchemaCompileError::InvalidJsonSchema(e.to_string()))?;
    let defaults = DefaultSet::from_schema(&line_schema)?;
    let coercions = CoercionTable::from_schema(&line_schema);
    let projection = match direction {
        Direction::Out => Projection::from_schema(&line_schema),
        Direction::In => None,
    };

    let compiled = CompiledSchema {
        direction,
        fingerprint: fingerprint(text),
        line_schema,
        json_schema,
        validator: Some(validator),
        defaults,
        coercions,
        projection,
    };
    debug!(
        direction = %direction,
        fingerprint = %compiled.fingerprint,
        fields = compiled.line_schema.fields.len(),
        coercions = compiled.coercions.len(),
        "Line schema compiled"
    );
    Ok(compiled)
}

/// Like [`compile`], but blank text yields [`CompiledSchema::empty`].
pub fn compile_optional(
    text: &str,
    direction: Direction,
) -> Result<CompiledSchema, SchemaCompileError> {
    if text.trim().is_empty() {
        return Ok(CompiledSchema::empty(direction));
    }
    compile(text, direction)
}
