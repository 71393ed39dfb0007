//! # Line Schema Module
//!
//! A line schema describes one direction of an API (request `in` or response `out`)
//! with one field per line:
//!
//! ```text
//! version=http://json-schema.org/draft-07/schema#,id=in,direction=in
//! fullname=title,required,description=ad title
//! fullname=index,format=int,required,default=0,description=page index,0 based
//! fullname=items[].id,format=int
//! ```
//!
//! The first line without a `fullname` attribute carries schema metadata. Every other
//! line is a comma-separated list of `key=value` attributes and bare flags. A token that
//! is neither starts no new attribute and is re-joined onto the previous value, so
//! descriptions and JSON literals may contain commas.
//!
//! From a parsed [`LineSchema`] this module derives:
//!
//! - the JSON Schema document used for validation ([`LineSchema::json_schema`])
//! - the typed default value of every field that declares one ([`FieldKind::parse_value`])
//! - the [`FieldPath`] of every field, used by coercion, defaulting and projection

mod parse;
mod tree;

use crate::error::SchemaCompileError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Which side of an API a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Request data: arrives as strings, validated leniently then coerced
    #[default]
    In,
    /// Response data: coerced first, then validated strictly
    Out,
}

impl Direction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Parse `in`/`out` (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "input" => Some(Direction::In),
            "out" | "output" => Some(Direction::Out),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive wire types a field (or an array element) can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    String,
    Int,
    Float,
    Bool,
}

impl Scalar {
    /// JSON Schema `type` keyword for this scalar.
    #[must_use]
    pub fn json_type(&self) -> &'static str {
        match self {
            Scalar::String => "string",
            Scalar::Int => "integer",
            Scalar::Float => "number",
            Scalar::Bool => "boolean",
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Scalar::String => "string",
            Scalar::Int => "int",
            Scalar::Float => "float",
            Scalar::Bool => "bool",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Scalar::String),
            "int" | "integer" => Some(Scalar::Int),
            "float" | "number" => Some(Scalar::Float),
            "bool" | "boolean" => Some(Scalar::Bool),
            _ => None,
        }
    }
}

/// Declared type of a field after `type` and `format` have been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar(Scalar),
    /// Array; `Some` when the element type is a declared primitive
    Array(Option<Scalar>),
    Object,
}

impl FieldKind {
    /// Fields whose values must be rewritten from their string transport form.
    #[must_use]
    pub fn is_coercible(&self) -> bool {
        !matches!(self, FieldKind::Scalar(Scalar::String) | FieldKind::Object)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Scalar(s) => s.name(),
            FieldKind::Array(_) => "array",
            FieldKind::Object => "object",
        }
    }

    /// Interpret raw attribute text (a `default`, an `example`) as a value of this kind.
    pub fn parse_value(&self, raw: &str) -> Result<Value, &'static str> {
        match self {
            FieldKind::Object => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Object(_)) => Ok(v),
                _ => Err("object"),
            },
            kind => {
                let mut value = Value::String(raw.to_string());
                crate::coerce::coerce_value(&mut value, *kind).map_err(|_| kind.name())?;
                Ok(value)
            }
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Array(Some(item)) => write!(f, "array<{}>", item.name()),
            kind => f.write_str(kind.name()),
        }
    }
}

impl Serialize for FieldKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Object member
    Key(String),
    /// Every element of an array (`[]` in a fullname)
    Each,
}

/// Parsed form of a dotted/bracket fullname such as `items[].id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(SmallVec<[Segment; 4]>);

impl FieldPath {
    /// Parse a fullname; `None` if any segment is malformed.
    #[must_use]
    pub fn parse(fullname: &str) -> Option<Self> {
        parse::parse_fullname(fullname)
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// True when the path crosses an array (`[]`) anywhere.
    #[must_use]
    pub fn has_each(&self) -> bool {
        self.0.iter().any(|s| matches!(s, Segment::Each))
    }

    pub(crate) fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        FieldPath(segments.into_iter().collect())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            match segment {
                Segment::Key(key) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                Segment::Each => f.write_str("[]")?,
            }
            first = false;
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One field line of a line schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub fullname: String,
    pub path: FieldPath,
    pub kind: FieldKind,
    pub required: bool,
    /// Raw `default` text; typed at compile time via [`FieldKind::parse_value`]
    pub default: Option<String>,
    pub example: Option<String>,
    pub description: Option<String>,
    pub title: Option<String>,
    pub comment: Option<String>,
    /// JSON Schema `format` keyword for string formats (`date-time`, `email`, ...)
    pub format: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    /// Source path when data is mapped from another document
    pub src: Option<String>,
    /// Destination path when data is mapped into another document
    pub dst: Option<String>,
    /// Attributes this parser does not interpret
    pub extra: BTreeMap<String, String>,
    /// 1-based line in the schema text
    pub line: usize,
}

impl FieldDescriptor {
    /// The `default` attribute typed as the field's declared kind.
    pub fn typed_default(&self) -> Result<Option<Value>, SchemaCompileError> {
        let Some(raw) = self.default.as_deref() else {
            return Ok(None);
        };
        self.kind
            .parse_value(raw)
            .map(Some)
            .map_err(|expected| SchemaCompileError::InvalidDefault {
                field: self.fullname.clone(),
                value: raw.to_string(),
                expected,
            })
    }
}

/// Schema-level attributes from the meta line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMeta {
    /// JSON Schema dialect URI, emitted as `$schema`
    pub version: Option<String>,
    pub id: Option<String>,
    pub direction: Option<Direction>,
}

/// Parsed line schema: metadata plus ordered field descriptors. Immutable once parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSchema {
    pub meta: SchemaMeta,
    pub fields: Vec<FieldDescriptor>,
}

impl LineSchema {
    /// Parse line-schema text. Blank text yields an empty schema.
    pub fn parse(text: &str) -> Result<Self, SchemaCompileError> {
        parse::parse_document(text)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Direction from the meta line, falling back to `fallback`.
    #[must_use]
    pub fn direction_or(&self, fallback: Direction) -> Direction {
        self.meta.direction.unwrap_or(fallback)
    }

    /// Derive the JSON Schema document for the given direction.
    pub fn json_schema(&self, direction: Direction) -> Result<Value, SchemaCompileError> {
        tree::derive_json_schema(self, direction)
    }

    /// Look up a field by its fullname.
    #[must_use]
    pub fn field(&self, fullname: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.fullname == fullname)
    }
}
