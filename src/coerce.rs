//! String-to-typed coercion of JSON documents.
//!
//! Query strings, form bodies and headers deliver every value as a string. After input
//! validation (which accepts both spellings) the coercion stage rewrites each field the
//! line schema declares as `int`, `float`, `bool` or `array` into its typed form.
//!
//! Coercion never invents fields: paths missing from the document are skipped. A value
//! that is present but cannot be parsed is a [`CoercionError`], never a silent zero.
//! Running coercion on an already-coerced document changes nothing.

use crate::error::ApiError;
use crate::lineschema::{FieldKind, FieldPath, LineSchema, Scalar, Segment};
use serde::Serialize;
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// A present value that could not be rewritten as its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {pointer}: cannot convert `{value}` to {expected}")]
pub struct CoercionError {
    /// JSON pointer of the offending value (`/items/0/id`)
    pub pointer: String,
    /// The raw value as it appeared in the document
    pub value: String,
    /// Declared type name
    pub expected: &'static str,
}

/// One entry of a [`CoercionTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionRule {
    pub path: FieldPath,
    pub kind: FieldKind,
}

/// Field paths that need retyping, ordered parents first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CoercionTable {
    rules: Vec<CoercionRule>,
}

impl CoercionTable {
    /// Collect every non-string field of a line schema, plus an array rule for each
    /// undeclared parent that a `[]` segment implies.
    #[must_use]
    pub fn from_schema(schema: &LineSchema) -> Self {
        let declared: HashSet<&FieldPath> = schema.fields.iter().map(|f| &f.path).collect();
        let mut implied: Vec<CoercionRule> = Vec::new();
        for field in &schema.fields {
            let segments = field.path.segments();
            for (idx, segment) in segments.iter().enumerate() {
                if *segment != Segment::Each {
                    continue;
                }
                let parent = FieldPath::from_segments(segments[..idx].iter().cloned());
                if declared.contains(&parent) || implied.iter().any(|r| r.path == parent) {
                    continue;
                }
                // `tags[]` types its elements; `items[].id` leaves them to deeper rules
                let item = match field.kind {
                    FieldKind::Scalar(scalar) if idx + 1 == segments.len() => Some(scalar),
                    _ => None,
                };
                implied.push(CoercionRule {
                    path: parent,
                    kind: FieldKind::Array(item),
                });
            }
        }
        Self::from_rules(
            schema
                .fields
                .iter()
                .filter(|f| f.kind.is_coercible())
                .map(|f| CoercionRule {
                    path: f.path.clone(),
                    kind: f.kind,
                })
                .chain(implied),
        )
    }

    pub fn from_rules(rules: impl IntoIterator<Item = CoercionRule>) -> Self {
        let mut rules: Vec<_> = rules.into_iter().collect();
        // an array must be lifted before its elements are visited
        rules.sort_by_key(|r| r.path.depth());
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[CoercionRule] {
        &self.rules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Apply every rule to a parsed document in place.
    pub fn apply(&self, document: &mut Value) -> Result<(), CoercionError> {
        let mut pointer = String::new();
        for rule in &self.rules {
            pointer.clear();
            walk(document, rule.path.segments(), rule.kind, &mut pointer)?;
        }
        Ok(())
    }
}

/// Coerce a serialized JSON document. An empty table returns the input untouched.
pub fn coerce(document: &[u8], table: &CoercionTable) -> Result<Vec<u8>, ApiError> {
    if table.is_empty() {
        return Ok(document.to_vec());
    }
    let mut value: Value = serde_json::from_slice(document)?;
    table.apply(&mut value)?;
    Ok(serde_json::to_vec(&value)?)
}

fn push_key(pointer: &mut String, key: &str) {
    pointer.push('/');
    for c in key.chars() {
        match c {
            '~' => pointer.push_str("~0"),
            '/' => pointer.push_str("~1"),
            c => pointer.push(c),
        }
    }
}

fn walk(
    value: &mut Value,
    segments: &[Segment],
    kind: FieldKind,
    pointer: &mut String,
) -> Result<(), CoercionError> {
    let Some((head, rest)) = segments.split_first() else {
        return coerce_at(value, kind, pointer);
    };
    let mark = pointer.len();
    match (head, value) {
        (Segment::Key(key), Value::Object(map)) => {
            if let Some(child) = map.get_mut(key) {
                push_key(pointer, key);
                walk(child, rest, kind, pointer)?;
            }
        }
        (Segment::Each, Value::Array(items)) => {
            for (idx, item) in items.iter_mut().enumerate() {
                pointer.truncate(mark);
                pointer.push('/');
                pointer.push_str(&idx.to_string());
                walk(item, rest, kind, pointer)?;
            }
        }
        // shape mismatches belong to validation
        _ => {}
    }
    pointer.truncate(mark);
    Ok(())
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rewrite a single value as `kind`. `null` is left alone.
pub fn coerce_value(value: &mut Value, kind: FieldKind) -> Result<(), CoercionError> {
    coerce_at(value, kind, "")
}

fn coerce_at(value: &mut Value, kind: FieldKind, pointer: &str) -> Result<(), CoercionError> {
    if value.is_null() {
        return Ok(());
    }
    let fail = |value: &Value| CoercionError {
        pointer: if pointer.is_empty() { "/".to_string() } else { pointer.to_string() },
        value: raw_text(value),
        expected: kind.name(),
    };
    match kind {
        FieldKind::Scalar(scalar) => {
            let typed = coerce_scalar(value, scalar).ok_or_else(|| fail(value))?;
            if let Some(typed) = typed {
                *value = typed;
            }
        }
        FieldKind::Array(item) => {
            let lifted = match &*value {
                Value::Array(_) => None,
                Value::Object(_) => return Err(fail(value)),
                Value::String(s) if s.trim_start().starts_with('[') => {
                    match serde_json::from_str::<Value>(s) {
                        Ok(parsed @ Value::Array(_)) => Some(parsed),
                        _ => return Err(fail(value)),
                    }
                }
                _ => Some(Value::Array(vec![value.take()])),
            };
            if let Some(lifted) = lifted {
                *value = lifted;
            }
            if let (Some(item), Value::Array(items)) = (item, value) {
                for (idx, element) in items.iter_mut().enumerate() {
                    let child = format!("{pointer}/{idx}");
                    coerce_at(element, FieldKind::Scalar(item), &child)?;
                }
            }
        }
        FieldKind::Object => {
            if !value.is_object() {
                return Err(fail(value));
            }
        }
    }
    Ok(())
}

/// `Some(None)` means the value already has the right type, `None` means it cannot be converted.
fn coerce_scalar(value: &Value, scalar: Scalar) -> Option<Option<Value>> {
    match (scalar, value) {
        (Scalar::Int, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                return Some(None);
            }
            let f = n.as_f64()?;
            // i64::MAX is not exactly representable; the half-open range keeps the cast exact
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                #[allow(clippy::cast_possible_truncation)]
                return Some(Some(Value::from(f as i64)));
            }
            None
        }
        (Scalar::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| Some(Value::from(i))),
        (Scalar::Float, Value::Number(_)) => Some(None),
        (Scalar::Float, Value::String(s)) => {
            let f = s.trim().parse::<f64>().ok()?;
            Number::from_f64(f).map(|n| Some(Value::Number(n)))
        }
        (Scalar::Bool, Value::Bool(_)) => Some(None),
        (Scalar::Bool, Value::String(s)) => match s.as_str() {
            "true" => Some(Some(Value::Bool(true))),
            "false" => Some(Some(Value::Bool(false))),
            _ => None,
        },
        (Scalar::String, Value::String(_)) => Some(None),
        (Scalar::String, Value::Number(n)) => Some(Some(Value::String(n.to_string()))),
        (Scalar::String, Value::Bool(b)) => Some(Some(Value::String(b.to_string()))),
        _ => None,
    }
}

impl fmt::Display for CoercionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.path, self.kind)
    }
}
