//! Default-value documents and the merge used by the merge-defaults and pack stages.

use crate::error::{ApiError, SchemaCompileError};
use crate::lineschema::{FieldPath, LineSchema, Segment};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
struct DefaultRule {
    path: FieldPath,
    value: Value,
}

/// Typed default leaves plus the minimal JSON skeleton holding them.
///
/// Merging only fills keys that are absent; anything the input carries, including an
/// explicit `null`, wins. Paths through `[]` apply to existing array elements and never
/// create elements.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultSet {
    rules: Vec<DefaultRule>,
    document: Value,
}

impl Default for DefaultSet {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            document: Value::Object(Map::new()),
        }
    }
}

impl DefaultSet {
    /// Collect the typed `default` of every field that declares one.
    pub fn from_schema(schema: &LineSchema) -> Result<Self, SchemaCompileError> {
        let mut set = Self::default();
        for field in &schema.fields {
            if let Some(value) = field.typed_default()? {
                set.push(field.path.clone(), value);
            }
        }
        Ok(set)
    }

    /// Every leaf of a JSON object becomes a default; nested objects are walked.
    #[must_use]
    pub fn from_document(document: &Value) -> Self {
        let mut set = Self::default();
        let mut prefix = Vec::new();
        if let Value::Object(map) = document {
            collect_leaves(map, &mut prefix, &mut set);
        }
        set
    }

    fn push(&mut self, path: FieldPath, value: Value) {
        build_skeleton(&mut self.document, path.segments(), &value);
        self.rules.push(DefaultRule { path, value });
    }

    /// The default skeleton, e.g. `{"index":0,"items":[{"kind":"text"}]}`.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Merge defaults into a parsed document in place.
    pub fn merge_value(&self, document: &mut Value) {
        for rule in &self.rules {
            fill(document, rule.path.segments(), &rule.value);
        }
    }

    /// Merge defaults into a serialized document. Blank input counts as `{}`.
    pub fn merge(&self, input: &[u8]) -> Result<Vec<u8>, ApiError> {
        if self.is_empty() {
            return Ok(input.to_vec());
        }
        let mut document = if input.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(input)?
        };
        if !document.is_object() {
            return Err(ApiError::InvalidDocument("expected a JSON object".into()));
        }
        self.merge_value(&mut document);
        Ok(serde_json::to_vec(&document)?)
    }
}

fn collect_leaves(map: &Map<String, Value>, prefix: &mut Vec<Segment>, set: &mut DefaultSet) {
    for (key, value) in map {
        prefix.push(Segment::Key(key.clone()));
        match value {
            Value::Object(child) if !child.is_empty() => collect_leaves(child, prefix, set),
            leaf => set.push(FieldPath::from_segments(prefix.iter().cloned()), leaf.clone()),
        }
        prefix.pop();
    }
}

fn build_skeleton(node: &mut Value, segments: &[Segment], value: &Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value.clone();
        return;
    };
    let child = match head {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else { return };
            map.entry(key.clone()).or_insert(Value::Null)
        }
        Segment::Each => {
            if !node.is_array() {
                *node = Value::Array(vec![Value::Null]);
            }
            let Value::Array(items) = node else { return };
            if items.is_empty() {
                items.push(Value::Null);
            }
            &mut items[0]
        }
    };
    build_skeleton(child, rest, value);
}

fn fill(node: &mut Value, segments: &[Segment], value: &Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match (head, node) {
        (Segment::Key(key), Value::Object(map)) => {
            if rest.is_empty() {
                map.entry(key.clone()).or_insert_with(|| value.clone());
                return;
            }
            if !map.contains_key(key) {
                // no array exists below, so no element can receive the default
                if rest.contains(&Segment::Each) {
                    return;
                }
                map.insert(key.clone(), Value::Object(Map::new()));
            }
            if let Some(child) = map.get_mut(key) {
                fill(child, rest, value);
            }
        }
        (Segment::Each, Value::Array(items)) => {
            for item in items {
                fill(item, rest, value);
            }
        }
        _ => {}
    }
}
