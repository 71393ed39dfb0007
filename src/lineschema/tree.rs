use super::{Direction, FieldDescriptor, FieldKind, LineSchema, Scalar, Segment};
use crate::error::SchemaCompileError;
use serde_json::{json, Map, Value};

/// Intermediate shape built from field paths before emitting JSON Schema.
#[derive(Default)]
struct Node<'a> {
    field: Option<&'a FieldDescriptor>,
    properties: Vec<(String, Node<'a>)>,
    items: Option<Box<Node<'a>>>,
}

impl<'a> Node<'a> {
    fn child(&mut self, key: &str) -> &mut Node<'a> {
        let idx = match self.properties.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.properties.push((key.to_string(), Node::default()));
                self.properties.len() - 1
            }
        };
        &mut self.properties[idx].1
    }

    fn insert(&mut self, field: &'a FieldDescriptor) {
        let mut node = self;
        for segment in field.path.segments() {
            node = match segment {
                Segment::Key(key) => node.child(key),
                Segment::Each => &mut **node.items.get_or_insert_with(Box::default),
            };
        }
        node.field = Some(field);
    }
}

fn conflict(field: &FieldDescriptor, message: &str) -> SchemaCompileError {
    SchemaCompileError::Parse {
        line: field.line,
        message: format!("field `{}` {message}", field.fullname),
    }
}

fn scalar_type(scalar: Scalar, direction: Direction) -> Value {
    match (scalar, direction) {
        (Scalar::String, _) | (_, Direction::Out) => json!(scalar.json_type()),
        (_, Direction::In) => json!([scalar.json_type(), "string"]),
    }
}

fn annotate(
    schema: &mut Map<String, Value>,
    field: &FieldDescriptor,
    direction: Direction,
) -> Result<(), SchemaCompileError> {
    if let Some(title) = &field.title {
        schema.insert("title".into(), json!(title));
    }
    if let Some(description) = &field.description {
        schema.insert("description".into(), json!(description));
    }
    if let Some(comment) = &field.comment {
        schema.insert("$comment".into(), json!(comment));
    }
    if let Some(format) = &field.format {
        schema.insert("format".into(), json!(format));
    }
    if let Some(default) = field.typed_default()? {
        schema.insert("default".into(), default);
    }
    if let Some(example) = &field.example {
        let value = field
            .kind
            .parse_value(example)
            .unwrap_or_else(|_| json!(example));
        schema.insert("examples".into(), json!([value]));
    }
    if let Some(members) = &field.enum_values {
        let mut allowed = members.clone();
        if direction == Direction::In {
            // transport form of non-string members arrives as text
            for member in members {
                if !member.is_string() {
                    let text = json!(member.to_string());
                    if !allowed.contains(&text) {
                        allowed.push(text);
                    }
                }
            }
        }
        schema.insert("enum".into(), Value::Array(allowed));
    }
    Ok(())
}

fn emit(node: &Node<'_>, direction: Direction) -> Result<Value, SchemaCompileError> {
    let kind = match node.field {
        Some(field) => {
            match field.kind {
                FieldKind::Scalar(_) if !node.properties.is_empty() || node.items.is_some() => {
                    return Err(conflict(field, "is a scalar but declares nested fields"));
                }
                FieldKind::Object if node.items.is_some() => {
                    return Err(conflict(field, "is an object but declares `[]` elements"));
                }
                FieldKind::Array(_) if !node.properties.is_empty() => {
                    return Err(conflict(field, "is an array; nest its fields under `[]`"));
                }
                FieldKind::Array(Some(_)) if node.items.as_ref().is_some_and(|i| !i.properties.is_empty()) => {
                    return Err(conflict(field, "declares a primitive element type but object elements"));
                }
                _ => {}
            }
            field.kind
        }
        None if node.items.is_some() => FieldKind::Array(None),
        None => FieldKind::Object,
    };

    let mut schema = Map::new();
    match kind {
        FieldKind::Scalar(scalar) => {
            schema.insert("type".into(), scalar_type(scalar, direction));
        }
        FieldKind::Array(item) => {
            let array_type = match direction {
                Direction::In => json!(["array", "string"]),
                Direction::Out => json!("array"),
            };
            schema.insert("type".into(), array_type);
            let items = match (&node.items, item) {
                (Some(items), _) => Some(emit(items, direction)?),
                (None, Some(scalar)) => Some(json!({ "type": scalar_type(scalar, direction) })),
                (None, None) => None,
            };
            if let Some(items) = items {
                schema.insert("items".into(), items);
            }
        }
        FieldKind::Object => {
            schema.insert("type".into(), json!("object"));
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (key, child) in &node.properties {
                properties.insert(key.clone(), emit(child, direction)?);
                if child.field.is_some_and(|f| f.required) {
                    required.push(json!(key));
                }
            }
            if !properties.is_empty() {
                schema.insert("properties".into(), Value::Object(properties));
            }
            if !required.is_empty() {
                schema.insert("required".into(), Value::Array(required));
            }
        }
    }
    if let Some(field) = node.field {
        annotate(&mut schema, field, direction)?;
    }
    Ok(Value::Object(schema))
}

pub(super) fn derive_json_schema(
    schema: &LineSchema,
    direction: Direction,
) -> Result<Value, SchemaCompileError> {
    let mut root = Node::default();
    for field in &schema.fields {
        root.insert(field);
    }
    let mut document = emit(&root, direction)?;
    if let (Some(version), Value::Object(map)) = (&schema.meta.version, &mut document) {
        map.insert("$schema".into(), json!(version));
    }
    Ok(document)
}
