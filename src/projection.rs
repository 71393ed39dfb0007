//! Output projection: keep only what the output schema declares.

use crate::lineschema::{LineSchema, Segment};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
struct Node {
    fields: BTreeMap<String, Node>,
    items: Option<Box<Node>>,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.fields.is_empty() && self.items.is_none()
    }

    fn apply(&self, value: &mut Value) {
        match value {
            Value::Object(map) if !self.fields.is_empty() => {
                map.retain(|key, _| self.fields.contains_key(key));
                for (key, child) in map.iter_mut() {
                    if let Some(node) = self.fields.get(key) {
                        node.apply(child);
                    }
                }
            }
            Value::Array(items) => {
                if let Some(node) = &self.items {
                    for item in items {
                        node.apply(item);
                    }
                }
            }
            // declared leaves are kept whole
            _ => {}
        }
    }
}

/// Field tree derived from an output line schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    root: Node,
}

impl Projection {
    /// `None` for an empty schema, which disables projection.
    #[must_use]
    pub fn from_schema(schema: &LineSchema) -> Option<Self> {
        if schema.is_empty() {
            return None;
        }
        let mut root = Node::default();
        for field in &schema.fields {
            let mut node = &mut root;
            for segment in field.path.segments() {
                node = match segment {
                    Segment::Key(key) => node.fields.entry(key.clone()).or_default(),
                    Segment::Each => &mut **node.items.get_or_insert_with(Box::default),
                };
            }
        }
        Some(Self { root })
    }

    /// Drop undeclared object keys in place.
    pub fn apply(&self, document: &mut Value) {
        if !self.root.is_leaf() {
            self.root.apply(document);
        }
    }
}
