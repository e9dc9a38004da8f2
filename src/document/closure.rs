//! Strict closure: forbid undeclared properties by default.
//!
//! Every schema that declares `properties` without an explicit
//! `additionalProperties` policy gets `additionalProperties: false`. Explicit
//! policies are never overwritten, which makes the transform idempotent.
//!
//! Only schema positions are closed. Property maps, examples, defaults and
//! enum values are data, even when they carry a `properties` key.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Typed view of a JSON document for the closure walk.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object(BTreeMap<String, SchemaNode>),
    Array(Vec<SchemaNode>),
    /// Strings, numbers, booleans and null.
    Scalar(Value),
}

impl From<Value> for SchemaNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => SchemaNode::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            Value::Array(items) => SchemaNode::Array(items.into_iter().map(Into::into).collect()),
            scalar => SchemaNode::Scalar(scalar),
        }
    }
}

impl From<SchemaNode> for Value {
    fn from(node: SchemaNode) -> Self {
        match node {
            SchemaNode::Object(members) => {
                Value::Object(members.into_iter().map(|(k, v)| (k, v.into())).collect::<Map<_, _>>())
            }
            SchemaNode::Array(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            SchemaNode::Scalar(v) => v,
        }
    }
}

/// What a node is, judged from the keys leading to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Document structure around schemas (paths, operations, media types).
    Document,
    Schema,
    /// Name to schema map (`properties`, `components/schemas`, ...).
    SchemaMap,
    /// Literal data: examples, defaults, enums and unknown keywords.
    Opaque,
}

impl Position {
    fn child(self, key: &str) -> Position {
        match self {
            Position::Document => match key {
                "schema" => Position::Schema,
                "schemas" | "definitions" => Position::SchemaMap,
                "example" | "examples" | "default" => Position::Opaque,
                _ => Position::Document,
            },
            Position::SchemaMap => Position::Schema,
            Position::Schema => match key {
                "properties" | "patternProperties" | "definitions" | "$defs" => Position::SchemaMap,
                "items" | "prefixItems" | "additionalItems" | "additionalProperties" | "not" | "if" | "then"
                | "else" | "contains" | "propertyNames" | "allOf" | "anyOf" | "oneOf" => Position::Schema,
                _ => Position::Opaque,
            },
            Position::Opaque => Position::Opaque,
        }
    }
}

impl SchemaNode {
    /// Close a whole document.
    pub fn close(self) -> Self {
        self.close_at(Position::Document)
    }

    /// Depth-first: object members, then array items, then the node itself.
    fn close_at(self, position: Position) -> Self {
        if position == Position::Opaque {
            return self;
        }
        match self {
            SchemaNode::Object(members) => {
                let mut members: BTreeMap<String, SchemaNode> = members
                    .into_iter()
                    .map(|(k, v)| {
                        let child = position.child(&k);
                        (k, v.close_at(child))
                    })
                    .collect();
                if position == Position::Schema
                    && members.contains_key("properties")
                    && !members.contains_key("additionalProperties")
                {
                    members.insert("additionalProperties".to_string(), SchemaNode::Scalar(Value::Bool(false)));
                }
                SchemaNode::Object(members)
            }
            // `allOf` members and `items` tuples keep the position of their keyword.
            SchemaNode::Array(items) => SchemaNode::Array(items.into_iter().map(|i| i.close_at(position)).collect()),
            scalar => scalar,
        }
    }
}

pub fn apply_strict_closure(doc: Value) -> Value {
    SchemaNode::from(doc).close().into()
}
