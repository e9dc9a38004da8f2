//! Deterministic mock values derived from response declarations.

use axum::http::StatusCode;
use serde_json::{json, Map, Value};

use crate::routing::operation::{preferred_media_type, MediaType, Operation, ResponseSpec};

/// What the mock server answers for an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: StatusCode,
    /// `None` when the response declares no content.
    pub body: Option<Value>,
}

/// Mock the first declared success response.
///
/// The lowest explicit `2xx` code wins, then `2XX` as 200, then `default` as 200.
pub fn mock_response(operation: &Operation) -> MockResponse {
    let (status, spec) = success_response(operation);
    let body = spec
        .and_then(|r| preferred_media_type(&r.content))
        .map(|(_, media)| example_value(media));
    MockResponse { status, body }
}

fn success_response(operation: &Operation) -> (StatusCode, Option<&ResponseSpec>) {
    let explicit = operation
        .responses
        .iter()
        .filter_map(|(key, spec)| key.parse::<u16>().ok().map(|code| (code, spec)))
        .filter(|(code, _)| (200..300).contains(code))
        .min_by_key(|(code, _)| *code)
        .and_then(|(code, spec)| StatusCode::from_u16(code).ok().map(|s| (s, spec)));
    if let Some((status, spec)) = explicit {
        return (status, Some(spec));
    }

    let fallback = operation
        .responses
        .get("2XX")
        .or_else(|| operation.responses.get("default"));
    (StatusCode::OK, fallback)
}

/// Media-type example, then schema `example`/`default`, then a synthesized value.
pub fn example_value(media: &MediaType) -> Value {
    if let Some(example) = &media.example {
        return example.clone();
    }
    match &media.schema {
        Some(schema) => synthesize(schema),
        None => Value::Null,
    }
}

/// Build a value conforming to `schema`.
pub fn synthesize(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return Value::Null;
    };

    if let Some(v) = obj.get("example").or_else(|| obj.get("default")) {
        return v.clone();
    }
    if let Some(first) = obj.get("enum").and_then(Value::as_array).and_then(|e| e.first()) {
        return first.clone();
    }
    for key in ["oneOf", "anyOf"] {
        if let Some(first) = obj.get(key).and_then(Value::as_array).and_then(|m| m.first()) {
            return synthesize(first);
        }
    }
    if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
        let mut merged = Map::new();
        for member in members {
            match synthesize(member) {
                Value::Object(fields) => merged.extend(fields),
                other if members.len() == 1 => return other,
                _ => {}
            }
        }
        return Value::Object(merged);
    }

    let ty = obj.get("type").and_then(Value::as_str);
    match ty {
        Some("object") => object(obj),
        None if obj.contains_key("properties") => object(obj),
        Some("array") => {
            let item = obj.get("items").map(synthesize).unwrap_or(Value::Null);
            Value::Array(vec![item])
        }
        Some("string") => string(obj.get("format").and_then(Value::as_str)),
        Some("integer") => obj.get("minimum").and_then(Value::as_i64).map(Value::from).unwrap_or(json!(0)),
        Some("number") => obj.get("minimum").cloned().unwrap_or(json!(0)),
        Some("boolean") => Value::Bool(true),
        _ => Value::Null,
    }
}

fn object(obj: &Map<String, Value>) -> Value {
    let properties = obj.get("properties").and_then(Value::as_object);
    Value::Object(
        properties
            .into_iter()
            .flatten()
            .map(|(name, schema)| (name.clone(), synthesize(schema)))
            .collect(),
    )
}

fn string(format: Option<&str>) -> Value {
    let s = match format {
        Some("date-time") => "1970-01-01T00:00:00Z",
        Some("date") => "1970-01-01",
        Some("email") => "user@example.com",
        Some("uuid") => "00000000-0000-4000-8000-000000000000",
        Some("uri") | Some("url") => "http://example.com",
        Some("hostname") => "example.com",
        Some("ipv4") => "127.0.0.1",
        _ => "string",
    };
    Value::String(s.to_string())
}
