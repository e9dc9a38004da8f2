//! Request handling and transformation.
//!
//! # Responsibilities
//! - Build the simplified [`OasRequest`] fed to validation
//! - Parse the body by Content-Type (JSON or URL-encoded)
//!
//! # Design Decisions
//! - The raw body bytes are never touched; the parsed copy feeds validation only
//! - Header names are lower-cased, matching HTTP's case-insensitivity
//! - A body that cannot be decoded is reported, not fatal

use std::collections::BTreeMap;

use axum::http::{header, request::Parts, HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::routing::operation::is_json_media_type;

/// A query or header value: single, or repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    fn push(self, value: String) -> Self {
        match self {
            ParamValue::Single(first) => ParamValue::Multi(vec![first, value]),
            ParamValue::Multi(mut all) => {
                all.push(value);
                ParamValue::Multi(all)
            }
        }
    }

    pub fn first(&self) -> &str {
        match self {
            ParamValue::Single(v) => v,
            ParamValue::Multi(all) => all.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Single(v) => Value::String(v.clone()),
            ParamValue::Multi(all) => Value::Array(all.iter().cloned().map(Value::String).collect()),
        }
    }
}

pub type ParamMap = BTreeMap<String, ParamValue>;

/// Simplified request shape consumed by the validator and echoed in the
/// `openapi-cop-source-request` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OasRequest {
    pub method: String,
    pub path: String,
    pub query: ParamMap,
    pub headers: ParamMap,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub body: Option<Value>,
}

// A JSON `null` body is still a body.
fn present<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

/// A request body present but undecodable for its declared Content-Type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestParsingError {
    #[error("received a request body without a Content-Type header")]
    MissingContentType,
    #[error("no parser available for content type '{0}'")]
    UnsupportedContentType(String),
    #[error("request body is not valid {content_type}: {reason}")]
    Malformed { content_type: String, reason: String },
}

impl OasRequest {
    /// Build from request parts and the buffered body.
    ///
    /// The request is always produced; a body that fails to decode comes back
    /// as the error half so the caller can record it.
    pub fn from_parts(parts: &Parts, body: &[u8]) -> (Self, Option<RequestParsingError>) {
        let (parsed, error) = if body.is_empty() {
            (None, None)
        } else {
            match parse_body(&parts.headers, body) {
                Ok(v) => (Some(v), None),
                Err(e) => (None, Some(e)),
            }
        };

        let request = Self {
            method: parts.method.as_str().to_string(),
            path: parts.uri.path().to_string(),
            query: parse_query(parts.uri.query().unwrap_or("")),
            headers: header_map(&parts.headers),
            body: parsed,
        };
        (request, error)
    }

    pub fn header(&self, name: &str) -> Option<&ParamValue> {
        self.headers.get(&name.to_ascii_lowercase())
    }
}

/// Parse a query string into a map, repeated keys becoming lists.
pub fn parse_query(query: &str) -> ParamMap {
    let mut map = ParamMap::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        insert(&mut map, k.into_owned(), v.into_owned());
    }
    map
}

/// Lower-cased header map; non-UTF-8 values are decoded lossily.
pub fn header_map(headers: &HeaderMap) -> ParamMap {
    let mut map = ParamMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        insert(&mut map, name.as_str().to_ascii_lowercase(), value);
    }
    map
}

fn insert(map: &mut ParamMap, key: String, value: String) {
    let next = match map.remove(&key) {
        Some(existing) => existing.push(value),
        None => ParamValue::Single(value),
    };
    map.insert(key, next);
}

/// Decode a body according to the Content-Type in `headers`.
pub fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, RequestParsingError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(RequestParsingError::MissingContentType)?;
    decode_as(content_type, body)
}

/// Decode `body` as the given media type (JSON or URL-encoded).
pub fn decode_as(content_type: &str, body: &[u8]) -> Result<Value, RequestParsingError> {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

    if is_json_media_type(&essence) && essence != "*/*" {
        return serde_json::from_slice(body).map_err(|e| RequestParsingError::Malformed {
            content_type: essence,
            reason: e.to_string(),
        });
    }
    if essence == "application/x-www-form-urlencoded" {
        let text = std::str::from_utf8(body).map_err(|e| RequestParsingError::Malformed {
            content_type: essence.clone(),
            reason: e.to_string(),
        })?;
        let form = parse_query(text)
            .into_iter()
            .map(|(k, v)| (k, v.to_json()))
            .collect::<Map<String, Value>>();
        return Ok(Value::Object(form));
    }
    Err(RequestParsingError::UnsupportedContentType(content_type.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    fn request_parts(uri: &str, content_type: Option<&str>) -> Parts {
        let mut builder = Request::builder().method("POST").uri(uri).header("X-Custom", "A");
        if let Some(ct) = content_type {
            builder = builder.header("Content-Type", ct);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_json_body_and_query() {
        let parts = request_parts("/echo?a=1&b=2&b=3", Some("application/json; charset=utf-8"));
        let (req, err) = OasRequest::from_parts(&parts, br#"{"input":"Marco!"}"#);

        assert!(err.is_none());
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/echo");
        assert_eq!(req.body, Some(json!({ "input": "Marco!" })));
        assert_eq!(req.query["a"], ParamValue::Single("1".into()));
        assert_eq!(req.query["b"], ParamValue::Multi(vec!["2".into(), "3".into()]));
        assert_eq!(req.header("x-custom"), Some(&ParamValue::Single("A".into())));
    }

    #[test]
    fn test_urlencoded_body() {
        let parts = request_parts("/form", Some("application/x-www-form-urlencoded"));
        let (req, err) = OasRequest::from_parts(&parts, b"name=Mario&tag=a&tag=b");
        assert!(err.is_none());
        assert_eq!(req.body, Some(json!({ "name": "Mario", "tag": ["a", "b"] })));
    }

    #[test]
    fn test_undecodable_body_is_reported() {
        let parts = request_parts("/echo", Some("application/json"));
        let (req, err) = OasRequest::from_parts(&parts, b"{not json");
        assert!(req.body.is_none());
        assert!(matches!(err, Some(RequestParsingError::Malformed { .. })));

        let no_ct = request_parts("/echo", None);
        let (_, err) = OasRequest::from_parts(&no_ct, b"hello");
        assert_eq!(err, Some(RequestParsingError::MissingContentType));

        let text = request_parts("/echo", Some("text/plain"));
        let (_, err) = OasRequest::from_parts(&text, b"hello");
        assert!(matches!(err, Some(RequestParsingError::UnsupportedContentType(_))));
    }

    #[test]
    fn test_empty_body_is_absent() {
        let parts = request_parts("/echo", None);
        let (req, err) = OasRequest::from_parts(&parts, b"");
        assert!(req.body.is_none());
        assert!(err.is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let parts = request_parts("/echo?x=1&x=2", Some("application/json"));
        let (req, _) = OasRequest::from_parts(&parts, br#"{"input":[1,2,{"deep":null}]}"#);
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: OasRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, req);
    }
}
