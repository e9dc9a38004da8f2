//! Typed view of the operations declared in a normalized OpenAPI v3 document.

use std::collections::BTreeMap;

use axum::http::Method;
use serde_json::{Map, Value};

use crate::routing::matcher::PathTemplate;

/// Methods an OpenAPI path item may declare.
pub const PATH_ITEM_METHODS: [&str; 8] =
    ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    /// Key of this location in the composite request instance.
    pub fn instance_key(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "headers",
            Self::Cookie => "cookies",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Value,
}

/// Schema and example for one media type.
#[derive(Debug, Clone, Default)]
pub struct MediaType {
    pub schema: Option<Value>,
    pub example: Option<Value>,
}

impl MediaType {
    fn from_value(v: &Value) -> Self {
        let example = v.get("example").cloned().or_else(|| {
            v.get("examples")
                .and_then(Value::as_object)
                .and_then(|m| m.values().next())
                .map(|ex| ex.get("value").cloned().unwrap_or_else(|| ex.clone()))
        });
        Self {
            schema: v.get("schema").cloned(),
            example,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone)]
pub struct HeaderSpec {
    pub required: bool,
    pub schema: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseSpec {
    pub content: BTreeMap<String, MediaType>,
    /// Declared headers keyed by lower-cased name.
    pub headers: BTreeMap<String, HeaderSpec>,
}

/// One documented (method, path) endpoint.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub method: Method,
    pub path: String,
    pub template: PathTemplate,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status key: `"200"`, `"2XX"` or `"default"`.
    pub responses: BTreeMap<String, ResponseSpec>,
}

impl Operation {
    /// Build an operation from its path item and operation object.
    pub fn from_document(path: &str, method: &str, path_item: &Value, op: &Value) -> Option<Self> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok()?;

        // Operation-level parameters override path-level ones by (name, in).
        let mut parameters: Vec<Parameter> = Vec::new();
        for source in [path_item.get("parameters"), op.get("parameters")].into_iter().flatten() {
            for p in source.as_array().into_iter().flatten().filter_map(parse_parameter) {
                parameters.retain(|q| !(q.name == p.name && q.location == p.location));
                parameters.push(p);
            }
        }

        let request_body = op.get("requestBody").map(|rb| RequestBody {
            required: rb.get("required").and_then(Value::as_bool).unwrap_or(false),
            content: parse_content(rb.get("content")),
        });

        let responses = op
            .get("responses")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(status, r)| (status.to_ascii_uppercase(), parse_response(r)))
                    .map(|(k, v)| (if k == "DEFAULT" { "default".to_string() } else { k }, v))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            operation_id: op.get("operationId").and_then(Value::as_str).map(str::to_string),
            method,
            path: path.to_string(),
            template: PathTemplate::parse(path),
            parameters,
            request_body,
            responses,
        })
    }

    /// Response declared for a status: exact code, then `NXX` range, then `default`.
    pub fn response_for(&self, status: u16) -> Option<&ResponseSpec> {
        let exact = status.to_string();
        let range = format!("{}XX", status / 100);
        self.responses
            .get(&exact)
            .or_else(|| self.responses.get(&range))
            .or_else(|| self.responses.get("default"))
    }
}

/// Pick the media type to validate against: a JSON type when present, else the first.
pub fn preferred_media_type(content: &BTreeMap<String, MediaType>) -> Option<(&String, &MediaType)> {
    content
        .iter()
        .find(|(ct, _)| is_json_media_type(ct))
        .or_else(|| content.iter().next())
}

pub fn is_json_media_type(ct: &str) -> bool {
    let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == "application/json" || essence == "json" || essence.ends_with("+json") || essence == "*/*"
}

fn parse_parameter(v: &Value) -> Option<Parameter> {
    let location = ParameterLocation::parse(v.get("in")?.as_str()?)?;
    let name = v.get("name")?.as_str()?.to_string();
    Some(Parameter {
        // Header names are case-insensitive on the wire.
        name: if location == ParameterLocation::Header { name.to_ascii_lowercase() } else { name },
        location,
        required: location == ParameterLocation::Path
            || v.get("required").and_then(Value::as_bool).unwrap_or(false),
        schema: v.get("schema").cloned().unwrap_or_else(|| Value::Object(Map::new())),
    })
}

fn parse_content(v: Option<&Value>) -> BTreeMap<String, MediaType> {
    v.and_then(Value::as_object)
        .map(|m| m.iter().map(|(ct, mt)| (ct.clone(), MediaType::from_value(mt))).collect())
        .unwrap_or_default()
}

fn parse_response(v: &Value) -> ResponseSpec {
    let headers = v
        .get("headers")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .map(|(name, h)| {
                    let spec = HeaderSpec {
                        required: h.get("required").and_then(Value::as_bool).unwrap_or(false),
                        schema: h.get("schema").cloned().unwrap_or_else(|| Value::Object(Map::new())),
                    };
                    (name.to_ascii_lowercase(), spec)
                })
                .collect()
        })
        .unwrap_or_default();

    ResponseSpec {
        content: parse_content(v.get("content")),
        headers,
    }
}
