//! Conformance checks of exchanges against matched operations.
//!
//! Requests are checked as one composite instance
//! `{path, query, headers, cookies, requestBody}` against a composite schema
//! assembled from the operation, so a single delegate call reports every
//! violation with a data path rooted at its location.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::http::request::{OasRequest, ParamMap, ParamValue};
use crate::routing::operation::{preferred_media_type, Operation, ParameterLocation};
use crate::validation::result::{ValidationError, ValidationResult};
use crate::validation::schema::SchemaValidator;

#[derive(Debug, Clone)]
pub struct ConformanceValidator {
    schemas: Arc<dyn SchemaValidator>,
}

impl ConformanceValidator {
    pub fn new(schemas: Arc<dyn SchemaValidator>) -> Self {
        Self { schemas }
    }

    /// Validate a request against its matched operation.
    pub fn validate_request(&self, request: &OasRequest, operation: Option<&Operation>) -> ValidationResult {
        let operation = match operation {
            Some(op) if op.operation_id.is_some() => op,
            _ => {
                return ValidationResult::invalid(vec![ValidationError::new(
                    "operation",
                    format!("Unknown operation '{}'", request.path),
                )]);
            }
        };

        let (schema, instance) = request_composite(request, operation);
        self.schemas.validate(&schema, &instance)
    }

    /// Validate a parsed response body for the given status.
    pub fn validate_response(&self, body: &Value, operation: Option<&Operation>, status: u16) -> ValidationResult {
        let schema = operation
            .and_then(|op| op.response_for(status))
            .and_then(|r| preferred_media_type(&r.content))
            .and_then(|(_, media)| media.schema.as_ref());

        match schema {
            Some(schema) => self.schemas.validate(schema, body),
            None => ValidationResult::valid(),
        }
    }

    /// Validate the headers an operation declares for a status.
    ///
    /// Superset semantics: headers the operation does not declare are ignored.
    pub fn validate_response_headers(
        &self,
        headers: &ParamMap,
        operation: Option<&Operation>,
        status: u16,
    ) -> ValidationResult {
        let Some(response) = operation.and_then(|op| op.response_for(status)) else {
            return ValidationResult::valid();
        };
        if response.headers.is_empty() {
            return ValidationResult::valid();
        }

        let lowered: BTreeMap<String, &ParamValue> =
            headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();

        let mut properties = Map::new();
        let mut required = Vec::new();
        let mut instance = Map::new();
        for (name, spec) in &response.headers {
            properties.insert(name.clone(), spec.schema.clone());
            if spec.required {
                required.push(Value::String(name.clone()));
            }
            if let Some(value) = lowered.get(name) {
                instance.insert(name.clone(), coerce(value, &spec.schema));
            }
        }

        let schema = object_schema(properties, required);
        self.schemas.validate(&schema, &Value::Object(instance))
    }
}

fn request_composite(request: &OasRequest, operation: &Operation) -> (Value, Value) {
    let path_params = operation.template.captures(&request.path).unwrap_or_default();
    let cookies = parse_cookies(request);

    let mut schema_props = Map::new();
    let mut instance = Map::new();
    let mut required_top = Vec::new();

    for location in [
        ParameterLocation::Path,
        ParameterLocation::Query,
        ParameterLocation::Header,
        ParameterLocation::Cookie,
    ] {
        let mut properties = Map::new();
        let mut required = Vec::new();
        let mut values = Map::new();

        for param in operation.parameters.iter().filter(|p| p.location == location) {
            properties.insert(param.name.clone(), param.schema.clone());
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
            let raw = match location {
                ParameterLocation::Path => path_params.get(&param.name).map(|v| ParamValue::Single(v.clone())),
                ParameterLocation::Query => request.query.get(&param.name).cloned(),
                ParameterLocation::Header => request.header(&param.name).cloned(),
                ParameterLocation::Cookie => cookies.get(&param.name).map(|v| ParamValue::Single(v.clone())),
            };
            if let Some(raw) = raw {
                values.insert(param.name.clone(), coerce(&raw, &param.schema));
            }
        }

        schema_props.insert(location.instance_key().to_string(), object_schema(properties, required));
        instance.insert(location.instance_key().to_string(), Value::Object(values));
    }

    if let Some(body) = &operation.request_body {
        if let Some(schema) = preferred_media_type(&body.content).and_then(|(_, m)| m.schema.clone()) {
            schema_props.insert("requestBody".to_string(), schema);
        }
        if body.required {
            required_top.push(Value::String("requestBody".to_string()));
        }
    }
    if let Some(body) = &request.body {
        instance.insert("requestBody".to_string(), body.clone());
    }

    (object_schema(schema_props, required_top), Value::Object(instance))
}

// Draft 4 rejects an empty `required` array, so it is only emitted when non-empty.
fn object_schema(properties: Map<String, Value>, required: Vec<Value>) -> Value {
    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    schema
}

fn parse_cookies(request: &OasRequest) -> BTreeMap<String, String> {
    let Some(header) = request.header("cookie") else {
        return BTreeMap::new();
    };
    header
        .first()
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Coerce wire strings to the scalar type a parameter schema declares.
fn coerce(raw: &ParamValue, schema: &Value) -> Value {
    let ty = schema.get("type").and_then(Value::as_str);
    match (ty, raw) {
        (Some("array"), ParamValue::Multi(all)) => {
            let items = schema.get("items").cloned().unwrap_or(Value::Null);
            Value::Array(all.iter().map(|v| coerce_scalar(v, &items)).collect())
        }
        (Some("array"), ParamValue::Single(v)) => {
            let items = schema.get("items").cloned().unwrap_or(Value::Null);
            Value::Array(v.split(',').map(|part| coerce_scalar(part, &items)).collect())
        }
        (_, ParamValue::Single(v)) => coerce_scalar(v, schema),
        (_, multi) => multi.to_json(),
    }
}

fn coerce_scalar(raw: &str, schema: &Value) -> Value {
    let parsed = match schema.get("type").and_then(Value::as_str) {
        Some("integer") => raw.parse::<i64>().ok().map(Value::from),
        Some("number") => raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number),
        Some("boolean") => raw.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}
