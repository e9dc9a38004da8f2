//! Swagger 2.0 → OpenAPI 3.0 conversion.
//!
//! Covers what request/response validation consumes: schemas, parameters,
//! bodies, response content, response headers, examples and servers.
//! `collectionFormat` has no v3 equivalent here and is dropped.

use serde_json::{json, Map, Value};

use crate::document::error::DocumentError;
use crate::routing::operation::PATH_ITEM_METHODS;

/// Keywords a v2 non-body parameter or header carries inline that move into `schema`.
const SCHEMA_KEYWORDS: [&str; 17] = [
    "type",
    "format",
    "items",
    "enum",
    "default",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "multipleOf",
    "example",
];

/// Operation fields copied as-is.
const OPERATION_FIELDS: [&str; 7] =
    ["operationId", "summary", "description", "tags", "deprecated", "security", "externalDocs"];

pub fn swagger2_to_openapi3(raw: &Value) -> Result<Value, DocumentError> {
    if !raw.is_object() {
        return Err(DocumentError::Conversion("document root is not an object".to_string()));
    }

    let consumes = media_types(raw.get("consumes"));
    let produces = media_types(raw.get("produces"));

    let mut out = Map::new();
    out.insert("openapi".into(), json!("3.0.0"));
    out.insert("info".into(), raw.get("info").cloned().unwrap_or_else(|| json!({ "title": "", "version": "" })));
    if let Some(servers) = servers(raw) {
        out.insert("servers".into(), servers);
    }
    for key in ["tags", "security", "externalDocs"] {
        if let Some(v) = raw.get(key) {
            out.insert(key.into(), v.clone());
        }
    }

    let mut paths = Map::new();
    for (path, item) in raw.get("paths").and_then(Value::as_object).into_iter().flatten() {
        paths.insert(path.clone(), convert_path_item(raw, item, &consumes, &produces)?);
    }
    out.insert("paths".into(), Value::Object(paths));

    let mut components = Map::new();
    if let Some(defs) = raw.get("definitions") {
        components.insert("schemas".into(), defs.clone());
    }
    if let Some(schemes) = raw.get("securityDefinitions") {
        components.insert("securitySchemes".into(), schemes.clone());
    }
    out.insert("components".into(), Value::Object(components));

    Ok(rewrite_refs(Value::Object(out)))
}

fn media_types(v: Option<&Value>) -> Vec<String> {
    let list: Vec<String> = v
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    if list.is_empty() {
        vec!["application/json".to_string()]
    } else {
        list
    }
}

fn servers(raw: &Value) -> Option<Value> {
    let host = raw.get("host").and_then(Value::as_str)?;
    let base_path = raw.get("basePath").and_then(Value::as_str).unwrap_or("");
    let schemes: Vec<&str> = raw
        .get("schemes")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .filter(|s: &Vec<&str>| !s.is_empty())
        .unwrap_or_else(|| vec!["http"]);
    Some(Value::Array(
        schemes
            .into_iter()
            .map(|scheme| json!({ "url": format!("{}://{}{}", scheme, host, base_path) }))
            .collect(),
    ))
}

/// Inline `#/parameters/*` and `#/responses/*` so conversion sees full objects.
fn inline_shared(raw: &Value, v: &Value) -> Value {
    match v.get("$ref").and_then(Value::as_str) {
        Some(r) if r.starts_with("#/parameters/") || r.starts_with("#/responses/") => {
            raw.pointer(&r[1..]).cloned().unwrap_or_else(|| v.clone())
        }
        _ => v.clone(),
    }
}

fn convert_path_item(raw: &Value, item: &Value, consumes: &[String], produces: &[String]) -> Result<Value, DocumentError> {
    let item_obj = item
        .as_object()
        .ok_or_else(|| DocumentError::Conversion("path item is not an object".to_string()))?;

    let shared_params: Vec<Value> = item
        .get("parameters")
        .and_then(Value::as_array)
        .map(|a| a.iter().map(|p| inline_shared(raw, p)).collect())
        .unwrap_or_default();

    let mut out = Map::new();
    let (path_params, _) = split_parameters(&shared_params);
    if !path_params.is_empty() {
        out.insert("parameters".into(), Value::Array(path_params));
    }

    for (key, op) in item_obj {
        if !PATH_ITEM_METHODS.contains(&key.as_str()) {
            continue;
        }
        let op_consumes = op.get("consumes").map(|c| media_types(Some(c))).unwrap_or_else(|| consumes.to_vec());
        let op_produces = op.get("produces").map(|p| media_types(Some(p))).unwrap_or_else(|| produces.to_vec());

        // Body/formData declared at path level still apply to every operation.
        let mut params = shared_params.clone();
        params.extend(
            op.get("parameters")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(|p| inline_shared(raw, p)),
        );
        out.insert(key.clone(), convert_operation(raw, op, &params, &op_consumes, &op_produces));
    }
    Ok(Value::Object(out))
}

/// Split into converted non-body parameters and the raw body/formData ones.
fn split_parameters(params: &[Value]) -> (Vec<Value>, Vec<Value>) {
    let mut plain = Vec::new();
    let mut body = Vec::new();
    for p in params {
        match p.get("in").and_then(Value::as_str) {
            Some("body") | Some("formData") => body.push(p.clone()),
            Some(_) => plain.push(convert_parameter(p)),
            // Unresolved refs pass through and surface during resolution.
            None => plain.push(p.clone()),
        }
    }
    (plain, body)
}

fn convert_parameter(p: &Value) -> Value {
    let mut out = Map::new();
    for key in ["name", "in", "description", "required", "allowEmptyValue"] {
        if let Some(v) = p.get(key) {
            out.insert(key.into(), v.clone());
        }
    }
    out.insert("schema".into(), extract_schema(p));
    Value::Object(out)
}

fn extract_schema(v: &Value) -> Value {
    let mut schema = Map::new();
    for key in SCHEMA_KEYWORDS {
        if let Some(val) = v.get(key) {
            schema.insert(key.into(), val.clone());
        }
    }
    Value::Object(schema)
}

fn convert_operation(raw: &Value, op: &Value, params: &[Value], consumes: &[String], produces: &[String]) -> Value {
    let mut out = Map::new();
    for key in OPERATION_FIELDS {
        if let Some(v) = op.get(key) {
            out.insert(key.into(), v.clone());
        }
    }

    let (mut plain, body_params) = split_parameters(params);
    // Later declarations override earlier ones by (name, in).
    let mut deduped: Vec<Value> = Vec::new();
    for p in plain.drain(..) {
        deduped.retain(|q| !(q.get("name") == p.get("name") && q.get("in") == p.get("in")));
        deduped.push(p);
    }
    if !deduped.is_empty() {
        out.insert("parameters".into(), Value::Array(deduped));
    }

    if let Some(body) = request_body(&body_params, consumes) {
        out.insert("requestBody".into(), body);
    }

    let mut responses = Map::new();
    for (status, response) in op.get("responses").and_then(Value::as_object).into_iter().flatten() {
        responses.insert(status.clone(), convert_response(&inline_shared(raw, response), produces));
    }
    out.insert("responses".into(), Value::Object(responses));
    Value::Object(out)
}

fn request_body(body_params: &[Value], consumes: &[String]) -> Option<Value> {
    if let Some(body) = body_params.iter().rev().find(|p| p.get("in").and_then(Value::as_str) == Some("body")) {
        let schema = body.get("schema").cloned().unwrap_or_else(|| json!({}));
        let content: Map<String, Value> = consumes
            .iter()
            .map(|ct| (ct.clone(), json!({ "schema": schema })))
            .collect();
        let mut rb = json!({ "content": content });
        if let Some(required) = body.get("required") {
            rb["required"] = required.clone();
        }
        if let Some(description) = body.get("description") {
            rb["description"] = description.clone();
        }
        return Some(rb);
    }

    let form: Vec<&Value> = body_params
        .iter()
        .filter(|p| p.get("in").and_then(Value::as_str) == Some("formData"))
        .collect();
    if form.is_empty() {
        return None;
    }

    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in &form {
        let Some(name) = p.get("name").and_then(Value::as_str) else { continue };
        properties.insert(name.to_string(), extract_schema(p));
        if p.get("required").and_then(Value::as_bool).unwrap_or(false) {
            required.push(json!(name));
        }
    }
    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = Value::Array(required.clone());
    }

    let media = if consumes.iter().any(|c| c == "multipart/form-data") {
        "multipart/form-data"
    } else {
        "application/x-www-form-urlencoded"
    };
    let mut content = Map::new();
    content.insert(media.to_string(), json!({ "schema": schema }));
    Some(json!({ "required": !required.is_empty(), "content": content }))
}

fn convert_response(response: &Value, produces: &[String]) -> Value {
    let mut out = Map::new();
    out.insert(
        "description".into(),
        response.get("description").cloned().unwrap_or_else(|| json!("")),
    );

    if let Some(reference) = response.get("$ref") {
        out.insert("$ref".into(), reference.clone());
        return Value::Object(out);
    }

    let examples = response.get("examples").and_then(Value::as_object);
    if let Some(schema) = response.get("schema") {
        let mut content = Map::new();
        for ct in produces {
            let mut media = json!({ "schema": schema });
            if let Some(example) = examples.and_then(|e| e.get(ct)) {
                media["example"] = example.clone();
            }
            content.insert(ct.clone(), media);
        }
        out.insert("content".into(), Value::Object(content));
    }

    if let Some(headers) = response.get("headers").and_then(Value::as_object) {
        let converted: Map<String, Value> = headers
            .iter()
            .map(|(name, h)| {
                let mut header = json!({ "schema": extract_schema(h) });
                if let Some(d) = h.get("description") {
                    header["description"] = d.clone();
                }
                (name.clone(), header)
            })
            .collect();
        out.insert("headers".into(), Value::Object(converted));
    }
    Value::Object(out)
}

fn rewrite_refs(node: Value) -> Value {
    match node {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if k == "$ref" {
                        if let Some(name) = v.as_str().and_then(|r| r.strip_prefix("#/definitions/")) {
                            let rewritten = format!("#/components/schemas/{}", name);
                            return (k, Value::String(rewritten));
                        }
                    }
                    (k, rewrite_refs(v))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(rewrite_refs).collect()),
        scalar => scalar,
    }
}
