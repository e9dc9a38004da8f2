//! Response handling and transformation.
//!
//! # Responsibilities
//! - Encode diagnostic headers (`openapi-cop-*`)
//! - Strip hop-by-hop headers on pass-through
//! - Decode and parse upstream bodies for validation
//! - Render the disclosure envelope
//!
//! # Design Decisions
//! - Header values are JSON with every non-ASCII character `\u`-escaped, so
//!   any document or payload yields a legal header value
//! - Parsing never touches the raw bytes used for pass-through; gzip and
//!   deflate are undone on a copy

use std::borrow::Cow;
use std::io::Read;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use flate2::read::{MultiGzDecoder, ZlibDecoder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::http::request::{decode_as, header_map, OasRequest, ParamMap, RequestParsingError};
use crate::routing::operation::is_json_media_type;
use crate::validation::{ValidationError, ValidationResults};

pub const VALIDATION_RESULT_HEADER: &str = "openapi-cop-validation-result";
pub const SOURCE_REQUEST_HEADER: &str = "openapi-cop-source-request";
pub const OPENAPI_FILE_HEADER: &str = "openapi-cop-openapi-file";

pub const ENVELOPE_MESSAGE: &str = "openapi-cop Proxy validation failed";

/// Headers meaningful only for a single transport hop.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Serialize `value` as a header-safe JSON string.
pub fn json_header_value<T: Serialize>(value: &T) -> Result<HeaderValue, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let escaped = ascii_escape(&json);
    // Only printable ASCII remains after escaping.
    HeaderValue::from_str(&escaped).map_err(serde::ser::Error::custom)
}

fn ascii_escape(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Attach `openapi-cop-validation-result` and `openapi-cop-source-request`.
pub fn attach_diagnostics(headers: &mut HeaderMap, results: &ValidationResults, request: &OasRequest) {
    match json_header_value(results) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(VALIDATION_RESULT_HEADER), v);
        }
        Err(e) => tracing::error!(error = %e, "Could not encode validation result header"),
    }
    match json_header_value(request) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(SOURCE_REQUEST_HEADER), v);
        }
        Err(e) => tracing::error!(error = %e, "Could not encode source request header"),
    }
}

/// Drop hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    for name in HOP_BY_HOP.iter().copied().chain(named.iter().map(String::as_str)) {
        headers.remove(name);
    }
}

/// An upstream body that cannot be turned into a validation value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseParsingError {
    #[error("response body uses unsupported content encoding '{0}'")]
    UnsupportedEncoding(String),
    #[error("response body is not valid {encoding} data: {reason}")]
    Encoding { encoding: String, reason: String },
    #[error("response body is not valid {content_type}: {reason}")]
    Malformed { content_type: String, reason: String },
}

impl ResponseParsingError {
    fn into_validation_error(self) -> ValidationError {
        ValidationError::new("responseBody", self.to_string()).at("/responseBody")
    }
}

/// Undo `Content-Encoding` for the validation copy. Identity borrows.
pub fn decode_content<'a>(headers: &HeaderMap, body: &'a [u8]) -> Result<Cow<'a, [u8]>, ResponseParsingError> {
    let encodings: Vec<String> = headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty() && s != "identity")
        .collect();

    let mut decoded = Cow::Borrowed(body);
    // Codings are listed in the order they were applied.
    for encoding in encodings.iter().rev() {
        let mut out = Vec::new();
        let read = match encoding.as_str() {
            "gzip" | "x-gzip" => MultiGzDecoder::new(&decoded[..]).read_to_end(&mut out),
            "deflate" => ZlibDecoder::new(&decoded[..]).read_to_end(&mut out),
            other => return Err(ResponseParsingError::UnsupportedEncoding(other.to_string())),
        };
        read.map_err(|e| ResponseParsingError::Encoding {
            encoding: encoding.clone(),
            reason: e.to_string(),
        })?;
        decoded = Cow::Owned(out);
    }
    Ok(decoded)
}

/// Parse an upstream body by its Content-Encoding and Content-Type.
///
/// JSON that fails to parse is kept as a string and reported. An empty body
/// is `null`; unknown media types come back as a string.
pub fn parse_response_body(headers: &HeaderMap, body: &[u8]) -> (Value, Option<ValidationError>) {
    if body.is_empty() {
        return (Value::Null, None);
    }
    let body = match decode_content(headers, body) {
        Ok(decoded) => decoded,
        Err(e) => return (Value::Null, Some(e.into_validation_error())),
    };
    let text = || Value::String(String::from_utf8_lossy(&body).into_owned());

    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return (serde_json::from_slice(&body).unwrap_or_else(|_| text()), None);
    };
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

    if is_json_media_type(&essence) || essence == "application/x-www-form-urlencoded" {
        match decode_as(&essence, &body) {
            Ok(v) => (v, None),
            Err(e) if essence == "*/*" => {
                tracing::debug!(error = %e, "Wildcard response body is not JSON");
                (text(), None)
            }
            Err(e) => {
                let reason = match e {
                    RequestParsingError::Malformed { reason, .. } => reason,
                    other => other.to_string(),
                };
                let error = ResponseParsingError::Malformed {
                    content_type: essence,
                    reason,
                };
                (text(), Some(error.into_validation_error()))
            }
        }
    } else {
        (text(), None)
    }
}

/// Upstream response as reported inside the disclosure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSummary {
    pub status_code: u16,
    pub headers: ParamMap,
    pub body: Value,
}

impl UpstreamSummary {
    pub fn new(status_code: u16, headers: &HeaderMap, body: Value) -> Self {
        Self {
            status_code,
            headers: header_map(headers),
            body,
        }
    }
}

/// `{error:{message, request, response, validationResults}}`
pub fn envelope(request: &OasRequest, response: Option<&UpstreamSummary>, results: &ValidationResults) -> Value {
    let mut error = Map::new();
    error.insert("message".into(), Value::String(ENVELOPE_MESSAGE.to_string()));
    error.insert("request".into(), serde_json::to_value(request).unwrap_or(Value::Null));
    if let Some(response) = response {
        error.insert("response".into(), serde_json::to_value(response).unwrap_or(Value::Null));
    }
    error.insert(
        "validationResults".into(),
        serde_json::to_value(results).unwrap_or(Value::Null),
    );

    let mut root = Map::new();
    root.insert("error".into(), Value::Object(error));
    Value::Object(root)
}
