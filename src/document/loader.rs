//! Reading API documents from disk and detecting their format.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::document::error::DocumentError;

/// OpenAPI major version a raw document declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentFormat {
    /// `swagger: "2.0"`
    V2,
    /// `openapi: "3.x"`
    V3,
    Unknown,
}

/// Load a JSON (`.json`) or YAML (`.yaml`/`.yml`) document.
pub fn load(path: &Path) -> Result<Value, DocumentError> {
    let content = fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &content)
}

/// Parse document text, choosing the format by file extension.
pub fn parse(path: &Path, content: &str) -> Result<Value, DocumentError> {
    let format_err = |reason: String| DocumentError::Format {
        path: path.to_path_buf(),
        reason,
    };

    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("json") => serde_json::from_str(content).map_err(|e| format_err(e.to_string())),
        Some("yaml") | Some("yml") => serde_yaml::from_str(content).map_err(|e| format_err(e.to_string())),
        Some(other) => Err(format_err(format!("unsupported file extension '.{}'", other))),
        None => Err(format_err("will not read a file that has no extension".to_string())),
    }
}

pub fn detect_format(raw: &Value) -> DocumentFormat {
    if raw.get("swagger").and_then(Value::as_str) == Some("2.0") {
        return DocumentFormat::V2;
    }
    match raw.get("openapi").and_then(Value::as_str) {
        Some(v) if v.starts_with("3.") => DocumentFormat::V3,
        _ => DocumentFormat::Unknown,
    }
}
