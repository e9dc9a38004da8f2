//! Document normalization pipeline.
//!
//! Produces one immutable [`ContractSnapshot`] per build. Reloads build a
//! fresh snapshot; nothing here mutates a snapshot after construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;

use crate::document::closure;
use crate::document::error::DocumentError;
use crate::document::loader::{self, DocumentFormat};
use crate::document::resolver::{DocumentResolver, LocalResolver};
use crate::routing::OperationTable;

/// Raw and normalized forms of an API contract.
#[derive(Debug, Clone)]
pub struct ApiDocument {
    pub source: PathBuf,
    pub format: DocumentFormat,
    pub raw: Value,
    /// Converted, resolved and (in strict mode) closed. The only form used per request.
    pub normalized: Value,
}

impl ApiDocument {
    pub fn title(&self) -> &str {
        self.raw.pointer("/info/title").and_then(Value::as_str).unwrap_or("untitled")
    }

    pub fn version(&self) -> &str {
        self.raw.pointer("/info/version").and_then(Value::as_str).unwrap_or("unknown")
    }
}

/// A normalized document and the operation table derived from it.
#[derive(Debug)]
pub struct ContractSnapshot {
    pub document: ApiDocument,
    pub operations: OperationTable,
    pub built_at: SystemTime,
}

/// Load → detect → convert → resolve → (strict) close.
#[derive(Debug, Clone)]
pub struct DocumentPipeline {
    resolver: Arc<dyn DocumentResolver>,
    strict: bool,
}

impl DocumentPipeline {
    /// Pipeline with the local resolver.
    pub fn new(strict: bool) -> Self {
        Self::with_resolver(Arc::new(LocalResolver), strict)
    }

    pub fn with_resolver(resolver: Arc<dyn DocumentResolver>, strict: bool) -> Self {
        Self { resolver, strict }
    }

    pub fn load(&self, path: &Path) -> Result<Value, DocumentError> {
        loader::load(path)
    }

    pub fn detect_format(&self, raw: &Value) -> DocumentFormat {
        loader::detect_format(raw)
    }

    pub fn convert(&self, raw: &Value, source: &Path) -> Result<Value, DocumentError> {
        match self.detect_format(raw) {
            DocumentFormat::V3 => Ok(raw.clone()),
            DocumentFormat::V2 => self.resolver.convert_v2(raw, source),
            DocumentFormat::Unknown => Err(DocumentError::Conversion(
                "unsupported API document format (expected `swagger: \"2.0\"` or `openapi: \"3.x\"`)".to_string(),
            )),
        }
    }

    pub fn resolve(&self, doc: Value, source: &Path) -> Result<Value, DocumentError> {
        self.resolver.resolve(doc, source)
    }

    pub fn apply_strict_closure(&self, doc: Value) -> Value {
        closure::apply_strict_closure(doc)
    }

    /// Run every stage and derive the operation table.
    pub fn build(&self, path: &Path) -> Result<ContractSnapshot, DocumentError> {
        let raw = self.load(path)?;
        let format = self.detect_format(&raw);
        let converted = self.convert(&raw, path)?;
        let mut normalized = self.resolve(converted, path)?;
        if self.strict {
            normalized = self.apply_strict_closure(normalized);
        }

        let operations = OperationTable::from_document(&normalized);
        let document = ApiDocument {
            source: path.to_path_buf(),
            format,
            raw,
            normalized,
        };

        tracing::info!(
            file = %path.display(),
            title = document.title(),
            version = document.version(),
            format = ?format,
            operations = operations.len(),
            strict = self.strict,
            "API document loaded"
        );
        if self.strict {
            tracing::info!("Additional properties are forbidden unless explicitly declared");
        }

        Ok(ContractSnapshot {
            document,
            operations,
            built_at: SystemTime::now(),
        })
    }
}
