//! Validation result model shared by the proxy and the mock server.
//!
//! These types are serialized verbatim into the
//! `openapi-cop-validation-result` header, so field names follow the
//! camelCase wire shape clients already parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single conformance violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Schema keyword that failed (`required`, `type`, `operation`, ...).
    pub keyword: String,
    /// JSON pointer into the validated instance.
    pub data_path: String,
    /// JSON pointer into the schema that produced the error.
    pub schema_path: String,
    /// Keyword-specific detail, e.g. `{"missingProperty": "input"}`.
    pub params: Value,
    pub message: String,
}

impl ValidationError {
    pub fn new(keyword: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            data_path: String::new(),
            schema_path: String::new(),
            params: Value::Object(Default::default()),
            message: message.into(),
        }
    }

    pub fn at(mut self, data_path: impl Into<String>) -> Self {
        self.data_path = data_path.into();
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Outcome of validating one part of an exchange.
///
/// `errors` is absent exactly when `valid` is true; the constructors are the
/// only way this crate builds a result, which keeps that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self { valid: true, errors: None }
    }

    pub fn invalid(errors: Vec<ValidationError>) -> Self {
        Self { valid: false, errors: Some(errors) }
    }

    /// Build a result from collected errors: empty means valid.
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            Self::valid()
        } else {
            Self::invalid(errors)
        }
    }

    /// Append an error, flipping the result to invalid.
    pub fn push(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.get_or_insert_with(Vec::new).push(error);
    }

    pub fn errors(&self) -> &[ValidationError] {
        self.errors.as_deref().unwrap_or(&[])
    }
}

/// Aggregate results for a proxied exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<ValidationResult>,
}

/// True iff any present result is invalid. Gates every disclosure decision.
pub fn has_errors(results: &ValidationResults) -> bool {
    [&results.request, &results.response, &results.response_headers]
        .into_iter()
        .flatten()
        .any(|r| !r.valid)
}
