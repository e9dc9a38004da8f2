//! JSON Schema validation capability.
//!
//! The conformance layer never interprets schema keywords itself; it hands
//! `(schema, instance)` pairs to a [`SchemaValidator`]. The default engine is
//! the `jsonschema` crate, configured for the draft-4 dialect OpenAPI 3.0
//! schemas are written in.

use jsonschema::error::ValidationErrorKind;
use jsonschema::Draft;
use serde_json::{json, Value};

use crate::validation::result::{ValidationError, ValidationResult};

/// Validates a JSON instance against a JSON Schema.
pub trait SchemaValidator: Send + Sync + std::fmt::Debug {
    fn validate(&self, schema: &Value, instance: &Value) -> ValidationResult;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate.
#[derive(Debug, Clone)]
pub struct JsonSchemaValidator {
    draft: Draft,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self { draft: Draft::Draft4 }
    }

    /// Use a specific draft (OpenAPI 3.1 documents speak 2020-12).
    pub fn with_draft(draft: Draft) -> Self {
        Self { draft }
    }
}

impl Default for JsonSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, instance: &Value) -> ValidationResult {
        let mut opts = jsonschema::options();
        // OpenAPI schema objects are a dialect; do not reject them against the draft meta-schema.
        opts.with_draft(self.draft).should_validate_schema(false);

        let validator = match opts.build(schema) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Declared schema failed to compile");
                return ValidationResult::invalid(vec![ValidationError::new(
                    "schema",
                    format!("schema could not be compiled: {}", e),
                )
                .with_params(json!({ "schemaPath": e.schema_path.to_string() }))]);
            }
        };

        let errors = validator
            .iter_errors(instance)
            .map(|e| {
                let schema_path = e.schema_path.to_string();
                ValidationError {
                    keyword: keyword_of(&schema_path),
                    data_path: e.instance_path.to_string(),
                    params: params_of(&e.kind),
                    message: e.to_string(),
                    schema_path,
                }
            })
            .collect();

        ValidationResult::from_errors(errors)
    }
}

/// The failing keyword is the last non-index segment of the schema path.
fn keyword_of(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|seg| !seg.is_empty() && seg.parse::<usize>().is_err())
        .unwrap_or("schema")
        .to_string()
}

fn params_of(kind: &ValidationErrorKind) -> Value {
    match kind {
        ValidationErrorKind::Required { property } => {
            let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
            json!({ "missingProperty": name })
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            json!({ "additionalProperty": unexpected.first(), "additionalProperties": unexpected })
        }
        _ => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_schema() -> Value {
        json!({
            "type": "object",
            "required": ["input"],
            "properties": { "input": { "type": "string" } }
        })
    }

    #[test]
    fn test_missing_required_property() {
        let validator = JsonSchemaValidator::new();
        let result = validator.validate(&echo_schema(), &json!({ "blurp": "BLUUURP!" }));

        assert!(!result.valid);
        let errors = result.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].keyword, "required");
        assert_eq!(errors[0].params["missingProperty"], "input");
    }

    #[test]
    fn test_conformant_instance_has_no_errors() {
        let validator = JsonSchemaValidator::new();
        let result = validator.validate(&echo_schema(), &json!({ "input": "Marco!" }));
        assert_eq!(result, ValidationResult::valid());
    }

    #[test]
    fn test_closed_object_rejects_extra_property() {
        let mut schema = echo_schema();
        schema["additionalProperties"] = json!(false);
        let validator = JsonSchemaValidator::new();
        let result = validator.validate(&schema, &json!({ "input": "Marco!", "sponge": "Bob" }));

        assert!(!result.valid);
        assert_eq!(result.errors()[0].keyword, "additionalProperties");
    }

    #[test]
    fn test_keyword_of_skips_indices() {
        assert_eq!(keyword_of("/properties/a/type"), "type");
        assert_eq!(keyword_of("/allOf/0"), "allOf");
        assert_eq!(keyword_of(""), "schema");
    }
}
