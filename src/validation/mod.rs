//! Conformance validation subsystem.
//!
//! # Data Flow
//! ```text
//! OasRequest + matched Operation
//!     → validator.rs (compose request schema / pick response schema)
//!     → schema.rs (SchemaValidator capability, jsonschema-backed)
//!     → result.rs (ValidationResult, aggregated into ValidationResults)
//! ```
//!
//! # Design Decisions
//! - Nonconformance is data, never an error: every check returns a result
//! - The schema engine sits behind a trait so it can be substituted
//! - `has_errors` is the single predicate gating disclosure

pub mod result;
pub mod schema;
pub mod validator;

pub use result::{has_errors, ValidationError, ValidationResult, ValidationResults};
pub use schema::{JsonSchemaValidator, SchemaValidator};
pub use validator::ConformanceValidator;
