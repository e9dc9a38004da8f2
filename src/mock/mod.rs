//! Mock responder.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → OperationTable lookup (no match or no operationId → 404)
//!     → ConformanceValidator (violation → 400 with details)
//!     → synth.rs (example, default, or synthesized value)
//!     → response + openapi-cop-openapi-file header
//! ```
//!
//! # Design Decisions
//! - Responses are deterministic for a fixed document
//! - Shares matching and validation with the proxy

pub mod server;
pub mod synth;

pub use server::{MockServer, MockState};
pub use synth::{example_value, mock_response, synthesize, MockResponse};
