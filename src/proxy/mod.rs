//! Conformance-validating proxy.
//!
//! # Data Flow
//! ```text
//! Client request (buffered)
//!     → session.rs: Received
//!     → OperationTable lookup: Matched
//!     → ConformanceValidator: RequestValidated
//!     → upstream target: Forwarding → ResponseReceived | UpstreamUnreachable
//!     → ConformanceValidator: ResponseValidated
//!     → disclosure policy: Responded
//! ```
//!
//! # Design Decisions
//! - Every validation failure is recorded and forwarded anyway, so the real
//!   upstream behavior stays observable
//! - One upstream attempt per request; failures are terminal
//! - Silent mode never alters the upstream status or body

pub mod session;

pub use session::{Forwarding, ProxySession, Stage, UpstreamOutcome, UpstreamResponse};
