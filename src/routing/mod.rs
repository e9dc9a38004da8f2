//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path)
//!     → router.rs (operation lookup)
//!     → matcher.rs (evaluate path templates)
//!     → Return: matched Operation or None
//!
//! Table compilation (at startup and on reload):
//!     normalized document paths
//!     → operation.rs (typed Operation per method)
//!     → sort by template specificity
//!     → freeze as immutable OperationTable
//! ```
//!
//! # Design Decisions
//! - Tables compiled once per snapshot, immutable at runtime
//! - Deterministic: same input always matches same operation

pub mod matcher;
pub mod operation;
pub mod router;

pub use matcher::PathTemplate;
pub use operation::{Operation, ParameterLocation};
pub use router::{path_params, OperationTable};
