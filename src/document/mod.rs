//! API document subsystem.
//!
//! # Data Flow
//! ```text
//! OpenAPI file (JSON/YAML, v2 or v3)
//!     → loader.rs (parse, detect format)
//!     → resolver.rs (convert v2 → v3, dereference, merge allOf)
//!     → closure.rs (strict mode: close open objects)
//!     → pipeline.rs (ContractSnapshot: document + OperationTable)
//!     → shared via Arc, swapped atomically on reload
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; a reload builds a new one
//! - Conversion and resolution sit behind the `DocumentResolver` trait
//! - Any pipeline error is fatal at startup and ignored (logged) on reload

pub mod closure;
pub mod convert;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod resolver;

pub use closure::{apply_strict_closure, SchemaNode};
pub use error::DocumentError;
pub use loader::DocumentFormat;
pub use pipeline::{ApiDocument, ContractSnapshot, DocumentPipeline};
pub use resolver::{DocumentResolver, LocalResolver};
