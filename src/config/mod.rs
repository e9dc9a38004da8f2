//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides (main.rs, bin/mock-server.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig / MockConfig (validated, immutable)
//!
//! On API document change:
//!     watcher.rs detects change
//!     → DocumentPipeline rebuilds the contract
//!     → new ContractSnapshot sent to the server
//!     → atomic swap of the shared snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the API contract hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use schema::{
    DocumentConfig, LimitsConfig, ListenerConfig, MockConfig, ObservabilityConfig, ProxyConfig, TargetConfig,
    ValidationConfig,
};
pub use watcher::DocumentWatcher;
