//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy sessions, mock handler, reload watcher produce:
//!     → logging.rs (structured tracing events, one span per exchange)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Each exchange runs in a span carrying its session id
//! - Metrics are recorded through the `metrics` facade; the exporter is opt-in

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
