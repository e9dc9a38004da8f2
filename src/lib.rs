//! openapi-cop: OpenAPI conformance proxy and mock server.

// Contract
pub mod document;
pub mod routing;
pub mod validation;

// Serving
pub mod http;
pub mod mock;
pub mod proxy;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::{MockConfig, ProxyConfig};
pub use document::{ContractSnapshot, DocumentPipeline};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mock::MockServer;
