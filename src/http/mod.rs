//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body buffering)
//!     → request.rs (simplified OasRequest, body parsing)
//!     → [proxy session validates and forwards]
//!     → response.rs (diagnostic headers, envelope, hop-by-hop stripping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{OasRequest, ParamMap, ParamValue, RequestParsingError};
pub use response::{ResponseParsingError, OPENAPI_FILE_HEADER, SOURCE_REQUEST_HEADER, VALIDATION_RESULT_HEADER};
pub use server::{AppState, HttpServer, ProxyError, ServerHandle};
