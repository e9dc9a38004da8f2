//! Document pipeline errors. All of them are fatal at startup.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("could not read API document '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not parseable JSON/YAML, or has an unsupported extension.
    #[error("could not parse API document '{}': {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("could not convert document to OpenAPI v3: {0}")]
    Conversion(String),

    /// Every reference that could not be resolved, in discovery order.
    #[error("could not resolve references in API document: {}", .unresolved.join(", "))]
    ReferenceResolution { unresolved: Vec<String> },
}
