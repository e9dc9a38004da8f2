//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every field has a default so a minimal file (or none at all) works.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration for the validating proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Where the proxy listens.
    pub listener: ListenerConfig,

    /// The server requests are forwarded to.
    pub target: TargetConfig,

    /// The API contract.
    pub document: DocumentConfig,

    /// Validation modes.
    pub validation: ValidationConfig,

    pub limits: LimitsConfig,

    pub observability: ObservabilityConfig,
}

/// Root configuration for the mock server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MockConfig {
    pub listener: ListenerConfig,
    pub document: DocumentConfig,
    pub limits: LimitsConfig,
    pub observability: ObservabilityConfig,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig {
                port: 8889,
                ..ListenerConfig::default()
            },
            document: DocumentConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host name or IP address to bind.
    pub host: String,

    pub port: u16,
}

impl ListenerConfig {
    /// `host:port`, suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8888,
        }
    }
}

/// Upstream target configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL; the original request path and query are appended.
    pub url: String,

    /// Upper bound on one upstream call, response body included.
    pub timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8889".to_string(),
            timeout_secs: 30,
        }
    }
}

/// API document configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DocumentConfig {
    /// OpenAPI v2 or v3 file, JSON or YAML.
    pub path: PathBuf,

    /// Rebuild the contract on change.
    pub watch: bool,

    /// File or directory to watch instead of the document itself.
    /// Directories are watched recursively.
    pub watch_path: Option<PathBuf>,
}

impl DocumentConfig {
    /// Where change events come from.
    pub fn watch_location(&self) -> &Path {
        self.watch_path.as_deref().unwrap_or(&self.path)
    }
}

/// Validation modes.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Forbid additional properties unless a schema explicitly allows them.
    pub strict: bool,

    /// Never alter the upstream response; report through headers only.
    pub silent: bool,
}

/// Resource limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum buffered request body size in bytes. Upstream responses are relayed whole.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address(), "localhost:8888");
        assert_eq!(config.target.url, "http://localhost:8889");
        assert_eq!(config.limits.max_body_size, 2 * 1024 * 1024);
        assert!(!config.validation.strict);
        assert!(!config.validation.silent);

        assert_eq!(MockConfig::default().listener.port, 8889);
    }

    #[test]
    fn test_partial_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [target]
            url = "http://127.0.0.1:3000"

            [validation]
            strict = true
            "#,
        )
        .unwrap();
        assert_eq!(config.target.url, "http://127.0.0.1:3000");
        assert_eq!(config.target.timeout_secs, 30);
        assert!(config.validation.strict);
        assert_eq!(config.listener.port, 8888);
    }

    #[test]
    fn test_watch_location_falls_back_to_document() {
        let mut document = DocumentConfig {
            path: "api.yaml".into(),
            ..Default::default()
        };
        assert_eq!(document.watch_location(), Path::new("api.yaml"));

        let config: ProxyConfig = toml::from_str(
            r#"
            [document]
            path = "api.yaml"
            watch = true
            watch_path = "specs"
            "#,
        )
        .unwrap();
        assert_eq!(config.document.watch_location(), Path::new("specs"));

        document.watch_path = Some("specs/parts".into());
        assert_eq!(document.watch_location(), Path::new("specs/parts"));
    }
}
