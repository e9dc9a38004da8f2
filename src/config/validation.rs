//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure functions: config → Result<(), Vec<ValidationError>>
//! - Runs after CLI overrides are applied, before anything binds

use std::fmt;

use url::Url;

use crate::config::schema::{DocumentConfig, ListenerConfig, MockConfig, ProxyConfig};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_listener(&config.listener, &mut errors);
    check_document(&config.document, &mut errors);

    match Url::parse(&config.target.url) {
        Ok(url) => {
            if url.scheme() != "http" {
                errors.push(ValidationError::new("target.url", "scheme must be http"));
            }
            match url.host_str() {
                None => errors.push(ValidationError::new("target.url", "must include a host")),
                Some(host) if points_at_listener(host, url.port_or_known_default(), &config.listener) => {
                    errors.push(ValidationError::new(
                        "target.url",
                        "the proxy must not forward to its own listener",
                    ));
                }
                Some(_) => {}
            }
        }
        Err(e) => errors.push(ValidationError::new("target.url", format!("not an absolute URL ({})", e))),
    }

    if config.target.timeout_secs == 0 {
        errors.push(ValidationError::new("target.timeout_secs", "must be greater than 0"));
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_mock_config(config: &MockConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_listener(&config.listener, &mut errors);
    check_document(&config.document, &mut errors);
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_listener(listener: &ListenerConfig, errors: &mut Vec<ValidationError>) {
    if listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }
}

fn check_document(document: &DocumentConfig, errors: &mut Vec<ValidationError>) {
    if document.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("document.path", "an OpenAPI document is required"));
    }
}

const LOOPBACK_NAMES: [&str; 4] = ["localhost", "127.0.0.1", "::1", "[::1]"];

fn points_at_listener(host: &str, port: Option<u16>, listener: &ListenerConfig) -> bool {
    if port != Some(listener.port) || listener.port == 0 {
        return false;
    }
    let same_host = host.eq_ignore_ascii_case(&listener.host);
    let both_loopback = LOOPBACK_NAMES.contains(&host)
        && (LOOPBACK_NAMES.contains(&listener.host.as_str()) || listener.host == "0.0.0.0");
    same_host || both_loopback
}
