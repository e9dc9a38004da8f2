//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::config::schema::{MockConfig, ProxyConfig};
use crate::config::validation::{validate_config, validate_mock_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Invalid(errors) => {
                write!(f, "Invalid configuration: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load a proxy configuration file. Not validated: CLI overrides come first.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    read_toml(path)
}

pub fn load_mock_config(path: &Path) -> Result<MockConfig, ConfigError> {
    read_toml(path)
}

/// Semantic checks, every violation reported.
pub fn validate(config: &ProxyConfig) -> Result<(), ConfigError> {
    validate_config(config).map_err(ConfigError::Invalid)
}

pub fn validate_mock(config: &MockConfig) -> Result<(), ConfigError> {
    validate_mock_config(config).map_err(ConfigError::Invalid)
}
