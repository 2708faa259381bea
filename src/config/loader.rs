//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AdapterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AdapterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    load_config_str(&content)
}

/// Parse and validate configuration from TOML text.
pub fn load_config_str(content: &str) -> Result<AdapterConfig, ConfigError> {
    let config: AdapterConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid() {
        let config = load_config_str(
            r#"
            [server]
            bind_address = "127.0.0.1:9000"
            hide_func_name = true

            [client]
            address = "peer:7000"
            max_connections = 4
            "#,
        )
        .unwrap();
        assert!(config.server.hide_func_name);
        assert_eq!(config.client.max_connections, 4);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(load_config_str("[server"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let err = load_config_str("[client]\ntimeout_ms = 1\naddress = \"\"\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Validation failed"));
        assert!(msg.contains("client.address"));
        assert!(msg.contains("client.timeout_ms"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/adapter.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
