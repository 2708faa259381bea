//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts, sizes, addresses)
//! - Check that paths are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AdapterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::AdapterConfig;

/// Smallest accepted client timeout.
pub const MIN_TIMEOUT_MS: u64 = 10;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AdapterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let server = &config.server;
    if server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("not a socket address: {}", server.bind_address),
        ));
    }
    if !server.rpc_path.starts_with('/') {
        errors.push(ValidationError::new("server.rpc_path", "must start with '/'"));
    }
    if server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }
    if server.max_body_size == 0 {
        errors.push(ValidationError::new("server.max_body_size", "must be greater than 0"));
    }
    if server.max_message_size == 0 {
        errors.push(ValidationError::new("server.max_message_size", "must be greater than 0"));
    }
    if let Some(tls) = &server.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new("server.tls", "cert_path and key_path are required"));
        }
    }

    let client = &config.client;
    if client.address.is_empty() {
        errors.push(ValidationError::new("client.address", "must not be empty"));
    }
    if !client.rpc_path.starts_with('/') {
        errors.push(ValidationError::new("client.rpc_path", "must start with '/'"));
    }
    if client.timeout_ms < MIN_TIMEOUT_MS {
        errors.push(ValidationError::new(
            "client.timeout_ms",
            format!("must be at least {MIN_TIMEOUT_MS}"),
        ));
    }
    if client.max_age_secs == 0 {
        errors.push(ValidationError::new("client.max_age_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
