//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and
//! default every field, so a minimal file only names what it changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::RetryPolicy;

/// Root configuration for the adapter.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdapterConfig {
    /// Inbound bindings (HTTP and RPC).
    pub server: ServerConfig,

    /// Outbound peer client.
    pub client: ClientConfig,

    pub observability: ObservabilityConfig,
}

/// Inbound server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path of the WebSocket RPC binding.
    pub rpc_path: String,

    /// Reported in the `X-Hostname` response header.
    pub hostname: String,

    /// Omit `X-Function` from responses.
    pub hide_func_name: bool,

    /// Per-request timeout for the HTTP binding.
    pub request_timeout_secs: u64,

    /// Maximum HTTP body size in bytes.
    pub max_body_size: usize,

    /// Maximum RPC frame size in bytes.
    pub max_message_size: usize,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            rpc_path: "/rpc".to_string(),
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            hide_func_name: false,
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024,
            max_message_size: 16 * 1024 * 1024,
            tls: None,
        }
    }
}

/// TLS configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Outbound client configuration for one peer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Wire protocol used to reach the peer.
    pub protocol: Protocol,

    /// Peer address, `host:port`. With `http`, a full base URL also works.
    pub address: String,

    /// RPC path on the peer.
    pub rpc_path: String,

    /// Bounds connect, and each call's acquire + round trip.
    pub timeout_ms: u64,

    /// Pool capacity. `0` disables pooling.
    pub max_connections: usize,

    /// Retries after the first attempt.
    pub max_retry: u32,

    pub wait_to_retry_ms: u64,

    /// Connections older than this are replaced on release.
    pub max_age_secs: u64,

    /// Window in which a transient first failure is retried at once.
    pub fast_path_grace_ms: u64,

    /// Tries to get a lease from a saturated pool.
    pub acquire_retries: u32,

    pub acquire_backoff_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            address: "127.0.0.1:8080".to_string(),
            rpc_path: "/rpc".to_string(),
            timeout_ms: 5_000,
            max_connections: 10,
            max_retry: 3,
            wait_to_retry_ms: 100,
            max_age_secs: 600,
            fast_path_grace_ms: 10,
            acquire_retries: 10,
            acquire_backoff_ms: 10,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retry,
            wait: Duration::from_millis(self.wait_to_retry_ms),
            fast_path_grace: Duration::from_millis(self.fast_path_grace_ms),
            acquire_retries: self.acquire_retries,
            acquire_backoff: Duration::from_millis(self.acquire_backoff_ms),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Outbound wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// JSON envelopes over a persistent WebSocket at `rpc_path`.
    #[default]
    Rpc,
    /// One HTTP request per call, against the peer's routes.
    Http,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Rpc => "rpc",
            Protocol::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported protocol: {0} (expected rpc or http)")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rpc" | "ws" => Ok(Protocol::Rpc),
            "http" => Ok(Protocol::Http),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AdapterConfig = toml::from_str("[client]\naddress = \"peer:9000\"\n").unwrap();
        assert_eq!(config.client.address, "peer:9000");
        assert_eq!(config.client.max_connections, 10);
        assert_eq!(config.client.max_age(), Duration::from_secs(600));
        assert_eq!(config.server.rpc_path, "/rpc");
        assert_eq!(config.client.protocol, Protocol::Rpc);
    }

    #[test]
    fn test_protocol_selection() {
        let config: AdapterConfig = toml::from_str("[client]\nprotocol = \"http\"\n").unwrap();
        assert_eq!(config.client.protocol, Protocol::Http);
        assert!(toml::from_str::<AdapterConfig>("[client]\nprotocol = \"thrift\"\n").is_err());

        assert_eq!("HTTP".parse::<Protocol>(), Ok(Protocol::Http));
        assert_eq!("ws".parse::<Protocol>(), Ok(Protocol::Rpc));
        assert!("grpc".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let client = ClientConfig {
            max_retry: 5,
            wait_to_retry_ms: 250,
            fast_path_grace_ms: 20,
            ..ClientConfig::default()
        };
        let policy = client.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.wait, Duration::from_millis(250));
        assert_eq!(policy.fast_path_grace, Duration::from_millis(20));
        assert_eq!(policy.acquire_retries, 10);
    }
}
