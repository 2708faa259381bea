//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::path::Path;

/// Load TLS configuration from PEM certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    for (kind, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{kind} file not found: {}", path.display()),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}
