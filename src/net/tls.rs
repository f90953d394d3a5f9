//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;

use crate::config::HttpsConfig;

/// Load rustls material for the HTTPS listener from PEM files.
pub async fn load_tls_config(config: &HttpsConfig) -> Result<RustlsConfig, std::io::Error> {
    for (kind, path) in [
        ("certificate", &config.cert_path),
        ("private key", &config.key_path),
    ] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{kind} file not found: {}", path.display()),
            ));
        }
    }

    RustlsConfig::from_pem_file(&config.cert_path, &config.key_path).await
}
