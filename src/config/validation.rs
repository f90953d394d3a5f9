//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate bind addresses and TLS material paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{address}' for {listener}")]
    InvalidBindAddress { listener: &'static str, address: String },

    #[error("TLS {kind} file does not exist: {path}")]
    MissingTlsFile { kind: &'static str, path: String },

    #[error("static asset directory does not exist: {path}")]
    MissingStaticDir { path: String },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            listener: "http",
            address: config.listener.bind_address.clone(),
        });
    }

    if let Some(https) = &config.listener.https {
        if https.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress {
                listener: "https",
                address: https.bind_address.clone(),
            });
        }
        if !https.cert_path.exists() {
            errors.push(ValidationError::MissingTlsFile {
                kind: "certificate",
                path: https.cert_path.display().to_string(),
            });
        }
        if !https.key_path.exists() {
            errors.push(ValidationError::MissingTlsFile {
                kind: "private key",
                path: https.key_path.display().to_string(),
            });
        }
    }

    if let Some(dir) = &config.assets.static_dir {
        if !dir.is_dir() {
            errors.push(ValidationError::MissingStaticDir {
                path: dir.display().to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::HttpsConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn https_with_missing_material_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.https = Some(HttpsConfig {
            bind_address: "bogus".into(),
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
