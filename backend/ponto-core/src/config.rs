// src/config.rs
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "PONTO_";

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    3000
}

fn default_app_id() -> String {
    "default-app-id".to_string()
}

fn default_identity_file() -> PathBuf {
    PathBuf::from("ponto_identity.json")
}

/// Runtime configuration read from `PONTO_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    // Server
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,

    // Storage; no data directory means local-only mode
    #[serde(default = "default_app_id")]
    pub app_id: String,
    pub data_dir: Option<PathBuf>,

    // Auth
    pub initial_auth_token: Option<String>,
    #[serde(default = "default_identity_file")]
    pub identity_file: PathBuf,

    // Report letterhead: file path or http(s) URL
    pub letterhead: Option<String>,
}

/// Certificate and key for serving over HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        let config = envy::prefixed(ENV_PREFIX).from_env::<AppConfig>()?;
        config.validate()
    }

    /// Same as `from_env` over an explicit set of variables.
    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(ENV_PREFIX).from_iter::<_, AppConfig>(vars)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.cert_path.is_some() != self.key_path.is_some() {
            return Err(ConfigError::PartialTls);
        }
        Ok(self)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn tls(&self) -> Option<TlsPaths> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert_path), Some(key_path)) => Some(TlsPaths {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        }
    }

    /// Blank strings count as unset.
    pub fn auth_token(&self) -> Option<&str> {
        self.initial_auth_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_iter(vars(&[])).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.app_id, "default-app-id");
        assert_eq!(config.identity_file, PathBuf::from("ponto_identity.json"));
        assert!(config.data_dir.is_none());
        assert!(config.tls().is_none());
        assert!(config.auth_token().is_none());
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = AppConfig::from_iter(vars(&[
            ("PONTO_HOST", "0.0.0.0"),
            ("PONTO_PORT", "8443"),
            ("PONTO_APP_ID", "caruaru"),
            ("PONTO_DATA_DIR", "/var/lib/ponto"),
            ("PONTO_INITIAL_AUTH_TOKEN", " abc "),
            ("PONTO_LETTERHEAD", "https://example.org/logo.png"),
            ("PONTO_CERT_PATH", "cert.pem"),
            ("PONTO_KEY_PATH", "key.pem"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8443");
        assert_eq!(config.app_id, "caruaru");
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/ponto")));
        assert_eq!(config.auth_token(), Some("abc"));
        assert_eq!(config.letterhead.as_deref(), Some("https://example.org/logo.png"));
        assert_eq!(
            config.tls(),
            Some(TlsPaths {
                cert_path: PathBuf::from("cert.pem"),
                key_path: PathBuf::from("key.pem"),
            })
        );
    }

    #[test]
    fn test_half_configured_tls_is_rejected() {
        let result = AppConfig::from_iter(vars(&[("PONTO_CERT_PATH", "cert.pem")]));
        assert!(matches!(result, Err(ConfigError::PartialTls)));
    }

    #[test]
    fn test_bad_port_is_an_env_error() {
        let result = AppConfig::from_iter(vars(&[("PONTO_PORT", "not-a-port")]));
        assert!(matches!(result, Err(ConfigError::Env(_))));
    }
}
