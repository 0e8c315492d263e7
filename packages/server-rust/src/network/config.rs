//! Network configuration types for the Piscola server.

use std::path::PathBuf;
use std::time::Duration;

/// Listen address used when none is given.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9090";

/// Errors from parsing network configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("listen address {addr:?} is not of the form host:port")]
    MissingPort { addr: String },
    #[error("invalid port in listen address {addr:?}")]
    InvalidPort {
        addr: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9090,
            tls: None,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl NetworkConfig {
    /// Builds a config listening on `addr` (`host:port`), other fields default.
    ///
    /// An empty host (`":9090"`) binds all interfaces. IPv6 hosts may be
    /// bracketed (`"[::1]:9090"`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `addr` has no port or the port is not a
    /// valid `u16`.
    pub fn from_listen_addr(addr: &str) -> Result<Self, ConfigError> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::MissingPort {
                addr: addr.to_string(),
            })?;
        let port = port.parse().map_err(|source| ConfigError::InvalidPort {
            addr: addr.to_string(),
            source,
        })?;
        let host = match host.trim_start_matches('[').trim_end_matches(']') {
            "" => "0.0.0.0",
            h => h,
        };
        Ok(Self {
            host: host.to_string(),
            port,
            ..Self::default()
        })
    }

    /// `host:port` string suitable for binding.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// TLS certificate configuration.
///
/// No `Default` impl because certificate paths have no sensible defaults.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file.
    pub cert_path: PathBuf,
    /// Path to the TLS private key file.
    pub key_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.bind_addr(), DEFAULT_LISTEN_ADDR);
        assert!(config.tls.is_none());
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn parses_listen_addresses() {
        let config = NetworkConfig::from_listen_addr("10.0.0.1:8080").unwrap();
        assert_eq!((config.host.as_str(), config.port), ("10.0.0.1", 8080));

        let config = NetworkConfig::from_listen_addr(":9191").unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9191");

        let config = NetworkConfig::from_listen_addr("[::1]:0").unwrap();
        assert_eq!(config.host, "::1");
        assert_eq!(config.bind_addr(), "[::1]:0");
    }

    #[test]
    fn rejects_bad_listen_addresses() {
        assert!(matches!(
            NetworkConfig::from_listen_addr("localhost"),
            Err(ConfigError::MissingPort { .. })
        ));
        let err = NetworkConfig::from_listen_addr("localhost:http").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
        assert!(err.to_string().contains("localhost:http"));
        assert!(NetworkConfig::from_listen_addr("localhost:70000").is_err());
    }
}
