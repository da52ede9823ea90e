use crate::error::EstResult;
use config::{Config, ConfigError, Environment, File};
use estca_types::{Curve, SignatureAlgorithm};
use serde::Deserialize;
use std::time::Duration;

/// Default upper bound on a single response, in bytes.
pub const DEFAULT_RESPONSE_LIMIT: usize = 2048;

/// CA server location
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8443
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Per-call session limits.
///
/// Timeouts of `None` block indefinitely on a stalled peer.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Upper bound on the bytes read for one response
    #[serde(default = "default_response_limit")]
    pub response_limit: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: Option<u64>,
    /// Read and write timeout on the established connection
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: Option<u64>,
}

fn default_response_limit() -> usize {
    DEFAULT_RESPONSE_LIMIT
}

fn default_connect_timeout_secs() -> Option<u64> {
    Some(10)
}

fn default_io_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_limit: default_response_limit(),
            connect_timeout_secs: default_connect_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_secs.map(Duration::from_secs)
    }
}

/// Defaults for end-entity enrollment
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EnrollmentConfig {
    #[serde(default)]
    pub curve: Curve,
    #[serde(default)]
    pub signature_algorithm: SignatureAlgorithm,
}

/// Root client configuration
///
/// Secrets are never part of this; they are supplied per call.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
}

impl ClientConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> EstResult<Self> {
        let config: ClientConfig = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., ESTCA_SERVER__HOST, ESTCA_SESSION__RESPONSE_LIMIT
            .add_source(
                Environment::with_prefix("ESTCA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which every call would fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Message("server.host must not be empty".into()));
        }
        if self.session.response_limit == 0 {
            return Err(ConfigError::Message(
                "session.response_limit must be greater than zero".into(),
            ));
        }
        if self.session.connect_timeout_secs == Some(0) {
            return Err(ConfigError::Message(
                "session.connect_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.session.io_timeout_secs == Some(0) {
            return Err(ConfigError::Message(
                "session.io_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, EstError};
    use config::FileFormat;

    fn from_toml(toml: &str) -> ClientConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.session.response_limit, 2048);
        assert_eq!(config.session.connect_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.enrollment.curve, Curve::P256);
        assert_eq!(
            config.enrollment.signature_algorithm,
            SignatureAlgorithm::EcdsaSha256
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [server]
            host = "ca.example.com"

            [session]
            response_limit = 8192

            [enrollment]
            curve = "p384"
        "#;
        let config = from_toml(toml);

        assert!(config.validate().is_ok());
        assert_eq!(config.server.host, "ca.example.com");
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.session.response_limit, 8192);
        assert_eq!(config.session.io_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.enrollment.curve, Curve::P384);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        for toml in [
            "[session]\nresponse_limit = 0",
            "[session]\nconnect_timeout_secs = 0",
            "[session]\nio_timeout_secs = 0",
            "[server]\nhost = \"\"",
        ] {
            let err = from_toml(toml).validate().unwrap_err();
            assert_eq!(EstError::from(err).kind(), ErrorKind::Config, "config {}", toml);
        }
        assert!(ClientConfig::default().validate().is_ok());
    }
}
