//! Bridge configuration, loaded once at startup.
//!
//! Holds the device identity, cloud API credentials and broker coordinates.
//! Read-only for the process lifetime; no other component mutates it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Broker port used when the configured host carries no explicit port.
pub const DEFAULT_BROKER_PORT: u16 = 8883;

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub device: DeviceSection,
    pub cloud: CloudSection,
    pub broker: BrokerSection,
}

/// Device identity used for cloud login and the broker client id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Stable client UUID; generated at load time when absent
    pub client_uuid: Option<String>,
    /// Account email used for the oauth/token exchange
    pub email: String,
    /// Account password
    pub password: String,
}

/// Cloud web API parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudSection {
    /// Web API host, e.g. "api.worxlandroid.com"
    pub api_host: String,
    /// OAuth client secret issued for this integration
    pub client_secret: String,
}

/// Broker connection parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker host, either bare ("commander-eu.example.com") or an mqtts:// URL
    pub host: String,
    /// Device topic prefix, e.g. "DB510/AABBCCDDEEFF"
    pub topic_prefix: String,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid broker host: {0}")]
    InvalidBrokerHost(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is an explicit [`ConfigError::Missing`], never a
    /// silent unconfigured start.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: BridgeConfig = toml::from_str(&content)?;

        validate_topic_prefix(&config.broker.topic_prefix)?;

        // A device UUID is part of the broker client id; mint one for
        // configurations that do not pin it.
        if config.device.client_uuid.is_none() {
            config.device.client_uuid = Some(Uuid::new_v4().to_string());
        }

        Ok(config)
    }

    /// The stable client UUID for this process.
    pub fn client_uuid(&self) -> &str {
        self.device
            .client_uuid
            .as_deref()
            .unwrap_or("00000000-0000-0000-0000-000000000000")
    }

    /// Resolve the broker endpoint as `(host, port)`. Accepts a bare host
    /// name or an `mqtts://` URL with an optional port.
    pub fn broker_endpoint(&self) -> Result<(String, u16), ConfigError> {
        let raw = &self.broker.host;
        if raw.contains("://") {
            let url =
                Url::parse(raw).map_err(|_| ConfigError::InvalidBrokerHost(raw.clone()))?;
            let host = url
                .host_str()
                .ok_or_else(|| ConfigError::InvalidBrokerHost(raw.clone()))?;
            Ok((host.to_string(), url.port().unwrap_or(DEFAULT_BROKER_PORT)))
        } else if raw.is_empty() {
            Err(ConfigError::InvalidBrokerHost(raw.clone()))
        } else {
            Ok((raw.clone(), DEFAULT_BROKER_PORT))
        }
    }
}

fn validate_topic_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "broker.topic_prefix must not be empty".to_string(),
        ));
    }
    if prefix.ends_with('/') {
        return Err(ConfigError::InvalidConfig(format!(
            "broker.topic_prefix '{prefix}' must not end with '/'"
        )));
    }
    Ok(())
}

/// Well-known file locations for the bridge's on-disk surfaces.
///
/// `cmdIn.json` and `cmdOut.json` are an external contract: other tools
/// drop pending commands into the first and read the last-received broker
/// payload from the second. Renaming them breaks those producers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgePaths {
    /// Persisted PKCS#12 client certificate; presence enables fast connect
    pub certificate: PathBuf,
    /// PEM root certificate the broker's chain is verified against
    pub trust_anchor: PathBuf,
    /// Pending-command mailbox written by external producers
    pub pending_command: PathBuf,
    /// Last-received raw broker payload, overwritten per message
    pub snapshot: PathBuf,
    /// Append-only telemetry CSV
    pub telemetry_log: PathBuf,
}

impl Default for BridgePaths {
    fn default() -> Self {
        Self {
            certificate: PathBuf::from("client.p12"),
            trust_anchor: PathBuf::from("ca.pem"),
            pending_command: PathBuf::from("cmdIn.json"),
            snapshot: PathBuf::from("cmdOut.json"),
            telemetry_log: PathBuf::from("telemetry.csv"),
        }
    }
}

impl BridgePaths {
    /// Override the telemetry log destination (the `-l` flag).
    pub fn with_telemetry_log(mut self, path: PathBuf) -> Self {
        self.telemetry_log = path;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_content: &str) -> BridgeConfig {
        toml::from_str(toml_content).unwrap()
    }

    const FULL_CONFIG: &str = r#"
[device]
client_uuid = "f47ac10b-58cc-4372-a567-0e02b2c3d479"
email = "owner@example.com"
password = "hunter2"

[cloud]
api_host = "api.example.com"
client_secret = "s3cret"

[broker]
host = "b.example"
topic_prefix = "DB510/AA"
"#;

    #[test]
    fn test_full_config_parses() {
        let config = parse(FULL_CONFIG);
        assert_eq!(config.device.email, "owner@example.com");
        assert_eq!(config.cloud.api_host, "api.example.com");
        assert_eq!(config.broker.topic_prefix, "DB510/AA");
        assert_eq!(
            config.client_uuid(),
            "f47ac10b-58cc-4372-a567-0e02b2c3d479"
        );
    }

    #[test]
    fn test_missing_file_is_explicit_error() {
        let result = BridgeConfig::load_from_file(Path::new("does/not/exist.toml"));
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_client_uuid_generated_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        let without_uuid = FULL_CONFIG.replace(
            "client_uuid = \"f47ac10b-58cc-4372-a567-0e02b2c3d479\"\n",
            "",
        );
        std::fs::write(&path, without_uuid).unwrap();

        let config = BridgeConfig::load_from_file(&path).unwrap();
        assert!(config.device.client_uuid.is_some());
        assert!(Uuid::parse_str(config.client_uuid()).is_ok());
    }

    #[test]
    fn test_broker_endpoint_bare_host() {
        let config = parse(FULL_CONFIG);
        let (host, port) = config.broker_endpoint().unwrap();
        assert_eq!(host, "b.example");
        assert_eq!(port, DEFAULT_BROKER_PORT);
    }

    #[test]
    fn test_broker_endpoint_url_form() {
        let mut config = parse(FULL_CONFIG);
        config.broker.host = "mqtts://commander-eu.example.com:8884".to_string();
        let (host, port) = config.broker_endpoint().unwrap();
        assert_eq!(host, "commander-eu.example.com");
        assert_eq!(port, 8884);
    }

    #[test]
    fn test_broker_endpoint_rejects_empty_host() {
        let mut config = parse(FULL_CONFIG);
        config.broker.host = String::new();
        assert!(matches!(
            config.broker_endpoint(),
            Err(ConfigError::InvalidBrokerHost(_))
        ));
    }

    #[test]
    fn test_topic_prefix_validation() {
        assert!(validate_topic_prefix("DB510/AA").is_ok());
        assert!(validate_topic_prefix("").is_err());
        assert!(validate_topic_prefix("DB510/AA/").is_err());
    }

    #[test]
    fn test_default_paths_preserve_external_names() {
        let paths = BridgePaths::default();
        assert_eq!(paths.pending_command, PathBuf::from("cmdIn.json"));
        assert_eq!(paths.snapshot, PathBuf::from("cmdOut.json"));
    }

    #[test]
    fn test_telemetry_log_override() {
        let paths = BridgePaths::default().with_telemetry_log(PathBuf::from("/tmp/m.csv"));
        assert_eq!(paths.telemetry_log, PathBuf::from("/tmp/m.csv"));
        assert_eq!(paths.certificate, PathBuf::from("client.p12"));
    }
}
