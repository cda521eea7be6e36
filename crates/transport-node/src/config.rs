//! # Transport Configuration
//!
//! Timing, naming and network parameters for one transport context.
//!
//! Sources, lowest precedence first:
//! 1. [`TransportConfig::default`]
//! 2. A TOML document ([`TransportConfig::from_toml_str`], [`TransportConfig::from_file`])
//! 3. `TP_*` environment variables ([`TransportConfig::apply_env`])
//!
//! # Config File Format
//!
//! ```toml
//! partition = "lab"
//! hostname = "robot-1"
//!
//! [discovery]
//! heartbeat_interval_ms = 1000
//! silence_multiplier = 3
//! max_backoff_ms = 8000
//!
//! [network]
//! multicast_group = "239.255.0.7"
//! discovery_port = 11319
//! multicast_ttl = 1
//!
//! [service]
//! request_timeout_ms = 1000
//! ```

use serde::Deserialize;
use shared_net::udp::{DEFAULT_DISCOVERY_PORT, DEFAULT_MULTICAST_GROUP};
use shared_net::UdpConfig;
use shared_types::topic;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tp_01_discovery::DiscoveryConfig;
use tracing::warn;

/// Complete transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Interval between discovery sweeps.
    pub heartbeat_interval: Duration,
    /// Missed heartbeats before a silent process is expired.
    pub silence_multiplier: u32,
    /// Upper bound of the sweep delay while broadcasts fail.
    pub max_backoff: Duration,
    /// Default partition for nodes that do not set one.
    pub partition: String,
    /// Host name override used for scope checks.
    pub hostname: Option<String>,
    pub multicast_group: Ipv4Addr,
    pub discovery_port: u16,
    pub multicast_ttl: u32,
    /// Timeout used by requests that do not pass one.
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(1000),
            silence_multiplier: 3,
            max_backoff: Duration::from_millis(8000),
            partition: String::new(),
            hostname: None,
            multicast_group: DEFAULT_MULTICAST_GROUP,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            multicast_ttl: 1,
            request_timeout: Duration::from_millis(1000),
        }
    }
}

impl TransportConfig {
    /// Short timings for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(50),
            max_backoff: Duration::from_millis(400),
            request_timeout: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Defaults overridden by `TP_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TP_HEARTBEAT_MS`, `TP_SILENCE_MULTIPLIER`, `TP_MAX_BACKOFF_MS`
    /// - `TP_PARTITION`, `TP_HOSTNAME`
    /// - `TP_MULTICAST_GROUP`, `TP_DISCOVERY_PORT`, `TP_MULTICAST_TTL`
    /// - `TP_REQUEST_TIMEOUT_MS`
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Some(ms) = env_parse::<u64>("TP_HEARTBEAT_MS") {
            self.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(n) = env_parse("TP_SILENCE_MULTIPLIER") {
            self.silence_multiplier = n;
        }
        if let Some(ms) = env_parse::<u64>("TP_MAX_BACKOFF_MS") {
            self.max_backoff = Duration::from_millis(ms);
        }
        if let Ok(partition) = std::env::var("TP_PARTITION") {
            self.partition = partition;
        }
        if let Ok(hostname) = std::env::var("TP_HOSTNAME") {
            self.hostname = Some(hostname).filter(|h| !h.is_empty());
        }
        if let Some(group) = env_parse("TP_MULTICAST_GROUP") {
            self.multicast_group = group;
        }
        if let Some(port) = env_parse("TP_DISCOVERY_PORT") {
            self.discovery_port = port;
        }
        if let Some(ttl) = env_parse("TP_MULTICAST_TTL") {
            self.multicast_ttl = ttl;
        }
        if let Some(ms) = env_parse::<u64>("TP_REQUEST_TIMEOUT_MS") {
            self.request_timeout = Duration::from_millis(ms);
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string. Missing keys keep defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let defaults = Self::default();

        let discovery = file.discovery;
        let network = file.network;
        let config = Self {
            heartbeat_interval: discovery
                .heartbeat_interval_ms
                .map_or(defaults.heartbeat_interval, Duration::from_millis),
            silence_multiplier: discovery
                .silence_multiplier
                .unwrap_or(defaults.silence_multiplier),
            max_backoff: discovery
                .max_backoff_ms
                .map_or(defaults.max_backoff, Duration::from_millis),
            partition: file.partition.unwrap_or(defaults.partition),
            hostname: file.hostname.filter(|h| !h.is_empty()),
            multicast_group: network.multicast_group.unwrap_or(defaults.multicast_group),
            discovery_port: network.discovery_port.unwrap_or(defaults.discovery_port),
            multicast_ttl: network.multicast_ttl.unwrap_or(defaults.multicast_ttl),
            request_timeout: file
                .service
                .request_timeout_ms
                .map_or(defaults.request_timeout, Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the transport cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid("heartbeat interval must be positive".into()));
        }
        if self.silence_multiplier == 0 {
            return Err(ConfigError::Invalid("silence multiplier must be at least 1".into()));
        }
        if self.max_backoff < self.heartbeat_interval {
            return Err(ConfigError::Invalid(
                "max backoff must not be shorter than the heartbeat interval".into(),
            ));
        }
        if !topic::is_valid_partition(&self.partition) {
            return Err(ConfigError::Invalid(format!(
                "invalid partition {:?}",
                self.partition
            )));
        }
        if !self.multicast_group.is_multicast() {
            return Err(ConfigError::Invalid(format!(
                "{} is not a multicast group",
                self.multicast_group
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request timeout must be positive".into()));
        }
        Ok(())
    }

    /// Discovery timing derived from this configuration.
    #[must_use]
    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            heartbeat_interval: self.heartbeat_interval,
            silence_multiplier: self.silence_multiplier,
            max_backoff: self.max_backoff,
        }
    }

    /// UDP adapter settings derived from this configuration.
    #[must_use]
    pub fn udp(&self) -> UdpConfig {
        UdpConfig {
            multicast_group: self.multicast_group,
            discovery_port: self.discovery_port,
            multicast_ttl: self.multicast_ttl,
            host: self.hostname.clone(),
            ..UdpConfig::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key = key, value = %value, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    partition: Option<String>,
    hostname: Option<String>,
    #[serde(default)]
    discovery: DiscoveryFile,
    #[serde(default)]
    network: NetworkFile,
    #[serde(default)]
    service: ServiceFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DiscoveryFile {
    heartbeat_interval_ms: Option<u64>,
    silence_multiplier: Option<u32>,
    max_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct NetworkFile {
    multicast_group: Option<Ipv4Addr>,
    discovery_port: Option<u16>,
    multicast_ttl: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ServiceFile {
    request_timeout_ms: Option<u64>,
}

/// Errors that can occur during config loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TransportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.heartbeat_interval, Duration::from_millis(1000));
        assert_eq!(config.discovery().silence_timeout(), Duration::from_millis(3000));
        assert!(TransportConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_selected_fields() {
        let config = TransportConfig::from_toml_str(
            r#"
            partition = "lab"

            [discovery]
            heartbeat_interval_ms = 200
            max_backoff_ms = 1600

            [network]
            multicast_group = "239.255.1.1"
            "#,
        )
        .unwrap();

        assert_eq!(config.partition, "lab");
        assert_eq!(config.heartbeat_interval, Duration::from_millis(200));
        assert_eq!(config.silence_multiplier, 3);
        assert_eq!(config.multicast_group, Ipv4Addr::new(239, 255, 1, 1));
        assert_eq!(config.discovery_port, DEFAULT_DISCOVERY_PORT);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(
            TransportConfig::from_toml_str("").unwrap(),
            TransportConfig::default()
        );
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let err = TransportConfig::from_toml_str("heartbeat = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_failures() {
        let err = TransportConfig::from_toml_str("[network]\nmulticast_group = \"10.0.0.1\"")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = TransportConfig {
            partition: "bad partition".into(),
            ..TransportConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TransportConfig {
            max_backoff: Duration::from_millis(10),
            ..TransportConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TransportConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_udp_settings_follow_config() {
        let config = TransportConfig {
            hostname: Some("robot-1".into()),
            multicast_ttl: 4,
            ..TransportConfig::default()
        };
        let udp = config.udp();
        assert_eq!(udp.host.as_deref(), Some("robot-1"));
        assert_eq!(udp.multicast_ttl, 4);
        assert_eq!(udp.discovery_port, DEFAULT_DISCOVERY_PORT);
    }
}
