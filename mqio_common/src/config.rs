//! Configuration loading traits and types.
//!
//! This module provides the standardized way the gateway loads its TOML
//! configuration file, plus the top-level [`GatewayConfig`] structure.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqio_common::config::{ConfigLoader, ConfigError, GatewayConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = GatewayConfig::load(Path::new("config.toml"))?;
//!     config.validate()?;
//!     println!("Prefix: {}", config.mqtt.topic_prefix);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consts::{DEFAULT_MQTT_PORT, DEFAULT_TOPIC_PREFIX};
use crate::io::config::{DigitalInputConfig, DigitalOutputConfig, ModuleConfig, SensorInputConfig};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

// ─── MQTT ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

fn default_keep_alive() -> u64 {
    10
}

fn default_status_topic() -> String {
    "status".to_string()
}

fn default_running() -> String {
    "running".to_string()
}

fn default_stopped() -> String {
    "stopped".to_string()
}

fn default_dead() -> String {
    "dead".to_string()
}

/// `[mqtt.tls]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// PEM file with the CA certificates to trust. System roots when absent.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// PEM client certificate.
    #[serde(default)]
    pub certfile: Option<PathBuf>,

    /// PEM client private key.
    #[serde(default)]
    pub keyfile: Option<PathBuf>,

    /// Accept any broker certificate and hostname.
    #[serde(default)]
    pub insecure: bool,
}

/// `[mqtt]` section: broker connection and status topic settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Client identifier. Derived from the topic prefix when absent.
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    #[serde(default)]
    pub clean_session: bool,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Status topic, relative to the prefix.
    #[serde(default = "default_status_topic")]
    pub status_topic: String,

    #[serde(default = "default_running")]
    pub status_payload_running: String,

    #[serde(default = "default_stopped")]
    pub status_payload_stopped: String,

    /// Published by the broker as our last will.
    #[serde(default = "default_dead")]
    pub status_payload_dead: String,

    #[serde(default)]
    pub tls: TlsConfig,
}

impl MqttConfig {
    /// Config with defaults for everything but the host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: None,
            password: None,
            client_id: None,
            topic_prefix: default_topic_prefix(),
            clean_session: false,
            keep_alive_secs: default_keep_alive(),
            status_topic: default_status_topic(),
            status_payload_running: default_running(),
            status_payload_stopped: default_stopped(),
            status_payload_dead: default_dead(),
            tls: TlsConfig::default(),
        }
    }

    /// Validate the section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `host` or `topic_prefix` is empty
    /// - `topic_prefix` contains MQTT wildcards or a trailing slash
    /// - only one of the TLS client certificate / key is given
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(invalid("mqtt.host cannot be empty"));
        }
        if self.topic_prefix.is_empty() {
            return Err(invalid("mqtt.topic_prefix cannot be empty"));
        }
        if self.topic_prefix.contains(['#', '+']) || self.topic_prefix.ends_with('/') {
            return Err(invalid(format!(
                "mqtt.topic_prefix {:?} must not contain wildcards or end with '/'",
                self.topic_prefix
            )));
        }
        if self.status_topic.is_empty() {
            return Err(invalid("mqtt.status_topic cannot be empty"));
        }
        if self.tls.certfile.is_some() != self.tls.keyfile.is_some() {
            return Err(invalid(
                "mqtt.tls.certfile and mqtt.tls.keyfile must be given together",
            ));
        }
        Ok(())
    }
}

// ─── Gateway ────────────────────────────────────────────────────────

/// Top-level gateway configuration.
///
/// # TOML Example
///
/// ```toml
/// [mqtt]
/// host = "localhost"
/// topic_prefix = "home/pi"
///
/// [[gpio_modules]]
/// name = "gpio0"
/// module = "simulation"
///
/// [[digital_outputs]]
/// name = "relay1"
/// module = "gpio0"
/// pin = 17
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    pub mqtt: MqttConfig,

    #[serde(default)]
    pub gpio_modules: Vec<ModuleConfig>,

    #[serde(default)]
    pub sensor_modules: Vec<ModuleConfig>,

    #[serde(default)]
    pub digital_inputs: Vec<DigitalInputConfig>,

    #[serde(default)]
    pub digital_outputs: Vec<DigitalOutputConfig>,

    #[serde(default)]
    pub sensor_inputs: Vec<SensorInputConfig>,
}

impl GatewayConfig {
    /// Validate the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` on the first violation found:
    /// empty or duplicate names, dangling module references, conflicting
    /// pull resistors, identical on/off payloads or a non-positive sensor
    /// interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.validate()?;

        let gpio = unique_names("gpio_modules", self.gpio_modules.iter().map(|m| &m.name))?;
        let sensors = unique_names("sensor_modules", self.sensor_modules.iter().map(|m| &m.name))?;
        unique_names("digital_inputs", self.digital_inputs.iter().map(|i| &i.name))?;
        unique_names("digital_outputs", self.digital_outputs.iter().map(|o| &o.name))?;
        unique_names("sensor_inputs", self.sensor_inputs.iter().map(|s| &s.name))?;

        for input in &self.digital_inputs {
            check_module_ref("digital input", &input.name, &input.module, &gpio)?;
            if input.pullup && input.pulldown {
                return Err(invalid(format!(
                    "digital input '{}' cannot enable both pullup and pulldown",
                    input.name
                )));
            }
            if input.poll_interval_ms == 0 {
                return Err(invalid(format!(
                    "digital input '{}' needs a poll_interval_ms above 0",
                    input.name
                )));
            }
            check_payloads("digital input", &input.name, &input.on_payload, &input.off_payload)?;
        }

        for output in &self.digital_outputs {
            check_module_ref("digital output", &output.name, &output.module, &gpio)?;
            check_payloads("digital output", &output.name, &output.on_payload, &output.off_payload)?;
            if output.name.contains(['/', '#', '+']) {
                return Err(invalid(format!(
                    "digital output name {:?} must not contain '/', '#' or '+'",
                    output.name
                )));
            }
        }

        for sensor in &self.sensor_inputs {
            check_module_ref("sensor input", &sensor.name, &sensor.module, &sensors)?;
            if !(sensor.interval_secs.is_finite() && sensor.interval_secs > 0.0) {
                return Err(invalid(format!(
                    "sensor input '{}' needs a positive interval_secs",
                    sensor.name
                )));
            }
        }

        Ok(())
    }
}

fn unique_names<'a>(
    section: &str,
    names: impl Iterator<Item = &'a String>,
) -> Result<HashSet<&'a str>, ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(invalid(format!("{section}: name cannot be empty")));
        }
        if !seen.insert(name.as_str()) {
            return Err(invalid(format!("{section}: duplicate name '{name}'")));
        }
    }
    Ok(seen)
}

fn check_module_ref(
    what: &str,
    name: &str,
    module: &str,
    known: &HashSet<&str>,
) -> Result<(), ConfigError> {
    if known.contains(module) {
        Ok(())
    } else {
        Err(invalid(format!("{what} '{name}' references unknown module '{module}'")))
    }
}

fn check_payloads(what: &str, name: &str, on: &str, off: &str) -> Result<(), ConfigError> {
    if on == off {
        return Err(invalid(format!(
            "{what} '{name}' has identical on and off payloads ({on:?})"
        )));
    }
    Ok(())
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[mqtt]
host = "localhost"
"#;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed = toml::from_str::<TestWrapper>(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, level);
        }
    }

    #[test]
    fn test_log_level_to_tracing() {
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
    }

    #[test]
    fn test_mqtt_defaults() {
        let config = GatewayConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.mqtt, MqttConfig::new("localhost"));
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic_prefix, "mqtt_io");
        assert_eq!(config.mqtt.status_payload_dead, "dead");
        assert!(!config.mqtt.tls.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefix_with_wildcard_rejected() {
        let mut mqtt = MqttConfig::new("localhost");
        mqtt.topic_prefix = "home/#".to_string();
        assert!(matches!(mqtt.validate(), Err(ConfigError::ValidationError(_))));

        mqtt.topic_prefix = "home/".to_string();
        assert!(mqtt.validate().is_err());
    }

    #[test]
    fn test_tls_cert_without_key_rejected() {
        let mut mqtt = MqttConfig::new("localhost");
        mqtt.tls.enabled = true;
        mqtt.tls.certfile = Some(PathBuf::from("/etc/mqio/client.pem"));
        assert!(mqtt.validate().is_err());

        mqtt.tls.keyfile = Some(PathBuf::from("/etc/mqio/client.key"));
        assert!(mqtt.validate().is_ok());
    }

    #[test]
    fn test_parse_error() {
        let result = GatewayConfig::parse("invalid toml {{{{");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
