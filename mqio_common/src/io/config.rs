//! I/O configuration structs.
//!
//! Each configured module, input, output and sensor input is one entry in
//! the corresponding TOML array. Module-specific parameters are kept as a
//! flattened TOML table and interpreted by the driver that owns them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::consts::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_SENSOR_DIGITS, DEFAULT_SENSOR_INTERVAL_SECS};

fn default_on_payload() -> String {
    "ON".to_string()
}

fn default_off_payload() -> String {
    "OFF".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_sensor_interval() -> f64 {
    DEFAULT_SENSOR_INTERVAL_SECS
}

fn default_sensor_digits() -> u32 {
    DEFAULT_SENSOR_DIGITS
}

// ─── Module ─────────────────────────────────────────────────────────

/// A capability module instance (`[[gpio_modules]]` / `[[sensor_modules]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Unique module name referenced by inputs, outputs and sensors.
    pub name: String,

    /// Capability-kind tag resolved through the module registry (e.g. "simulation").
    pub module: String,

    /// Module-specific parameters.
    #[serde(flatten)]
    pub params: toml::Table,
}

impl ModuleConfig {
    /// Create a module config without parameters.
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            params: toml::Table::new(),
        }
    }

    /// String parameter lookup.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(toml::Value::as_str)
    }
}

// ─── Pin enums ──────────────────────────────────────────────────────

/// Pull resistor mode of a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullMode {
    #[default]
    None,
    Up,
    Down,
}

/// Physical level an output pin is driven to during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialLevel {
    #[default]
    Low,
    High,
}

impl InitialLevel {
    /// Physical pin level.
    pub fn is_high(self) -> bool {
        self == Self::High
    }
}

// ─── Digital input ──────────────────────────────────────────────────

/// A polled digital input (`[[digital_inputs]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalInputConfig {
    /// Unique input name, used as the last topic segment.
    pub name: String,

    /// Name of the owning GPIO module.
    pub module: String,

    /// Pin identifier on the owning module.
    pub pin: u32,

    /// Payload published when the input becomes active.
    #[serde(default = "default_on_payload")]
    pub on_payload: String,

    /// Payload published when the input becomes inactive.
    #[serde(default = "default_off_payload")]
    pub off_payload: String,

    /// Enable the pull-up resistor.
    #[serde(default)]
    pub pullup: bool,

    /// Enable the pull-down resistor.
    #[serde(default)]
    pub pulldown: bool,

    /// Treat a low physical level as active.
    #[serde(default)]
    pub inverted: bool,

    /// Publish state changes as retained messages.
    #[serde(default = "default_true")]
    pub retain: bool,

    /// Poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// A change must persist this long (ms) before it is reported. 0 = off.
    #[serde(default)]
    pub debounce_ms: u64,
}

impl DigitalInputConfig {
    /// Pull resistor mode derived from the `pullup` / `pulldown` flags.
    pub fn pull_mode(&self) -> PullMode {
        if self.pullup {
            PullMode::Up
        } else if self.pulldown {
            PullMode::Down
        } else {
            PullMode::None
        }
    }

    /// Payload for a logical value.
    pub fn payload(&self, value: bool) -> &str {
        if value { self.on_payload.as_str() } else { self.off_payload.as_str() }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ─── Digital output ─────────────────────────────────────────────────

/// A digital output (`[[digital_outputs]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalOutputConfig {
    /// Unique output name, used as the topic segment after `output/`.
    pub name: String,

    /// Name of the owning GPIO module.
    pub module: String,

    /// Pin identifier on the owning module.
    pub pin: u32,

    /// Payload meaning "on".
    #[serde(default = "default_on_payload")]
    pub on_payload: String,

    /// Payload meaning "off".
    #[serde(default = "default_off_payload")]
    pub off_payload: String,

    /// Drive the pin low for "on".
    #[serde(default)]
    pub inverted: bool,

    /// Physical level applied during pin setup.
    #[serde(default)]
    pub initial: Option<InitialLevel>,

    /// Publish the initial state right after connecting.
    #[serde(default)]
    pub publish_initial: bool,

    /// Publish state confirmations as retained messages.
    #[serde(default)]
    pub retain: bool,
}

impl DigitalOutputConfig {
    /// Payload for a logical value.
    pub fn payload(&self, value: bool) -> &str {
        if value { self.on_payload.as_str() } else { self.off_payload.as_str() }
    }

    /// Map a payload to its logical value. `None` for anything that is
    /// neither the on- nor the off-payload.
    pub fn value_for_payload(&self, payload: &str) -> Option<bool> {
        if payload == self.on_payload {
            Some(true)
        } else if payload == self.off_payload {
            Some(false)
        } else {
            None
        }
    }

    /// Physical pin level for a logical value.
    #[inline]
    pub fn pin_level(&self, value: bool) -> bool {
        value != self.inverted
    }

    /// Payload describing the state the pin was set up with.
    pub fn initial_payload(&self) -> &str {
        let high = self.initial.unwrap_or_default().is_high();
        self.payload(high != self.inverted)
    }
}

// ─── Sensor input ───────────────────────────────────────────────────

/// A periodically read sensor value (`[[sensor_inputs]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInputConfig {
    /// Unique sensor input name, used as the last topic segment.
    pub name: String,

    /// Name of the owning sensor module.
    pub module: String,

    /// Seconds between two reads.
    #[serde(default = "default_sensor_interval")]
    pub interval_secs: f64,

    /// Decimals the value is rounded to before publishing.
    #[serde(default = "default_sensor_digits")]
    pub digits: u32,

    /// Publish readings as retained messages.
    #[serde(default)]
    pub retain: bool,

    /// Sensor-specific parameters.
    #[serde(flatten)]
    pub params: toml::Table,
}

impl SensorInputConfig {
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(Duration::ZERO)
    }

    /// String parameter lookup.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(toml::Value::as_str)
    }

    /// Float parameter lookup, accepting integers too.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        match self.params.get(key)? {
            toml::Value::Float(f) => Some(*f),
            toml::Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Round a raw reading to the configured number of decimals.
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.digits as i32);
        (value * factor).round() / factor
    }

    /// Render a reading the way it is published.
    pub fn format_value(&self, value: f64) -> String {
        format!("{:.*}", self.digits as usize, self.round(value))
    }
}
