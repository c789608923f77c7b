//! System-wide constants for the mqio workspace.
//!
//! Single source of truth for topic segments and configuration defaults.

/// Topic segment under which outputs live: `<prefix>/output/<name>`.
pub const OUTPUT_TOPIC: &str = "output";

/// Topic segment under which inputs are published: `<prefix>/input/<name>`.
pub const INPUT_TOPIC: &str = "input";

/// Topic segment under which sensor readings are published: `<prefix>/sensor/<name>`.
pub const SENSOR_TOPIC: &str = "sensor";

/// Suffix of the "set immediately" request topic.
pub const SET_SUFFIX: &str = "set";

/// Suffix of the "turn on for N ms" request topic.
pub const SET_ON_MS_SUFFIX: &str = "set_on_ms";

/// Suffix of the "turn off for N ms" request topic.
pub const SET_OFF_MS_SUFFIX: &str = "set_off_ms";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mqio/config.toml";

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default topic prefix.
pub const DEFAULT_TOPIC_PREFIX: &str = "mqtt_io";

/// Prefix of the client id generated when none is configured.
pub const CLIENT_ID_PREFIX: &str = "mqtt-io";

/// Default digital input poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default sensor poll interval in seconds.
pub const DEFAULT_SENSOR_INTERVAL_SECS: f64 = 60.0;

/// Default number of decimals sensor values are rounded to.
pub const DEFAULT_SENSOR_DIGITS: u32 = 2;
