//! Prelude module for common re-exports.
//!
//! ```rust
//! use mqio_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, GatewayConfig, MqttConfig, TlsConfig};
pub use crate::io::config::{
    DigitalInputConfig, DigitalOutputConfig, InitialLevel, ModuleConfig, PullMode,
    SensorInputConfig,
};

// ─── Capability modules ─────────────────────────────────────────────
pub use crate::hal::driver::{
    GpioFactory, GpioModule, ModuleError, PinDirection, PinSetup, SensorFactory, SensorModule,
};

// ─── Events ─────────────────────────────────────────────────────────
pub use crate::event::{Event, EventKind, EventSink};
