//! Capability module traits and error types.
//!
//! This module defines:
//! - `GpioModule` trait - Pin-level interface for digital I/O drivers
//! - `SensorModule` trait - Value-level interface for sensor drivers
//! - `ModuleError` enum - Error types for module operations
//! - `GpioFactory` / `SensorFactory` - Factory function types

use crate::io::config::{DigitalInputConfig, DigitalOutputConfig, ModuleConfig, PullMode, SensorInputConfig};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Error types for capability module operations.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// No driver registered for the requested capability-kind tag
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Module or pin configuration rejected by the driver
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pin or sensor setup failed
    #[error("Setup failed: {0}")]
    SetupFailed(String),

    /// Hardware communication error
    #[error("I/O error on {target}: {reason}")]
    Io { target: String, reason: String },

    /// Cleanup failed
    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),
}

impl ModuleError {
    /// Shorthand for an I/O error.
    pub fn io(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Io {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinDirection {
    Input,
    Output,
}

/// Everything a driver needs to configure one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSetup {
    pub pin: u32,
    pub direction: PinDirection,
    pub pull: PullMode,
    /// Physical level to drive an output to during setup.
    pub initial: Option<bool>,
}

impl PinSetup {
    /// Setup for a digital input.
    pub fn input(config: &DigitalInputConfig) -> Self {
        Self {
            pin: config.pin,
            direction: PinDirection::Input,
            pull: config.pull_mode(),
            initial: None,
        }
    }

    /// Setup for a digital output.
    pub fn output(config: &DigitalOutputConfig) -> Self {
        Self {
            pin: config.pin,
            direction: PinDirection::Output,
            pull: PullMode::None,
            initial: config.initial.map(|level| level.is_high()),
        }
    }
}

/// Factory function type for creating GPIO module instances.
pub type GpioFactory = fn(&ModuleConfig) -> Result<Arc<dyn GpioModule>, ModuleError>;

/// Factory function type for creating sensor module instances.
pub type SensorFactory = fn(&ModuleConfig) -> Result<Arc<dyn SensorModule>, ModuleError>;

/// Pin-level capability interface.
///
/// One instance is shared by every input and output configured against
/// it. The gateway serialises output writes per instance; drivers only need
/// interior mutability, not their own write ordering.
///
/// # Lifecycle
///
/// 1. `setup_pin()` - Once per configured pin, before any I/O
/// 2. `set_pin()` / `get_pin()` - From output workers and input pollers
/// 3. `cleanup()` - Once, after the scheduler has stopped
#[async_trait]
pub trait GpioModule: Send + Sync {
    /// Returns the driver's capability-kind tag (e.g. "simulation").
    fn kind(&self) -> &'static str;

    /// Configure a pin's direction, pull resistor and initial level.
    fn setup_pin(&self, setup: &PinSetup) -> Result<(), ModuleError>;

    /// Drive an output pin to a physical level.
    async fn set_pin(&self, pin: u32, level: bool) -> Result<(), ModuleError>;

    /// Read the physical level of a pin.
    async fn get_pin(&self, pin: u32) -> Result<bool, ModuleError>;

    /// Release hardware resources.
    fn cleanup(&self) -> Result<(), ModuleError>;
}

/// Sensor-level capability interface.
#[async_trait]
pub trait SensorModule: Send + Sync {
    /// Returns the driver's capability-kind tag.
    fn kind(&self) -> &'static str;

    /// Prepare the module for reading one sensor input.
    fn setup_sensor(&self, config: &SensorInputConfig) -> Result<(), ModuleError>;

    /// Read a value. `Ok(None)` means "no reading this time".
    async fn get_value(&self, config: &SensorInputConfig) -> Result<Option<f64>, ModuleError>;

    /// Release hardware resources.
    fn cleanup(&self) -> Result<(), ModuleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::InitialLevel;

    #[test]
    fn test_module_error_display() {
        let err = ModuleError::DriverNotFound("ethercat".to_string());
        assert!(err.to_string().contains("ethercat"));

        let err = ModuleError::io("pin 17", "device busy");
        assert_eq!(err.to_string(), "I/O error on pin 17: device busy");
    }

    #[test]
    fn test_pin_setup_from_output() {
        let out: DigitalOutputConfig = toml::from_str(
            r#"
name = "relay1"
module = "gpio0"
pin = 17
initial = "high"
"#,
        )
        .unwrap();
        let setup = PinSetup::output(&out);
        assert_eq!(setup.direction, PinDirection::Output);
        assert_eq!(setup.initial, Some(true));
        assert_eq!(out.initial, Some(InitialLevel::High));
    }

    #[test]
    fn test_pin_setup_from_input() {
        let input: DigitalInputConfig = toml::from_str(
            r#"
name = "door"
module = "gpio0"
pin = 4
pullup = true
"#,
        )
        .unwrap();
        let setup = PinSetup::input(&input);
        assert_eq!(setup.direction, PinDirection::Input);
        assert_eq!(setup.pull, PullMode::Up);
        assert_eq!(setup.initial, None);
    }
}
