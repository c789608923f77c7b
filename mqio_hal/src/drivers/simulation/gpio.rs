//! Simulated GPIO chip.
//!
//! Keeps a pin bank in memory:
//! - Inputs idle at the level implied by their pull resistor
//! - Outputs start at their configured initial level
//! - Every output write is recorded in a write log
//!
//! Module parameters:
//! - `write_delay_ms` (optional) - Time each `set_pin` takes, to mimic slow buses

use async_trait::async_trait;
use mqio_common::hal::driver::{GpioModule, ModuleError, PinDirection, PinSetup};
use mqio_common::io::config::{ModuleConfig, PullMode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy)]
struct SimPin {
    direction: PinDirection,
    level: bool,
}

/// In-memory GPIO module.
#[derive(Debug, Default)]
pub struct SimulatedGpio {
    pins: Mutex<HashMap<u32, SimPin>>,
    writes: Mutex<Vec<(u32, bool)>>,
    write_delay: Duration,
}

impl SimulatedGpio {
    /// Create a simulated chip with instant writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a simulated chip where every write takes `delay`.
    pub fn with_write_delay(delay: Duration) -> Self {
        Self {
            write_delay: delay,
            ..Self::default()
        }
    }

    /// Build from a `[[gpio_modules]]` entry.
    pub fn from_config(config: &ModuleConfig) -> Result<Self, ModuleError> {
        let delay_ms = match config.params.get("write_delay_ms") {
            None => 0,
            Some(value) => value
                .as_integer()
                .and_then(|ms| u64::try_from(ms).ok())
                .ok_or_else(|| {
                    ModuleError::ConfigError(format!(
                        "module '{}': write_delay_ms must be a non-negative integer",
                        config.name
                    ))
                })?,
        };
        Ok(Self::with_write_delay(Duration::from_millis(delay_ms)))
    }

    /// Current physical level of a configured pin.
    pub fn level(&self, pin: u32) -> Option<bool> {
        self.pins.lock().get(&pin).map(|p| p.level)
    }

    /// Change the level seen on an input pin (simulates the outside world).
    pub fn set_input(&self, pin: u32, level: bool) {
        if let Some(p) = self.pins.lock().get_mut(&pin) {
            trace!("Simulated input pin {pin} -> {level}");
            p.level = level;
        }
    }

    /// Every output write so far, in order.
    pub fn writes(&self) -> Vec<(u32, bool)> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl GpioModule for SimulatedGpio {
    fn kind(&self) -> &'static str {
        "simulation"
    }

    fn setup_pin(&self, setup: &PinSetup) -> Result<(), ModuleError> {
        let level = match setup.direction {
            PinDirection::Input => setup.pull == PullMode::Up,
            PinDirection::Output => setup.initial.unwrap_or(false),
        };
        self.pins.lock().insert(
            setup.pin,
            SimPin {
                direction: setup.direction,
                level,
            },
        );
        debug!("Simulated pin {} set up as {:?} (level={level})", setup.pin, setup.direction);
        Ok(())
    }

    async fn set_pin(&self, pin: u32, level: bool) -> Result<(), ModuleError> {
        match self.pins.lock().get(&pin) {
            Some(p) if p.direction == PinDirection::Output => {}
            Some(_) => return Err(ModuleError::io(format!("pin {pin}"), "not an output")),
            None => return Err(ModuleError::io(format!("pin {pin}"), "not set up")),
        }

        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }

        if let Some(p) = self.pins.lock().get_mut(&pin) {
            p.level = level;
        }
        self.writes.lock().push((pin, level));
        Ok(())
    }

    async fn get_pin(&self, pin: u32) -> Result<bool, ModuleError> {
        self.level(pin)
            .ok_or_else(|| ModuleError::io(format!("pin {pin}"), "not set up"))
    }

    fn cleanup(&self) -> Result<(), ModuleError> {
        let count = self.pins.lock().drain().count();
        info!("Simulated GPIO released {count} pin(s)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(pin: u32, initial: Option<bool>) -> PinSetup {
        PinSetup {
            pin,
            direction: PinDirection::Output,
            pull: PullMode::None,
            initial,
        }
    }

    fn input(pin: u32, pull: PullMode) -> PinSetup {
        PinSetup {
            pin,
            direction: PinDirection::Input,
            pull,
            initial: None,
        }
    }

    #[tokio::test]
    async fn test_output_write_is_recorded() {
        let gpio = SimulatedGpio::new();
        gpio.setup_pin(&output(17, Some(true))).unwrap();
        assert_eq!(gpio.level(17), Some(true));

        gpio.set_pin(17, false).await.unwrap();
        assert_eq!(gpio.level(17), Some(false));
        assert_eq!(gpio.writes(), vec![(17, false)]);
    }

    #[tokio::test]
    async fn test_write_to_input_rejected() {
        let gpio = SimulatedGpio::new();
        gpio.setup_pin(&input(4, PullMode::None)).unwrap();
        assert!(gpio.set_pin(4, true).await.is_err());
        assert!(gpio.set_pin(5, true).await.is_err());
        assert!(gpio.writes().is_empty());
    }

    #[tokio::test]
    async fn test_input_follows_pull_and_simulation() {
        let gpio = SimulatedGpio::new();
        gpio.setup_pin(&input(4, PullMode::Up)).unwrap();
        gpio.setup_pin(&input(5, PullMode::Down)).unwrap();
        assert!(gpio.get_pin(4).await.unwrap());
        assert!(!gpio.get_pin(5).await.unwrap());

        gpio.set_input(5, true);
        assert!(gpio.get_pin(5).await.unwrap());
    }

    #[test]
    fn test_from_config_rejects_bad_delay() {
        let mut config = ModuleConfig::new("gpio0", "simulation");
        config
            .params
            .insert("write_delay_ms".to_string(), toml::Value::Integer(-5));
        assert!(matches!(
            SimulatedGpio::from_config(&config),
            Err(ModuleError::ConfigError(_))
        ));

        config
            .params
            .insert("write_delay_ms".to_string(), toml::Value::Integer(20));
        let gpio = SimulatedGpio::from_config(&config).unwrap();
        assert_eq!(gpio.write_delay, Duration::from_millis(20));
    }

    #[test]
    fn test_cleanup_releases_pins() {
        let gpio = SimulatedGpio::new();
        gpio.setup_pin(&output(1, None)).unwrap();
        gpio.cleanup().unwrap();
        assert_eq!(gpio.level(1), None);
    }
}
