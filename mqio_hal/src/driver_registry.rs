//! Module registry for capability drivers.
//!
//! Maps a capability-kind tag (the `module = "..."` key of a module entry)
//! to the factory that builds the driver. Built-in drivers are registered
//! explicitly at startup; nothing is resolved dynamically by name.

use mqio_common::hal::driver::{GpioFactory, GpioModule, ModuleError, SensorFactory, SensorModule};
use mqio_common::io::config::ModuleConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::drivers::register_all_drivers;

/// Registry of available GPIO and sensor drivers.
///
/// Constructed at startup, populated via `register_*()`, and passed to the
/// gateway by value. No global state.
pub struct ModuleRegistry {
    gpio: HashMap<&'static str, GpioFactory>,
    sensor: HashMap<&'static str, SensorFactory>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            gpio: HashMap::new(),
            sensor: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        register_all_drivers(&mut registry);
        registry
    }

    /// Register a GPIO driver factory.
    ///
    /// # Panics
    /// Panics if a GPIO driver with the same tag is already registered.
    pub fn register_gpio(&mut self, kind: &'static str, factory: GpioFactory) {
        if self.gpio.insert(kind, factory).is_some() {
            panic!("GPIO driver '{kind}' is already registered");
        }
    }

    /// Register a sensor driver factory.
    ///
    /// # Panics
    /// Panics if a sensor driver with the same tag is already registered.
    pub fn register_sensor(&mut self, kind: &'static str, factory: SensorFactory) {
        if self.sensor.insert(kind, factory).is_some() {
            panic!("Sensor driver '{kind}' is already registered");
        }
    }

    /// Create a GPIO module instance for a `[[gpio_modules]]` entry.
    ///
    /// # Errors
    /// Returns `ModuleError::DriverNotFound` if the tag is unknown, or the
    /// factory's own error if the module parameters are rejected.
    pub fn create_gpio(&self, config: &ModuleConfig) -> Result<Arc<dyn GpioModule>, ModuleError> {
        let factory = self
            .gpio
            .get(config.module.as_str())
            .ok_or_else(|| ModuleError::DriverNotFound(config.module.clone()))?;
        let module = factory(config)?;
        info!("Created GPIO module '{}' ({})", config.name, module.kind());
        Ok(module)
    }

    /// Create a sensor module instance for a `[[sensor_modules]]` entry.
    ///
    /// # Errors
    /// Same as [`ModuleRegistry::create_gpio`].
    pub fn create_sensor(
        &self,
        config: &ModuleConfig,
    ) -> Result<Arc<dyn SensorModule>, ModuleError> {
        let factory = self
            .sensor
            .get(config.module.as_str())
            .ok_or_else(|| ModuleError::DriverNotFound(config.module.clone()))?;
        let module = factory(config)?;
        info!("Created sensor module '{}' ({})", config.name, module.kind());
        Ok(module)
    }

    /// List registered GPIO driver tags.
    pub fn gpio_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.gpio.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// List registered sensor driver tags.
    pub fn sensor_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.sensor.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
