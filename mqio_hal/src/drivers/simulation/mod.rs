//! Simulation drivers.
//!
//! Software stand-ins for GPIO chips and sensors, used for development,
//! dry runs and tests without physical hardware.

mod gpio;
mod sensor;

pub use gpio::SimulatedGpio;
pub use sensor::SimulatedSensor;

use mqio_common::hal::driver::{GpioModule, ModuleError, SensorModule};
use mqio_common::io::config::ModuleConfig;
use std::sync::Arc;

/// Factory function to create a simulated GPIO module.
pub fn create_gpio(config: &ModuleConfig) -> Result<Arc<dyn GpioModule>, ModuleError> {
    Ok(Arc::new(SimulatedGpio::from_config(config)?))
}

/// Factory function to create a simulated sensor module.
pub fn create_sensor(config: &ModuleConfig) -> Result<Arc<dyn SensorModule>, ModuleError> {
    Ok(Arc::new(SimulatedSensor::from_config(config)?))
}
