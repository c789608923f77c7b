//! Built-in capability drivers.
//!
//! - [`simulation`] - In-memory GPIO and sensor drivers for development and testing
//! - [`sysfs`] - Linux `/sys/class/gpio` GPIO driver
//! - [`file`] - Sensor driver reading a numeric value from a file
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `GpioModule` or `SensorModule` from `mqio_common::hal::driver`
//! 3. Register its factory in [`register_all_drivers`]

pub mod file;
pub mod simulation;
pub mod sysfs;

use crate::driver_registry::ModuleRegistry;

/// Register every built-in driver.
pub fn register_all_drivers(registry: &mut ModuleRegistry) {
    registry.register_gpio("simulation", simulation::create_gpio);
    registry.register_gpio("sysfs", sysfs::create_driver);

    registry.register_sensor("simulation", simulation::create_sensor);
    registry.register_sensor("file", file::create_driver);
}
