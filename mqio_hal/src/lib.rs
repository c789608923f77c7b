//! # mqio HAL Library
//!
//! Capability module layer of the gateway: turns `[[gpio_modules]]` and
//! `[[sensor_modules]]` entries into driver instances and polls digital
//! inputs on top of them.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Capability-kind tag to factory registration
//! - [`drivers`] - Built-in GPIO and sensor drivers
//! - [`poller`] - Debounced digital input poller
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          mqio_hal                            │
//! │  ┌────────────────┐    ┌──────────────┐    ┌──────────────┐  │
//! │  │ ModuleRegistry │───►│  GpioModule  │◄───│ input poller │  │
//! │  │  (factories)   │    │ SensorModule │    └──────┬───────┘  │
//! │  └────────────────┘    └──────────────┘           │          │
//! │                                                   ▼          │
//! │                                          EventSink (mqio)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;
pub mod poller;

// Re-export key types for convenience
pub use crate::driver_registry::ModuleRegistry;
pub use crate::poller::digital_input_poller;
