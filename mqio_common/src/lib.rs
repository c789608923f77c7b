//! mqio Common Library
//!
//! This crate provides the shared configuration types, capability traits and
//! domain events for all mqio workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and the gateway configuration
//! - [`io`] - Module, input, output and sensor configuration types
//! - [`hal`] - Capability module traits (`GpioModule`, `SensorModule`) and errors
//! - [`event`] - Domain events fired by pollers and the `EventSink` seam
//! - [`consts`] - Topic segments and default values
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use mqio_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod event;
pub mod hal;
pub mod io;
pub mod prelude;
