//! I/O configuration: modules, digital inputs/outputs and sensor inputs.
//!
//! Deserialized from the gateway TOML file at startup and immutable
//! afterwards. Runtime state (queues, tasks) lives in the `mqio` crate.

pub mod config;
