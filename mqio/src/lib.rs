//! # mqio Gateway Library
//!
//! Runtime core of the MQTT to GPIO/sensor gateway: inbound messages become
//! pin writes, input changes and sensor readings become outbound messages.
//!
//! # Module Structure
//!
//! - [`bridge`] - MQTT client seam, announcement, inbound loop, publishers
//! - [`events`] - In-process event bus
//! - [`output`] - Per-module output queues and timed pulses
//! - [`router`] - Inbound topic to output action
//! - [`sensor`] - Sensor poller
//! - [`server`] - Gateway startup and module lifecycle
//! - [`shutdown`] - Signal-driven two-phase shutdown
//! - [`supervisor`] - Tracked tasks and the reaper
//! - [`topics`] - Topic layout
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                               mqio                                │
//! │  broker ──► rx_loop ──► Router ──► OutputController ──► GpioModule│
//! │     ▲                                   │ (queue per module)      │
//! │     └──────────── publish ◄─────────────┘                         │
//! │     ▲                                                             │
//! │     └── publishers ◄── EventBus ◄── input / sensor pollers        │
//! │                                                                   │
//! │  TaskSupervisor: every task above, reaped every second            │
//! │  ShutdownCoordinator: signal → primaries → everything else        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod error;
pub mod events;
pub mod output;
pub mod router;
pub mod sensor;
pub mod server;
pub mod shutdown;
pub mod supervisor;
pub mod topics;

pub use crate::error::{BridgeError, GatewayError, TopicError};
pub use crate::server::{Gateway, ModuleSet};
