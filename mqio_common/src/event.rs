//! Domain events fired by pollers.
//!
//! Events are created by the digital input poller and the sensor poller,
//! dispatched once by the event bus and never persisted.

use std::fmt;

/// A domain event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A digital input reached a new (debounced) logical value.
    InputChanged {
        input_name: String,
        value: bool,
    },
    /// A sensor input produced a rounded reading.
    SensorRead {
        sensor_name: String,
        value: f64,
    },
}

impl Event {
    /// Tag used for subscriptions.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::InputChanged { .. } => EventKind::InputChanged,
            Self::SensorRead { .. } => EventKind::SensorRead,
        }
    }
}

/// Event variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    InputChanged,
    SensorRead,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputChanged => write!(f, "input_changed"),
            Self::SensorRead => write!(f, "sensor_read"),
        }
    }
}

/// Destination for fired events.
///
/// `fire` must not block and must not wait for handlers to run.
pub trait EventSink: Send + Sync {
    fn fire(&self, event: Event);
}
