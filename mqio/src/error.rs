//! Error types of the gateway core.

use mqio_common::config::ConfigError;
use mqio_common::hal::driver::ModuleError;
use thiserror::Error;

/// Errors from the MQTT side of the gateway.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Initial connection could not be established.
    #[error("Connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// Certificate or key material could not be loaded.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The client library rejected a request.
    #[error("MQTT client error: {0}")]
    Client(String),

    /// A request did not complete in time.
    #[error("MQTT {0} timed out")]
    Timeout(&'static str),

    /// The connection is gone.
    #[error("MQTT connection closed")]
    Closed,
}

/// Structural mismatch of an inbound topic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Topic {topic:?} does not match '{expected}<name>/<suffix>'")]
pub struct TopicError {
    pub topic: String,
    pub expected: String,
}

/// Top-level error of the gateway and of every tracked task.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A module named by an input, output or sensor was never created.
    #[error("Module '{0}' is not configured")]
    UnknownModule(String),

    /// The per-module output worker is no longer running.
    #[error("Output queue of module '{0}' is closed")]
    QueueClosed(String),

    /// Runtime or signal handler setup failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
