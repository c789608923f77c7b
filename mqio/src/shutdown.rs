//! Signal-driven graceful shutdown.
//!
//! ```text
//! SIGHUP | SIGTERM | SIGINT
//!         │
//!         ▼
//! 1. cancel primaries (rx loop, reaper) ── rx loop publishes "stopped", disconnects
//! 2. poll until primaries are done
//! 3. abort every other tracked task, poll until done
//! 4. return → scheduler stops → module cleanup
//! ```
//!
//! Further signals while a shutdown runs are logged and otherwise ignored.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::supervisor::TaskSupervisor;

/// Termination signals the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Hangup,
    Terminate,
    Interrupt,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hangup => write!(f, "SIGHUP"),
            Self::Terminate => write!(f, "SIGTERM"),
            Self::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Source of shutdown requests.
#[async_trait]
pub trait SignalSource: Send {
    /// Next signal; `None` once the source can produce no more.
    async fn next(&mut self) -> Option<ShutdownSignal>;
}

/// OS signal listeners for SIGHUP, SIGTERM and SIGINT.
pub struct Signals {
    hangup: Signal,
    terminate: Signal,
    interrupt: Signal,
}

impl Signals {
    /// Install the handlers. Must be called inside a runtime.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }
}

#[async_trait]
impl SignalSource for Signals {
    async fn next(&mut self) -> Option<ShutdownSignal> {
        tokio::select! {
            Some(()) = self.hangup.recv() => Some(ShutdownSignal::Hangup),
            Some(()) = self.terminate.recv() => Some(ShutdownSignal::Terminate),
            Some(()) = self.interrupt.recv() => Some(ShutdownSignal::Interrupt),
            else => None,
        }
    }
}

#[async_trait]
impl SignalSource for mpsc::UnboundedReceiver<ShutdownSignal> {
    async fn next(&mut self) -> Option<ShutdownSignal> {
        self.recv().await
    }
}

/// Runs the ordered shutdown of every supervised task.
pub struct ShutdownCoordinator {
    supervisor: Arc<TaskSupervisor>,
}

impl ShutdownCoordinator {
    pub fn new(supervisor: Arc<TaskSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Wait for the first signal, then shut down. Returns once every task
    /// has finished.
    pub async fn run<S: SignalSource>(&self, mut signals: S) {
        match signals.next().await {
            Some(sig) => warn!("Received exit signal {sig}"),
            None => warn!("Signal source closed, shutting down"),
        }

        let shutdown = self.shutdown();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                Some(sig) = signals.next() => {
                    info!("Received {sig} while shutting down, already in progress");
                }
            }
        }
    }

    /// Two-phase cancellation of every supervised task.
    pub async fn shutdown(&self) {
        info!("Waiting for main tasks to complete...");
        self.supervisor.cancel_primaries().await;

        let cancelled = self.supervisor.cancel_all().await;
        info!("All tasks finished ({cancelled} cancelled)");
    }
}
