//! Tracked-task registry and reaper.
//!
//! Every background unit of work (pollers, event handlers, pulses, output
//! workers, the MQTT event loop) is spawned through [`TaskSupervisor`] and
//! stays registered until it is reaped. The reaper turns failures that a
//! detached task would otherwise swallow into error logs; it never stops the
//! process.
//!
//! Two groups are kept apart:
//! - **primary** tasks (inbound loop, reaper) receive a [`CancellationToken`]
//!   and unwind cooperatively, so their finalizers run
//! - **tracked** tasks are simply aborted during shutdown
//!
//! ```text
//! spawn()/spawn_primary() ──► registry ──► reap() every REAP_INTERVAL
//!                                │             ├─ Ok      → dropped
//!                                │             ├─ Err     → error!
//!                                │             └─ panic   → error!
//!                                └──► shutdown: cancel primaries → abort rest
//! ```

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::GatewayError;

/// Interval between two reaper scans.
pub const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Interval at which shutdown polls for task completion.
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result every tracked task resolves to.
pub type TaskResult = Result<(), GatewayError>;

struct TrackedTask {
    name: String,
    handle: JoinHandle<TaskResult>,
}

/// Registry of every background task of the gateway.
pub struct TaskSupervisor {
    primaries: Mutex<Vec<TrackedTask>>,
    tasks: Mutex<Vec<TrackedTask>>,
    primary_token: CancellationToken,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self {
            primaries: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            primary_token: CancellationToken::new(),
        }
    }

    /// Token primary tasks watch to unwind.
    pub fn primary_token(&self) -> CancellationToken {
        self.primary_token.clone()
    }

    /// Spawn and register a tracked task.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let name = name.into();
        debug!("Spawning task '{name}'");
        let handle = tokio::spawn(future);
        self.tasks.lock().push(TrackedTask { name, handle });
    }

    /// Spawn and register a primary task. The future must return once
    /// [`primary_token`](Self::primary_token) is cancelled.
    pub fn spawn_primary<F>(&self, name: impl Into<String>, future: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let name = name.into();
        debug!("Spawning primary task '{name}'");
        let handle = tokio::spawn(future);
        self.primaries.lock().push(TrackedTask { name, handle });
    }

    /// Number of registered tracked (non-primary) tasks, finished or not.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered tasks, primary or not, that have not finished.
    pub fn pending(&self) -> usize {
        let running = |list: &Mutex<Vec<TrackedTask>>| {
            list.lock().iter().filter(|t| !t.handle.is_finished()).count()
        };
        running(&self.primaries) + running(&self.tasks)
    }

    /// Drop every finished task, logging failures. Returns the number of
    /// tasks removed.
    pub fn reap(&self) -> usize {
        let mut finished = take_finished(&self.primaries);
        finished.extend(take_finished(&self.tasks));
        let count = finished.len();
        finished.into_iter().for_each(report);
        if count > 0 {
            debug!("Reaped {count} finished task(s)");
        }
        count
    }

    /// Reaper loop; a primary task.
    pub async fn run_reaper(&self, cancel: CancellationToken) -> TaskResult {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.reap();
                }
            }
        }
        debug!("Reaper stopped");
        Ok(())
    }

    /// Cancel primary tasks and wait until each of them has returned.
    pub async fn cancel_primaries(&self) {
        self.primary_token.cancel();
        wait_finished(&self.primaries).await;
        take_finished(&self.primaries).into_iter().for_each(report);
    }

    /// Abort every tracked task still running and wait until each of them
    /// has finished. Returns the number of tasks aborted.
    pub async fn cancel_all(&self) -> usize {
        let count = {
            let tasks = self.tasks.lock();
            let running: Vec<_> = tasks.iter().filter(|t| !t.handle.is_finished()).collect();
            for task in &running {
                task.handle.abort();
            }
            running.len()
        };
        info!("Cancelling {count} task(s)");
        wait_finished(&self.tasks).await;
        take_finished(&self.tasks).into_iter().for_each(report);
        count
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn take_finished(list: &Mutex<Vec<TrackedTask>>) -> Vec<TrackedTask> {
    let mut tasks = list.lock();
    let (finished, running) = tasks.drain(..).partition(|t| t.handle.is_finished());
    *tasks = running;
    finished
}

async fn wait_finished(list: &Mutex<Vec<TrackedTask>>) {
    while list.lock().iter().any(|t| !t.handle.is_finished()) {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }
}

/// Log the outcome of a finished task.
fn report(task: TrackedTask) {
    let TrackedTask { name, handle } = task;
    // The handle is finished, so this resolves immediately.
    match handle.now_or_never() {
        Some(Ok(Ok(()))) | None => debug!("Task '{name}' finished"),
        Some(Ok(Err(e))) => error!("Task '{name}' failed: {e}"),
        Some(Err(e)) => report_join_error(&name, e),
    }
}

fn report_join_error(name: &str, e: JoinError) {
    if e.is_cancelled() {
        debug!("Task '{name}' cancelled");
    } else {
        error!("Task '{name}' panicked: {}", panic_message(e.into_panic().as_ref()));
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn reap_drops_finished_and_keeps_running() {
        let supervisor = TaskSupervisor::new();
        supervisor.spawn("ok", async { TaskResult::Ok(()) });
        supervisor.spawn("fails", async { TaskResult::Err(BridgeError::Closed.into()) });
        supervisor.spawn("panics", async {
            if true {
                panic!("boom");
            }
            TaskResult::Ok(())
        });
        supervisor.spawn("sleeps", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            TaskResult::Ok(())
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(supervisor.reap(), 3);
        assert_eq!(supervisor.len(), 1);
        assert_eq!(supervisor.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_runs_every_interval() {
        let supervisor = Arc::new(TaskSupervisor::new());
        let token = supervisor.primary_token();
        let reaper = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.run_reaper(token).await })
        };

        supervisor.spawn("short", async { TaskResult::Ok(()) });
        tokio::time::sleep(REAP_INTERVAL + Duration::from_millis(10)).await;
        assert!(supervisor.is_empty());

        supervisor.primary_token().cancel();
        reaper.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn primaries_unwind_before_returning() {
        let supervisor = TaskSupervisor::new();
        let finalized = Arc::new(AtomicBool::new(false));
        let token = supervisor.primary_token();
        let flag = finalized.clone();
        supervisor.spawn_primary("loop", async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(250)).await;
            flag.store(true, Ordering::SeqCst);
            TaskResult::Ok(())
        });

        supervisor.cancel_primaries().await;
        assert!(finalized.load(Ordering::SeqCst));
        assert_eq!(supervisor.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_leaves_nothing_pending() {
        let supervisor = TaskSupervisor::new();
        for i in 0..5 {
            supervisor.spawn(format!("forever-{i}"), async {
                futures::future::pending::<()>().await;
                TaskResult::Ok(())
            });
        }
        assert_eq!(supervisor.pending(), 5);

        assert_eq!(supervisor.cancel_all().await, 5);
        assert_eq!(supervisor.pending(), 0);
        assert!(supervisor.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_counts_only_running_tasks() {
        let supervisor = TaskSupervisor::new();
        supervisor.spawn("done-1", async { TaskResult::Ok(()) });
        supervisor.spawn("done-2", async { TaskResult::Ok(()) });
        for i in 0..3 {
            supervisor.spawn(format!("forever-{i}"), async {
                futures::future::pending::<()>().await;
                TaskResult::Ok(())
            });
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(supervisor.len(), 5);

        assert_eq!(supervisor.cancel_all().await, 3);
        assert!(supervisor.is_empty());
    }

    #[test]
    fn panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }
}
