//! In-process event bus.
//!
//! `subscribe` registers an async handler for one [`EventKind`]; `fire`
//! hands the event to every matching handler and returns at once.
//!
//! Each subscriber owns an unbounded queue drained by its own tracked task,
//! so a handler sees events in firing order, a slow handler never delays the
//! firer, and a failing or panicking handler is logged without affecting the
//! others.

use futures::FutureExt;
use mqio_common::event::{Event, EventKind, EventSink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::supervisor::{TaskResult, TaskSupervisor, panic_message};

struct Subscriber {
    name: String,
    tx: mpsc::UnboundedSender<Event>,
}

/// Publish/subscribe dispatcher for domain events.
pub struct EventBus {
    supervisor: Arc<TaskSupervisor>,
    subscribers: Mutex<HashMap<EventKind, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new(supervisor: Arc<TaskSupervisor>) -> Self {
        Self {
            supervisor,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register `handler` for every event of `kind`.
    ///
    /// `name` identifies the handler in logs and in the task registry.
    pub fn subscribe<F, Fut>(&self, kind: EventKind, name: impl Into<String>, handler: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let task_name = format!("event:{kind}:{name}");
        let handler_name = name.clone();

        self.supervisor.spawn(task_name, async move {
            while let Some(event) = rx.recv().await {
                match AssertUnwindSafe(handler(event)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Event handler '{handler_name}' failed: {e}"),
                    Err(payload) => error!(
                        "Event handler '{handler_name}' panicked: {}",
                        panic_message(payload.as_ref())
                    ),
                }
            }
            Ok(())
        });

        debug!("Subscribed '{name}' to {kind} events");
        self.subscribers
            .lock()
            .entry(kind)
            .or_default()
            .push(Subscriber { name, tx });
    }

    /// Number of handlers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Dispatch `event` to its subscribers without waiting for them.
    pub fn fire(&self, event: Event) {
        let kind = event.kind();
        let subscribers = self.subscribers.lock();
        let Some(list) = subscribers.get(&kind) else {
            trace!("No subscriber for {kind} event");
            return;
        };
        for subscriber in list {
            if subscriber.tx.send(event.clone()).is_err() {
                debug!("Handler '{}' is gone, dropping {kind} event", subscriber.name);
            }
        }
    }
}

impl EventSink for EventBus {
    fn fire(&self, event: Event) {
        EventBus::fire(self, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::time::Duration;

    fn input(value: bool) -> Event {
        Event::InputChanged {
            input_name: "door".to_string(),
            value,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn handler_sees_events_in_firing_order() {
        let bus = EventBus::new(Arc::new(TaskSupervisor::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(EventKind::InputChanged, "recorder", move |event| {
            let sink = sink.clone();
            async move {
                // Later events must still queue behind this one.
                tokio::time::sleep(Duration::from_millis(10)).await;
                sink.lock().push(event);
                Ok(())
            }
        });

        bus.fire(input(true));
        bus.fire(input(false));
        bus.fire(input(true));
        assert!(seen.lock().is_empty(), "fire must not run handlers inline");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*seen.lock(), vec![input(true), input(false), input(true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_handlers_do_not_affect_others() {
        let supervisor = Arc::new(TaskSupervisor::new());
        let bus = EventBus::new(supervisor.clone());
        let count = Arc::new(Mutex::new(0));

        bus.subscribe(EventKind::InputChanged, "fails", |_| async {
            Err(BridgeError::Closed.into())
        });
        bus.subscribe(EventKind::InputChanged, "panics", |_| async {
            if true {
                panic!("handler bug");
            }
            Ok(())
        });
        let counter = count.clone();
        bus.subscribe(EventKind::InputChanged, "counts", move |_| {
            let counter = counter.clone();
            async move {
                *counter.lock() += 1;
                Ok(())
            }
        });
        assert_eq!(bus.subscriber_count(EventKind::InputChanged), 3);

        bus.fire(input(true));
        bus.fire(input(false));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*count.lock(), 2);
        // All three drain loops survive their handler's failures.
        assert_eq!(supervisor.pending(), 3);
    }

    #[tokio::test]
    async fn only_matching_kind_is_dispatched() {
        let bus = EventBus::new(Arc::new(TaskSupervisor::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(EventKind::SensorRead, "sensor", move |event| {
            let sink = sink.clone();
            async move {
                sink.lock().push(event);
                Ok(())
            }
        });

        bus.fire(input(true));
        bus.fire(Event::SensorRead {
            sensor_name: "cpu".to_string(),
            value: 41.5,
        });
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].kind(), EventKind::SensorRead);
    }
}
