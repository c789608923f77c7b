//! Debounced digital input poller.
//!
//! One poller runs per configured digital input, as a tracked task of the
//! gateway. It never returns on its own: read errors are logged and polling
//! continues, so the task only ends when it is cancelled.

use mqio_common::event::{Event, EventSink};
use mqio_common::hal::driver::{GpioModule, ModuleError};
use mqio_common::io::config::DigitalInputConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

async fn read_logical(
    module: &dyn GpioModule,
    config: &DigitalInputConfig,
) -> Result<bool, ModuleError> {
    Ok(module.get_pin(config.pin).await? != config.inverted)
}

/// Poll one digital input and fire [`Event::InputChanged`] on every
/// debounced transition.
///
/// - The logical value is the physical level XOR `inverted`.
/// - The first successful read is reported immediately.
/// - A later change is reported only if a re-read after `debounce_ms`
///   still shows it; shorter glitches are dropped.
///
/// # Errors
/// Never returns `Err` in practice; the signature matches the other
/// tracked tasks.
pub async fn digital_input_poller(
    sink: Arc<dyn EventSink>,
    module: Arc<dyn GpioModule>,
    config: DigitalInputConfig,
) -> Result<(), ModuleError> {
    let interval = config.poll_interval();
    let debounce = config.debounce();
    let mut last: Option<bool> = None;

    info!(
        "Polling digital input '{}' (pin {}) every {:?}",
        config.name, config.pin, interval
    );

    loop {
        match read_logical(module.as_ref(), &config).await {
            Ok(value) if last != Some(value) => {
                let confirmed = if last.is_none() || debounce.is_zero() {
                    Some(value)
                } else {
                    tokio::time::sleep(debounce).await;
                    match read_logical(module.as_ref(), &config).await {
                        Ok(again) if again == value => Some(value),
                        Ok(_) => {
                            debug!("Digital input '{}' bounced, ignoring", config.name);
                            None
                        }
                        Err(e) => {
                            warn!("Digital input '{}' read failed: {e}", config.name);
                            None
                        }
                    }
                };

                if let Some(value) = confirmed {
                    last = Some(value);
                    info!(
                        "Digital input '{}' value changed to {value} ({})",
                        config.name,
                        config.payload(value)
                    );
                    sink.fire(Event::InputChanged {
                        input_name: config.name.clone(),
                        value,
                    });
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Digital input '{}' read failed: {e}", config.name),
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulatedGpio;
    use mqio_common::hal::driver::PinSetup;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<Event>>);

    impl EventSink for RecordingSink {
        fn fire(&self, event: Event) {
            self.0.lock().push(event);
        }
    }

    impl RecordingSink {
        fn values(&self) -> Vec<bool> {
            self.0
                .lock()
                .iter()
                .filter_map(|e| match e {
                    Event::InputChanged { value, .. } => Some(*value),
                    _ => None,
                })
                .collect()
        }
    }

    fn door(debounce_ms: u64, inverted: bool) -> DigitalInputConfig {
        let mut config: DigitalInputConfig =
            toml::from_str("name = \"door\"\nmodule = \"gpio0\"\npin = 4\n").unwrap();
        config.poll_interval_ms = 10;
        config.debounce_ms = debounce_ms;
        config.inverted = inverted;
        config
    }

    fn start(
        gpio: &Arc<SimulatedGpio>,
        config: DigitalInputConfig,
    ) -> (Arc<RecordingSink>, tokio::task::JoinHandle<Result<(), ModuleError>>) {
        gpio.setup_pin(&PinSetup::input(&config)).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let handle = tokio::spawn(digital_input_poller(
            sink.clone(),
            gpio.clone() as Arc<dyn GpioModule>,
            config,
        ));
        (sink, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn first_read_is_reported_immediately() {
        let gpio = Arc::new(SimulatedGpio::new());
        let (sink, handle) = start(&gpio, door(50, false));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(sink.values(), vec![false]);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn inverted_input_reports_logical_value() {
        let gpio = Arc::new(SimulatedGpio::new());
        let (sink, handle) = start(&gpio, door(0, true));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(sink.values(), vec![true]);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stable_change_is_reported_after_debounce() {
        let gpio = Arc::new(SimulatedGpio::new());
        let (sink, handle) = start(&gpio, door(50, false));
        tokio::time::sleep(Duration::from_millis(5)).await;

        gpio.set_input(4, true);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.values(), vec![false], "still inside the debounce window");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sink.values(), vec![false, true]);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn glitch_shorter_than_debounce_is_dropped() {
        let gpio = Arc::new(SimulatedGpio::new());
        let (sink, handle) = start(&gpio, door(50, false));
        tokio::time::sleep(Duration::from_millis(15)).await;

        gpio.set_input(4, true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        gpio.set_input(4, false);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(sink.values(), vec![false]);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn read_errors_do_not_stop_polling() {
        let gpio = Arc::new(SimulatedGpio::new());
        let sink = Arc::new(RecordingSink::default());
        // Pin never set up: every read fails.
        let handle = tokio::spawn(digital_input_poller(
            sink.clone(),
            gpio.clone() as Arc<dyn GpioModule>,
            door(0, false),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        assert!(sink.values().is_empty());
        handle.abort();
    }
}
