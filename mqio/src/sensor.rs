//! Sensor poller.

use mqio_common::event::{Event, EventSink};
use mqio_common::hal::driver::SensorModule;
use mqio_common::io::config::SensorInputConfig;
use std::sync::Arc;
use tracing::{info, warn};

use crate::supervisor::TaskResult;

/// Read one sensor input every `interval_secs` and fire
/// [`Event::SensorRead`] with the rounded value. Reads that yield no value
/// are skipped; read errors are logged and polling continues.
pub async fn sensor_poller(
    sink: Arc<dyn EventSink>,
    module: Arc<dyn SensorModule>,
    config: SensorInputConfig,
) -> TaskResult {
    let interval = config.interval();
    loop {
        match module.get_value(&config).await {
            Ok(Some(raw)) => {
                let value = config.round(raw);
                info!("Read sensor '{}' value of {}", config.name, config.format_value(value));
                sink.fire(Event::SensorRead {
                    sensor_name: config.name.clone(),
                    value,
                });
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read sensor '{}': {e}", config.name),
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqio_hal::drivers::simulation::SimulatedSensor;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Event>>);

    impl EventSink for Recorder {
        fn fire(&self, event: Event) {
            self.0.lock().push(event);
        }
    }

    fn sensor(toml_src: &str) -> SensorInputConfig {
        toml::from_str(toml_src).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn fires_rounded_value_every_interval() {
        let config = sensor("name = \"cpu\"\nmodule = \"sim\"\ninterval_secs = 2\ndigits = 1\nvalue = 41.26\n");
        let recorder = Arc::new(Recorder::default());
        let handle = tokio::spawn(sensor_poller(
            recorder.clone(),
            Arc::new(SimulatedSensor::new(None)),
            config,
        ));

        tokio::time::sleep(Duration::from_millis(4100)).await;
        let events = recorder.0.lock().clone();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            Event::SensorRead {
                sensor_name: "cpu".to_string(),
                value: 41.3
            }
        );
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn no_reading_fires_nothing() {
        let config = sensor("name = \"cpu\"\nmodule = \"sim\"\ninterval_secs = 1\n");
        let recorder = Arc::new(Recorder::default());
        let handle = tokio::spawn(sensor_poller(
            recorder.clone(),
            Arc::new(SimulatedSensor::new(None)),
            config,
        ));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(recorder.0.lock().is_empty());
        assert!(!handle.is_finished());
        handle.abort();
    }
}
