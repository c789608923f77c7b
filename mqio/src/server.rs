//! Gateway orchestration.
//!
//! Startup order:
//! 1. create capability modules ([`ModuleSet::from_config`])
//! 2. set up output pins ([`Gateway::setup_outputs`])
//! 3. connect (caller supplies the [`MqttClient`])
//! 4. start output workers, announce, set up inputs and sensors, spawn
//!    the primary tasks ([`Gateway::start`])
//! 5. wait for a signal and shut down ([`Gateway::run`])
//! 6. once the scheduler has stopped, [`ModuleSet::cleanup`]

use mqio_common::config::GatewayConfig;
use mqio_common::event::EventSink;
use mqio_common::hal::driver::{GpioModule, PinSetup, SensorModule};
use mqio_hal::{ModuleRegistry, digital_input_poller};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::bridge::{self, MqttClient, StatusTopic};
use crate::error::GatewayError;
use crate::events::EventBus;
use crate::output::OutputController;
use crate::router::Router;
use crate::sensor::sensor_poller;
use crate::shutdown::{ShutdownCoordinator, SignalSource};
use crate::supervisor::TaskSupervisor;

/// Every capability module instance, keyed by configured name.
#[derive(Default)]
pub struct ModuleSet {
    pub gpio: HashMap<String, Arc<dyn GpioModule>>,
    pub sensor: HashMap<String, Arc<dyn SensorModule>>,
}

impl ModuleSet {
    /// Instantiate every `[[gpio_modules]]` and `[[sensor_modules]]` entry.
    pub fn from_config(
        registry: &ModuleRegistry,
        config: &GatewayConfig,
    ) -> Result<Self, GatewayError> {
        let mut modules = Self::default();
        for entry in &config.gpio_modules {
            modules
                .gpio
                .insert(entry.name.clone(), registry.create_gpio(entry)?);
        }
        for entry in &config.sensor_modules {
            modules
                .sensor
                .insert(entry.name.clone(), registry.create_sensor(entry)?);
        }
        Ok(modules)
    }

    /// Run every module's cleanup, GPIO modules first. Failures are logged
    /// and do not stop the remaining cleanups. Returns the failure count.
    pub fn cleanup(&self) -> usize {
        let gpio = self.gpio.iter().map(|(name, m)| (name, m.cleanup()));
        let sensor = self.sensor.iter().map(|(name, m)| (name, m.cleanup()));
        let mut failures = 0;
        for (name, result) in gpio.chain(sensor) {
            if let Err(e) = result {
                error!("Cleanup of module '{name}' failed: {e}");
                failures += 1;
            }
        }
        failures
    }
}

pub struct Gateway {
    config: GatewayConfig,
    modules: ModuleSet,
    supervisor: Arc<TaskSupervisor>,
    bus: Arc<EventBus>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, modules: ModuleSet) -> Self {
        let supervisor = Arc::new(TaskSupervisor::new());
        let bus = Arc::new(EventBus::new(supervisor.clone()));
        Self {
            config,
            modules,
            supervisor,
            bus,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    pub fn supervisor(&self) -> &Arc<TaskSupervisor> {
        &self.supervisor
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn gpio(&self, name: &str) -> Result<&Arc<dyn GpioModule>, GatewayError> {
        self.modules
            .gpio
            .get(name)
            .ok_or_else(|| GatewayError::UnknownModule(name.to_string()))
    }

    fn sensor(&self, name: &str) -> Result<&Arc<dyn SensorModule>, GatewayError> {
        self.modules
            .sensor
            .get(name)
            .ok_or_else(|| GatewayError::UnknownModule(name.to_string()))
    }

    /// Configure every output pin with its initial level.
    pub fn setup_outputs(&self) -> Result<(), GatewayError> {
        for output in &self.config.digital_outputs {
            self.gpio(&output.module)?
                .setup_pin(&PinSetup::output(output))?;
            info!("Digital output '{}' ready on pin {}", output.name, output.pin);
        }
        Ok(())
    }

    /// Bring the gateway up on a connected client.
    ///
    /// # Errors
    /// Fails on a dangling module reference, a pin or sensor setup error or
    /// a client error during the announcement.
    pub async fn start(&self, client: Arc<dyn MqttClient>) -> Result<(), GatewayError> {
        let prefix = &self.config.mqtt.topic_prefix;

        let controller = Arc::new(OutputController::start(
            &self.config.digital_outputs,
            &self.modules.gpio,
            client.clone(),
            prefix,
            self.supervisor.clone(),
        )?);
        let router = Arc::new(Router::new(prefix.clone(), controller));

        bridge::announce(client.as_ref(), &self.config).await?;
        bridge::register_publishers(&self.bus, client.clone(), &self.config);

        self.start_inputs()?;
        self.start_sensors()?;

        let token = self.supervisor.primary_token();
        self.supervisor.spawn_primary(
            "mqtt-rx",
            bridge::rx_loop(
                client,
                router,
                StatusTopic::from_config(&self.config.mqtt),
                token.clone(),
            ),
        );
        let supervisor = self.supervisor.clone();
        self.supervisor
            .spawn_primary("reaper", async move { supervisor.run_reaper(token).await });

        info!("Gateway running");
        Ok(())
    }

    fn start_inputs(&self) -> Result<(), GatewayError> {
        let sink: Arc<dyn EventSink> = self.bus.clone();
        for input in &self.config.digital_inputs {
            let module = self.gpio(&input.module)?;
            module.setup_pin(&PinSetup::input(input))?;
            let (sink, module, input) = (sink.clone(), module.clone(), input.clone());
            self.supervisor.spawn(format!("input:{}", input.name), async move {
                digital_input_poller(sink, module, input)
                    .await
                    .map_err(GatewayError::from)
            });
        }
        Ok(())
    }

    fn start_sensors(&self) -> Result<(), GatewayError> {
        let sink: Arc<dyn EventSink> = self.bus.clone();
        for sensor in &self.config.sensor_inputs {
            let module = self.sensor(&sensor.module)?;
            module.setup_sensor(sensor)?;
            self.supervisor.spawn(
                format!("sensor:{}", sensor.name),
                sensor_poller(sink.clone(), module.clone(), sensor.clone()),
            );
        }
        Ok(())
    }

    /// Wait for a shutdown signal and drain every task.
    pub async fn run<S: SignalSource>(&self, signals: S) {
        ShutdownCoordinator::new(self.supervisor.clone())
            .run(signals)
            .await;
    }
}
