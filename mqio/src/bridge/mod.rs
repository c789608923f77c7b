//! Protocol bridge between the broker and the gateway core.
//!
//! - [`MqttClient`] is the seam to the client library; [`rumqtt`] holds the
//!   production implementation.
//! - [`announce`] runs once after connecting: subscriptions, "running"
//!   status, initial output states.
//! - [`rx_loop`] feeds inbound messages to the [`Router`] and always
//!   finishes with a retained "stopped" status and a disconnect.
//! - [`register_publishers`] turns bus events into outbound messages.

pub mod rumqtt;

use async_trait::async_trait;
use mqio_common::config::{GatewayConfig, MqttConfig};
use mqio_common::event::{Event, EventKind};
use mqio_common::io::config::{DigitalInputConfig, SensorInputConfig};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;
use crate::events::EventBus;
use crate::router::Router;
use crate::supervisor::TaskResult;
use crate::topics::{self, OutputRequest};

/// Upper bound for each step of the receive loop's finalizer.
pub const FINALIZER_TIMEOUT: Duration = Duration::from_secs(5);

/// A message delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Minimal client interface used by the gateway. Every publish and
/// subscription uses QoS 1.
#[async_trait]
pub trait MqttClient: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), BridgeError>;

    async fn subscribe(&self, topic: &str) -> Result<(), BridgeError>;

    /// Next inbound message; `None` once the connection is gone for good.
    async fn recv(&self) -> Option<InboundMessage>;

    async fn disconnect(&self) -> Result<(), BridgeError>;
}

/// The status topic and its three payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTopic {
    pub topic: String,
    pub running: String,
    pub stopped: String,
    pub dead: String,
}

impl StatusTopic {
    pub fn from_config(mqtt: &MqttConfig) -> Self {
        Self {
            topic: topics::status_topic(&mqtt.topic_prefix, &mqtt.status_topic),
            running: mqtt.status_payload_running.clone(),
            stopped: mqtt.status_payload_stopped.clone(),
            dead: mqtt.status_payload_dead.clone(),
        }
    }
}

/// Subscribe to the request topics of every output, publish the retained
/// "running" status, then the initial state of outputs that ask for it.
///
/// # Errors
/// The first client error aborts the announcement.
pub async fn announce(client: &dyn MqttClient, config: &GatewayConfig) -> Result<(), BridgeError> {
    let prefix = &config.mqtt.topic_prefix;

    for output in &config.digital_outputs {
        for request in OutputRequest::ALL {
            let topic = topics::output_request_topic(prefix, &output.name, request);
            client.subscribe(&topic).await?;
            info!("Subscribed to topic: {topic}");
        }
    }

    let status = StatusTopic::from_config(&config.mqtt);
    client.publish(&status.topic, &status.running, true).await?;

    for output in config.digital_outputs.iter().filter(|o| o.publish_initial) {
        client
            .publish(
                &topics::output_topic(prefix, &output.name),
                output.initial_payload(),
                output.retain,
            )
            .await?;
    }
    Ok(())
}

/// Inbound loop; a primary task.
///
/// Runs until `cancel` fires or the client stops delivering. Either way it
/// then publishes the retained "stopped" status and disconnects. Each of
/// the two steps is bounded by [`FINALIZER_TIMEOUT`], and the disconnect is
/// attempted even if the publish failed. The first failure is returned.
pub async fn rx_loop(
    client: Arc<dyn MqttClient>,
    router: Arc<Router>,
    status: StatusTopic,
    cancel: CancellationToken,
) -> TaskResult {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = client.recv() => message,
        };
        let Some(InboundMessage { topic, payload }) = message else {
            warn!("Inbound message stream ended");
            break;
        };
        match String::from_utf8(payload) {
            Ok(payload) => {
                info!("Received message on topic {topic:?}: {payload:?}");
                router.handle(&topic, &payload);
            }
            Err(e) => warn!("Dropping non UTF-8 payload on topic {topic:?}: {e}"),
        }
    }

    let published = finalize_step(
        "publish of the stopped status",
        client.publish(&status.topic, &status.stopped, true),
    )
    .await;
    info!("Disconnecting from MQTT...");
    let disconnected = finalize_step("disconnect", client.disconnect()).await;
    if disconnected.is_ok() {
        info!("MQTT disconnected");
    }
    published.and(disconnected)?;
    Ok(())
}

async fn finalize_step(
    step: &'static str,
    future: impl Future<Output = Result<(), BridgeError>>,
) -> Result<(), BridgeError> {
    let result = match tokio::time::timeout(FINALIZER_TIMEOUT, future).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Timeout(step)),
    };
    if let Err(e) = &result {
        warn!("MQTT {step} did not complete: {e}");
    }
    result
}

/// Publishes `P/input/<name>` on every input change.
struct InputPublisher {
    client: Arc<dyn MqttClient>,
    prefix: String,
    inputs: HashMap<String, DigitalInputConfig>,
}

impl InputPublisher {
    async fn publish(self: Arc<Self>, event: Event) -> TaskResult {
        let Event::InputChanged { input_name, value } = event else {
            return Ok(());
        };
        let Some(input) = self.inputs.get(&input_name) else {
            error!("Input change for unknown input '{input_name}'");
            return Ok(());
        };
        let topic = topics::input_topic(&self.prefix, &input_name);
        debug!("Publishing {topic} <- {}", input.payload(value));
        self.client
            .publish(&topic, input.payload(value), input.retain)
            .await?;
        Ok(())
    }
}

/// Publishes `P/sensor/<name>` on every sensor reading.
struct SensorPublisher {
    client: Arc<dyn MqttClient>,
    prefix: String,
    sensors: HashMap<String, SensorInputConfig>,
}

impl SensorPublisher {
    async fn publish(self: Arc<Self>, event: Event) -> TaskResult {
        let Event::SensorRead { sensor_name, value } = event else {
            return Ok(());
        };
        let Some(sensor) = self.sensors.get(&sensor_name) else {
            error!("Reading for unknown sensor '{sensor_name}'");
            return Ok(());
        };
        let topic = topics::sensor_topic(&self.prefix, &sensor_name);
        self.client
            .publish(&topic, &sensor.format_value(value), sensor.retain)
            .await?;
        Ok(())
    }
}

/// Subscribe the outbound publishers for input changes and sensor reads.
pub fn register_publishers(bus: &EventBus, client: Arc<dyn MqttClient>, config: &GatewayConfig) {
    let inputs = Arc::new(InputPublisher {
        client: client.clone(),
        prefix: config.mqtt.topic_prefix.clone(),
        inputs: config
            .digital_inputs
            .iter()
            .map(|i| (i.name.clone(), i.clone()))
            .collect(),
    });
    bus.subscribe(EventKind::InputChanged, "publish-input", move |event| {
        inputs.clone().publish(event)
    });

    let sensors = Arc::new(SensorPublisher {
        client,
        prefix: config.mqtt.topic_prefix.clone(),
        sensors: config
            .sensor_inputs
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect(),
    });
    bus.subscribe(EventKind::SensorRead, "publish-sensor", move |event| {
        sensors.clone().publish(event)
    });
}
