//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mqio::bridge::{InboundMessage, MqttClient};
use mqio::{BridgeError, Gateway, ModuleSet};
use mqio_common::config::{ConfigLoader, GatewayConfig};
use mqio_hal::drivers::simulation::{SimulatedGpio, SimulatedSensor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One interaction with the broker, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Publish {
        topic: String,
        payload: String,
        retain: bool,
    },
    Subscribe(String),
    Disconnect,
}

/// How a publish of a given payload misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFault {
    /// Never completes, like a client whose request queue is full.
    Stall,
    /// Fails at once.
    Fail,
}

/// In-memory broker connection recording every call.
pub struct MemoryClient {
    calls: Mutex<Vec<ClientCall>>,
    faults: Mutex<HashMap<String, PublishFault>>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
}

impl MemoryClient {
    pub fn new() -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(HashMap::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
        })
    }

    /// Deliver a message as if the broker had sent it.
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        self.inbound_tx
            .send(InboundMessage {
                topic: topic.to_string(),
                payload: payload.into(),
            })
            .unwrap();
    }

    /// Make every later publish of `payload` misbehave. Faulty publishes
    /// are not recorded.
    pub fn fault_on(&self, payload: &str, fault: PublishFault) {
        self.faults.lock().insert(payload.to_string(), fault);
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ClientCall::Subscribe(topic) => Some(topic),
                _ => None,
            })
            .collect()
    }

    /// `(payload, retain)` of every publish on `topic`.
    pub fn published_on(&self, topic: &str) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ClientCall::Publish {
                    topic: t,
                    payload,
                    retain,
                } if t == topic => Some((payload, retain)),
                _ => None,
            })
            .collect()
    }

    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.published_on(topic).into_iter().map(|(p, _)| p).collect()
    }
}

#[async_trait]
impl MqttClient for MemoryClient {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), BridgeError> {
        let fault = self.faults.lock().get(payload).copied();
        match fault {
            Some(PublishFault::Stall) => futures::future::pending::<()>().await,
            Some(PublishFault::Fail) => return Err(BridgeError::Closed),
            None => {}
        }
        self.calls.lock().push(ClientCall::Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), BridgeError> {
        self.calls.lock().push(ClientCall::Subscribe(topic.to_string()));
        Ok(())
    }

    async fn recv(&self) -> Option<InboundMessage> {
        self.inbound_rx.lock().await.recv().await
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        self.calls.lock().push(ClientCall::Disconnect);
        Ok(())
    }
}

/// Two simulated GPIO chips, four outputs, one debounced input and one
/// simulated sensor, all under prefix `P`.
pub const CONFIG: &str = r#"
[mqtt]
host = "localhost"
topic_prefix = "P"

[[gpio_modules]]
name = "gpio0"
module = "simulation"

[[gpio_modules]]
name = "gpio1"
module = "simulation"

[[sensor_modules]]
name = "sim"
module = "simulation"

[[digital_outputs]]
name = "relay1"
module = "gpio0"
pin = 17
retain = true

[[digital_outputs]]
name = "relay2"
module = "gpio0"
pin = 18

[[digital_outputs]]
name = "inverted"
module = "gpio0"
pin = 19
inverted = true

[[digital_outputs]]
name = "fan"
module = "gpio1"
pin = 5
on_payload = "spin"
off_payload = "stop"
initial = "high"
publish_initial = true

[[digital_inputs]]
name = "door"
module = "gpio0"
pin = 4
poll_interval_ms = 10
debounce_ms = 50

[[sensor_inputs]]
name = "temp"
module = "sim"
interval_secs = 1
digits = 2
value = 21.456
"#;

/// A gateway with its simulated hardware.
pub struct Rig {
    pub gateway: Gateway,
    pub gpio0: Arc<SimulatedGpio>,
    pub gpio1: Arc<SimulatedGpio>,
}

/// Build the gateway for [`CONFIG`] with output pins set up; both chips
/// take `write_delay` per write.
pub fn rig(write_delay: std::time::Duration) -> Rig {
    let config = GatewayConfig::parse(CONFIG).unwrap();
    config.validate().unwrap();

    let gpio0 = Arc::new(SimulatedGpio::with_write_delay(write_delay));
    let gpio1 = Arc::new(SimulatedGpio::with_write_delay(write_delay));
    let mut modules = ModuleSet::default();
    modules.gpio.insert("gpio0".to_string(), gpio0.clone());
    modules.gpio.insert("gpio1".to_string(), gpio1.clone());
    modules
        .sensor
        .insert("sim".to_string(), Arc::new(SimulatedSensor::new(None)));

    let gateway = Gateway::new(config, modules);
    gateway.setup_outputs().unwrap();
    Rig {
        gateway,
        gpio0,
        gpio1,
    }
}

/// Start `rig` on a fresh in-memory client.
pub async fn start(rig: &Rig) -> Arc<MemoryClient> {
    let client = MemoryClient::new();
    rig.gateway.start(client.clone()).await.unwrap();
    client
}
