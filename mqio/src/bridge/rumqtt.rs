//! [`MqttClient`] on top of `rumqttc`.
//!
//! `connect` waits for the broker's CONNACK so that a bad host, port or
//! credentials fail startup. After that the event loop is driven by a
//! tracked task that forwards inbound publishes to [`MqttClient::recv`]
//! and restores subscriptions plus the running status on every reconnect.

use async_trait::async_trait;
use mqio_common::config::MqttConfig;
use mqio_common::consts::CLIENT_ID_PREFIX;
use parking_lot::Mutex;
use rumqttc::tokio_rustls::rustls::{
    self, ClientConfig, DigitallySignedStruct, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, ServerName, UnixTime},
};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet,
    QoS, TlsConfiguration, Transport,
};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use super::{InboundMessage, MqttClient, StatusTopic};
use crate::error::BridgeError;
use crate::supervisor::{TaskResult, TaskSupervisor};

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client id used when none is configured: stable per topic prefix.
pub fn default_client_id(topic_prefix: &str) -> String {
    format!("{CLIENT_ID_PREFIX}-{:x}", Sha256::digest(topic_prefix.as_bytes()))
}

fn read_pem(path: &Path) -> Result<Vec<u8>, BridgeError> {
    std::fs::read(path).map_err(|e| BridgeError::Tls(format!("{}: {e}", path.display())))
}

/// Certificate verifier for `mqtt.tls.insecure`: accepts any broker
/// certificate for any hostname.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
        ]
    }
}

fn insecure_transport(config: &MqttConfig) -> Result<Transport, BridgeError> {
    if config.tls.certfile.is_some() {
        return Err(BridgeError::Tls(
            "mqtt.tls.insecure cannot be combined with a client certificate".to_string(),
        ));
    }
    if config.tls.ca_file.is_some() {
        warn!("mqtt.tls.ca_file is ignored because mqtt.tls.insecure is set");
    }
    warn!("mqtt.tls.insecure is set; the broker certificate and hostname are not verified");
    let client_config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    Ok(Transport::Tls(TlsConfiguration::Rustls(Arc::new(client_config))))
}

fn transport(config: &MqttConfig) -> Result<Transport, BridgeError> {
    let tls = &config.tls;
    if tls.insecure {
        return insecure_transport(config);
    }
    let client_auth = match (&tls.certfile, &tls.keyfile) {
        (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
        _ => None,
    };
    match (&tls.ca_file, client_auth) {
        (Some(ca), client_auth) => Ok(Transport::Tls(TlsConfiguration::Simple {
            ca: read_pem(ca)?,
            alpn: None,
            client_auth,
        })),
        (None, None) => Ok(Transport::tls_with_default_config()),
        (None, Some(_)) => Err(BridgeError::Tls(
            "a client certificate needs mqtt.tls.ca_file".to_string(),
        )),
    }
}

/// Build the connection options, including the last will.
pub fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions, BridgeError> {
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| default_client_id(&config.topic_prefix));
    let status = StatusTopic::from_config(config);

    let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
    options
        .set_keep_alive(Duration::from_secs(config.keep_alive_secs))
        .set_clean_session(config.clean_session)
        .set_last_will(LastWill::new(
            status.topic,
            status.dead.into_bytes(),
            QoS::AtLeastOnce,
            true,
        ));
    if let Some(user) = &config.user {
        options.set_credentials(user.clone(), config.password.clone().unwrap_or_default());
    }
    if config.tls.enabled {
        options.set_transport(transport(config)?);
    }
    Ok(options)
}

struct Shared {
    client: AsyncClient,
    subscriptions: Mutex<Vec<String>>,
    status: StatusTopic,
    disconnected: Notify,
}

/// Production MQTT client.
pub struct RumqttClient {
    shared: Arc<Shared>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
}

impl RumqttClient {
    /// Connect and wait for the broker to accept the session, then hand
    /// the event loop to `supervisor`.
    ///
    /// # Errors
    /// `BridgeError::Connect` if the broker is unreachable or refuses the
    /// connection, `BridgeError::Tls` if certificate files cannot be read.
    pub async fn connect(
        config: &MqttConfig,
        supervisor: &TaskSupervisor,
    ) -> Result<Self, BridgeError> {
        let options = mqtt_options(config)?;
        let connect_error = |reason: String| BridgeError::Connect {
            host: config.host.clone(),
            port: config.port,
            reason,
        };

        info!("Connecting to MQTT broker {}:{}...", config.host, config.port);
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(connect_error(format!("{:?}", ack.code)));
                    }
                    break;
                }
                Ok(_) => {}
                Err(e) => return Err(connect_error(e.to_string())),
            }
        }
        info!("Connected to MQTT");

        let shared = Arc::new(Shared {
            client,
            subscriptions: Mutex::new(Vec::new()),
            status: StatusTopic::from_config(config),
            disconnected: Notify::new(),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        supervisor.spawn("mqtt-eventloop", drive(eventloop, shared.clone(), tx));

        Ok(Self {
            shared,
            inbound: tokio::sync::Mutex::new(rx),
        })
    }
}

/// Event loop driver; a tracked task.
async fn drive(
    mut eventloop: EventLoop,
    shared: Arc<Shared>,
    inbound: mpsc::UnboundedSender<InboundMessage>,
) -> TaskResult {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                };
                if inbound.send(message).is_err() {
                    debug!("Inbound receiver dropped, discarding message");
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Reconnected to MQTT, restoring subscriptions");
                restore_session(&shared);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                shared.disconnected.notify_one();
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {e}; retrying in {RECONNECT_DELAY:?}");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Re-subscribe every topic and replace the broker's retained "dead".
fn restore_session(shared: &Shared) {
    for topic in shared.subscriptions.lock().iter() {
        if let Err(e) = shared.client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
            warn!("Re-subscribing to {topic} failed: {e}");
        }
    }
    let status = &shared.status;
    if let Err(e) = shared.client.try_publish(
        status.topic.clone(),
        QoS::AtLeastOnce,
        true,
        status.running.clone().into_bytes(),
    ) {
        warn!("Re-publishing running status failed: {e}");
    }
}

fn client_error(e: rumqttc::ClientError) -> BridgeError {
    BridgeError::Client(e.to_string())
}

#[async_trait]
impl MqttClient for RumqttClient {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), BridgeError> {
        self.shared
            .client
            .publish(topic, QoS::AtLeastOnce, retain, payload.as_bytes().to_vec())
            .await
            .map_err(client_error)
    }

    async fn subscribe(&self, topic: &str) -> Result<(), BridgeError> {
        self.shared
            .client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(client_error)?;
        self.shared.subscriptions.lock().push(topic.to_string());
        Ok(())
    }

    async fn recv(&self) -> Option<InboundMessage> {
        self.inbound.lock().await.recv().await
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        self.shared.client.disconnect().await.map_err(client_error)?;
        if tokio::time::timeout(DISCONNECT_TIMEOUT, self.shared.disconnected.notified())
            .await
            .is_err()
        {
            warn!("DISCONNECT not confirmed within {DISCONNECT_TIMEOUT:?}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn client_id_is_stable_per_prefix() {
        let id = default_client_id("mqtt_io");
        assert!(id.starts_with("mqtt-io-"));
        assert_eq!(id.len(), "mqtt-io-".len() + 64);
        assert_eq!(id, default_client_id("mqtt_io"));
        assert_ne!(id, default_client_id("home/pi"));
    }

    #[test]
    fn options_from_config() {
        let mut config = MqttConfig::new("broker.local");
        config.keep_alive_secs = 30;
        config.clean_session = true;
        let options = mqtt_options(&config).unwrap();
        assert_eq!(options.client_id(), default_client_id("mqtt_io"));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(options.clean_session());
        assert!(options.last_will().is_some());

        config.client_id = Some("gw-1".to_string());
        assert_eq!(mqtt_options(&config).unwrap().client_id(), "gw-1");
    }

    #[test]
    fn unreadable_ca_file_is_tls_error() {
        let mut config = MqttConfig::new("broker.local");
        config.tls.enabled = true;
        config.tls.ca_file = Some(PathBuf::from("/nonexistent/ca.pem"));
        assert!(matches!(mqtt_options(&config), Err(BridgeError::Tls(_))));
    }

    #[test]
    fn insecure_tls_uses_permissive_verifier() {
        let mut config = MqttConfig::new("broker.local");
        config.tls.enabled = true;
        config.tls.insecure = true;
        assert!(matches!(
            transport(&config),
            Ok(Transport::Tls(TlsConfiguration::Rustls(_)))
        ));

        let name = ServerName::try_from("other.host").unwrap();
        let accepted = AcceptAnyCertificate.verify_server_cert(
            &CertificateDer::from(vec![0u8; 8]),
            &[],
            &name,
            &[],
            UnixTime::now(),
        );
        assert!(accepted.is_ok());
    }

    #[test]
    fn insecure_tls_rejects_client_certificate() {
        let mut config = MqttConfig::new("broker.local");
        config.tls.enabled = true;
        config.tls.insecure = true;
        config.tls.certfile = Some(PathBuf::from("client.pem"));
        config.tls.keyfile = Some(PathBuf::from("client.key"));
        assert!(matches!(transport(&config), Err(BridgeError::Tls(_))));
    }

    #[tokio::test]
    async fn unreachable_broker_is_fatal_at_connect() {
        let mut config = MqttConfig::new("127.0.0.1");
        config.port = 1;
        let supervisor = TaskSupervisor::new();

        let result = RumqttClient::connect(&config, &supervisor).await;
        assert!(matches!(result, Err(BridgeError::Connect { port: 1, .. })));
        // Nothing is left running that could start inputs or sensors.
        assert!(supervisor.is_empty());
    }

    #[test]
    fn tls_material_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.pem");
        std::fs::write(&ca, "-----BEGIN CERTIFICATE-----\n").unwrap();
        let mut config = MqttConfig::new("broker.local");
        config.tls.enabled = true;
        config.tls.ca_file = Some(ca);
        assert!(matches!(
            transport(&config),
            Ok(Transport::Tls(TlsConfiguration::Simple { .. }))
        ));
        assert!(mqtt_options(&config).is_ok());
    }
}
