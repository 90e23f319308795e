//! # MQTT Transport
//!
//! [`BridgeTransport`] over `rumqttc`. A background task drives the event
//! loop: it tracks connectivity, re-subscribes to the inbound topics on
//! every ConnAck, and fans incoming publishes out to subscribers.
//!
//! ```text
//! AsyncClient ──publish/subscribe──→ broker
//!      ↑                               │
//!  MqttBridge                      EventLoop::poll()
//!      │                               ↓
//!  inbound() ←──broadcast──── connection task
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_bus::{
    BridgeTopics, BridgeTransport, InboundMessage, Subscription, TransportError,
    DEFAULT_CHANNEL_CAPACITY,
};
use hr_orchestrator::{LogLevel, StatusEvent, StatusSink};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    SubscribeReasonCode, Transport,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{BrokerAddress, MqttSettings, RuntimeConfigError};

/// Build client options for `settings`.
pub fn mqtt_options(
    settings: &MqttSettings,
    client_id: &str,
) -> Result<MqttOptions, RuntimeConfigError> {
    let mut options = match BrokerAddress::parse(&settings.url)? {
        BrokerAddress::Tcp { host, port } => MqttOptions::new(client_id, host, port),
        BrokerAddress::WebSocket { url, port } => {
            let mut options = MqttOptions::new(client_id, url, port);
            options.set_transport(Transport::Ws);
            options
        }
    };
    options.set_keep_alive(settings.keep_alive());
    options.set_clean_session(true);
    if let Some((username, password)) = settings.credentials() {
        options.set_credentials(username, password);
    }
    Ok(options)
}

/// Broker-backed bridge transport.
pub struct MqttBridge {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    inbound: broadcast::Sender<InboundMessage>,
    shutdown: watch::Sender<bool>,
}

impl MqttBridge {
    /// Create the client and spawn its connection task.
    ///
    /// Inbound topics are subscribed on every connect when
    /// `settings.subscribe_responses` is set.
    pub fn start(
        settings: &MqttSettings,
        client_id: &str,
        topics: &BridgeTopics,
        status: Arc<dyn StatusSink>,
    ) -> Result<(Arc<Self>, JoinHandle<()>), RuntimeConfigError> {
        let options = mqtt_options(settings, client_id)?;
        let (client, eventloop) = AsyncClient::new(options, settings.request_capacity);
        let (inbound, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let connected = Arc::new(AtomicBool::new(false));

        let subscriptions = if settings.subscribe_responses {
            topics.inbound()
        } else {
            Vec::new()
        };

        let task = ConnectionTask {
            client: client.clone(),
            eventloop,
            connected: Arc::clone(&connected),
            inbound: inbound.clone(),
            shutdown: shutdown_rx,
            subscriptions,
            reconnect_delay: settings.reconnect_delay(),
            status,
        };

        info!(url = %settings.url, client_id, "Connecting to MQTT broker");
        let handle = tokio::spawn(task.run());

        let bridge = Arc::new(Self {
            client,
            connected,
            inbound,
            shutdown,
        });
        Ok((bridge, handle))
    }

    /// Disconnect and stop the connection task.
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "Disconnect request not delivered");
        }
        if self.shutdown.send(true).is_err() {
            debug!("MQTT connection task already stopped");
        }
    }
}

#[async_trait]
impl BridgeTransport for MqttBridge {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn inbound(&self) -> Subscription {
        Subscription::new(self.inbound.subscribe())
    }
}

struct ConnectionTask {
    client: AsyncClient,
    eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    inbound: broadcast::Sender<InboundMessage>,
    shutdown: watch::Receiver<bool>,
    subscriptions: Vec<String>,
    reconnect_delay: Duration,
    status: Arc<dyn StatusSink>,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                event = self.eventloop.poll() => match event {
                    Ok(event) => self.on_event(event),
                    Err(e) => self.on_error(e).await,
                },
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("MQTT connection task stopped");
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                if ack.code != ConnectReturnCode::Success {
                    warn!(code = ?ack.code, "Broker refused connection");
                    self.report(LogLevel::Error, format!("MQTT connection refused: {:?}", ack.code));
                    return;
                }
                self.connected.store(true, Ordering::SeqCst);
                self.report(LogLevel::Ok, "MQTT connected.");
                self.resubscribe();
            }
            Event::Incoming(Packet::Publish(publish)) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                if self.inbound.send(message).is_err() {
                    debug!("Inbound message dropped, no subscribers");
                }
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    warn!(pkid = ack.pkid, "Broker rejected subscription");
                    self.report(LogLevel::Error, "Subscribe failed: rejected by broker");
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                self.connected.store(false, Ordering::SeqCst);
                self.report(LogLevel::Warn, "MQTT disconnected by broker.");
            }
            _ => {}
        }
    }

    async fn on_error(&mut self, error: ConnectionError) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(error = %error, "MQTT connection lost");
            self.report(LogLevel::Warn, format!("MQTT connection lost: {error}"));
        } else {
            debug!(error = %error, "MQTT connect attempt failed");
        }
        tokio::time::sleep(self.reconnect_delay).await;
    }

    fn resubscribe(&self) {
        for topic in &self.subscriptions {
            // Queued without waiting; this task is the one draining the queue.
            match self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                Ok(()) => {
                    info!(topic = %topic, "Subscribed");
                    self.report(LogLevel::Ok, format!("Subscribed to {topic}"));
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Subscribe failed");
                    self.report(LogLevel::Error, format!("Subscribe failed: {e}"));
                }
            }
        }
    }

    fn report(&self, level: LogLevel, message: impl Into<String>) {
        self.status.emit(StatusEvent::log(level, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr_orchestrator::ChannelStatusSink;

    #[test]
    fn test_tcp_options() {
        let settings = MqttSettings {
            url: "mqtt://broker.local:1884".to_string(),
            username: Some("hue".to_string()),
            password: Some("secret".to_string()),
            ..MqttSettings::default()
        };
        let options = mqtt_options(&settings, "hue-reset-0000abcd").unwrap();

        assert_eq!(options.client_id(), "hue-reset-0000abcd");
        assert_eq!(
            options.broker_address(),
            ("broker.local".to_string(), 1884)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(options.clean_session());
    }

    #[test]
    fn test_ws_options_keep_full_url() {
        let settings = MqttSettings::default();
        let options = mqtt_options(&settings, "id").unwrap();
        assert_eq!(
            options.broker_address(),
            ("ws://localhost:9001".to_string(), 9001)
        );
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let settings = MqttSettings {
            url: "wss://broker:443".to_string(),
            ..MqttSettings::default()
        };
        assert!(matches!(
            mqtt_options(&settings, "id"),
            Err(RuntimeConfigError::UnsupportedScheme { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_before_connect_is_refused() {
        let settings = MqttSettings {
            url: "tcp://127.0.0.1:1".to_string(),
            reconnect_delay_ms: 50,
            ..MqttSettings::default()
        };
        let (status, _events) = ChannelStatusSink::new();
        let (bridge, task) =
            MqttBridge::start(&settings, "id", &BridgeTopics::default(), Arc::new(status))
                .unwrap();

        assert!(!bridge.is_connected());
        let err = bridge
            .publish("zigbee2mqtt/bridge/request/action", b"{}".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotConnected);

        bridge.disconnect().await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("connection task should stop")
            .unwrap();

        // Disconnecting again after the task ended is harmless.
        bridge.disconnect().await;
        assert!(!bridge.is_connected());
    }
}
