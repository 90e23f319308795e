//! # Transport Port
//!
//! The reset flow depends only on this trait. Broker clients (MQTT over TCP
//! or WebSocket) and the in-memory loopback implement it.

use async_trait::async_trait;
use thiserror::Error;

use crate::subscriber::Subscription;

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No broker connection is established.
    #[error("transport is not connected")]
    NotConnected,

    /// The broker client refused or failed to queue a publish.
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// The broker client refused or failed to queue a subscribe.
    #[error("subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Publish/subscribe primitives over the bridge control channel.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Whether a broker connection is currently established.
    fn is_connected(&self) -> bool;

    /// Publish `payload` to `topic`.
    ///
    /// `Ok` means the client accepted the message for delivery; it says
    /// nothing about whether the bridge acted on it.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Subscribe to `topic`. Implementations re-apply subscriptions after a
    /// reconnect.
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Stream of messages arriving on subscribed topics.
    fn inbound(&self) -> Subscription;
}
