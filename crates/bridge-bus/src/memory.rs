//! # In-Memory Bridge
//!
//! Loopback implementation of [`BridgeTransport`]. Publishes are recorded
//! instead of sent, and inbound traffic is injected by the caller. Used by
//! tests and by the runtime's dry-run mode.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::subscriber::Subscription;
use crate::transport::{BridgeTransport, InboundMessage, TransportError};
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Publishes kept by default; older ones are dropped first.
pub const DEFAULT_PUBLISH_HISTORY: usize = 1024;

/// A message accepted by [`InMemoryBridge::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Payload parsed as JSON, or `Value::Null` when it does not parse.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// Loopback bridge transport.
///
/// Starts connected. Only topics passed to [`BridgeTransport::subscribe`]
/// are delivered by [`InMemoryBridge::inject`], mirroring broker semantics.
/// The publish record holds at most [`DEFAULT_PUBLISH_HISTORY`] messages
/// unless changed with [`InMemoryBridge::with_publish_history`].
pub struct InMemoryBridge {
    sender: broadcast::Sender<InboundMessage>,
    connected: AtomicBool,
    subscriptions: RwLock<HashSet<String>>,
    published: RwLock<VecDeque<PublishedMessage>>,
    publish_history: usize,
    failing_topics: RwLock<HashSet<String>>,
    messages_injected: AtomicU64,
}

impl InMemoryBridge {
    /// Create a connected loopback bridge with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a connected loopback bridge with the given inbound capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            connected: AtomicBool::new(true),
            subscriptions: RwLock::new(HashSet::new()),
            published: RwLock::new(VecDeque::new()),
            publish_history: DEFAULT_PUBLISH_HISTORY,
            failing_topics: RwLock::new(HashSet::new()),
            messages_injected: AtomicU64::new(0),
        }
    }

    /// Keep only the newest `limit` publishes (at least one).
    #[must_use]
    pub fn with_publish_history(mut self, limit: usize) -> Self {
        self.publish_history = limit.max(1);
        self
    }

    /// Flip the reported connection state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every publish to `topic` fail until cleared.
    pub fn fail_publishes_to(&self, topic: impl Into<String>) {
        self.failing_topics.write().insert(topic.into());
    }

    /// Stop failing publishes.
    pub fn clear_publish_failures(&self) {
        self.failing_topics.write().clear();
    }

    /// Deliver a raw inbound message.
    ///
    /// Returns the number of receivers reached; zero when the topic is not
    /// subscribed or nobody is listening.
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) -> usize {
        if !self.subscriptions.read().contains(topic) {
            debug!(topic = %topic, "Dropping inbound message on unsubscribed topic");
            return 0;
        }

        self.messages_injected.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(InboundMessage::new(topic, payload)) {
            Ok(receivers) => receivers,
            Err(_) => {
                warn!(topic = %topic, "Inbound message dropped (no receivers)");
                0
            }
        }
    }

    /// Serialize `message` as JSON and deliver it.
    pub fn inject_json<T: Serialize>(&self, topic: &str, message: &T) -> usize {
        match serde_json::to_vec(message) {
            Ok(payload) => self.inject(topic, payload),
            Err(e) => {
                warn!(topic = %topic, error = %e, "Failed to serialize injected message");
                0
            }
        }
    }

    /// Everything published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.read().iter().cloned().collect()
    }

    /// Everything published to `topic`, in order.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Whether `topic` has been subscribed.
    #[must_use]
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.read().contains(topic)
    }

    /// Total messages delivered through [`InMemoryBridge::inject`].
    #[must_use]
    pub fn messages_injected(&self) -> u64 {
        self.messages_injected.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BridgeTransport for InMemoryBridge {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.failing_topics.read().contains(topic) {
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        debug!(topic = %topic, bytes = payload.len(), "Loopback publish");
        let mut published = self.published.write();
        if published.len() >= self.publish_history {
            published.pop_front();
        }
        published.push_back(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.subscriptions.write().insert(topic.to_string());
        Ok(())
    }

    fn inbound(&self) -> Subscription {
        Subscription::new(self.sender.subscribe())
    }
}
