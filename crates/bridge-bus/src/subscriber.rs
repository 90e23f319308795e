//! # Inbound Subscription
//!
//! Receiving side of a transport's inbound broadcast channel.

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::transport::InboundMessage;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The transport was dropped.
    #[error("inbound channel closed")]
    Closed,
}

/// A handle for receiving inbound messages.
///
/// Every subscription sees every message sent after it was created. A
/// subscriber that falls more than the channel capacity behind skips the
/// oldest messages and keeps going.
pub struct Subscription {
    receiver: broadcast::Receiver<InboundMessage>,
}

impl Subscription {
    /// Wrap the receiving half of a transport's inbound channel.
    #[must_use]
    pub fn new(receiver: broadcast::Receiver<InboundMessage>) -> Self {
        Self { receiver }
    }

    /// Receive the next message.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next inbound message
    /// - `None` - The channel was closed (transport dropped)
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Inbound subscriber lagged, messages dropped");
                }
            }
        }
    }

    /// Try to receive the next message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available
    /// - `Ok(None)` - Nothing queued
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<InboundMessage>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            }
        }
    }
}
