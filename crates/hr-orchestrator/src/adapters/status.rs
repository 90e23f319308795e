//! Status sink implementations.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::ports::{LogLevel, StatusEvent, StatusSink};

/// Forwards status events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelStatusSink {
    sender: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelStatusSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StatusSink for ChannelStatusSink {
    fn emit(&self, event: StatusEvent) {
        // A closed receiver means nobody is watching status any more.
        let _ = self.sender.send(event);
    }
}

/// Renders status events through `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn emit(&self, event: StatusEvent) {
        match event {
            StatusEvent::Log { message, level } => match level {
                LogLevel::Debug => debug!(target: "hue_reset::status", "{message}"),
                LogLevel::Info => info!(target: "hue_reset::status", "{message}"),
                LogLevel::Ok => info!(target: "hue_reset::status", ok = true, "{message}"),
                LogLevel::Warn => warn!(target: "hue_reset::status", "{message}"),
                LogLevel::Error => error!(target: "hue_reset::status", "{message}"),
            },
            StatusEvent::State(phase) => {
                debug!(target: "hue_reset::status", phase = %phase, "Orchestrator state changed");
            }
        }
    }
}
