//! Reset flow error taxonomy.

use thiserror::Error;

use crate::domain::TransactionId;

/// Errors surfaced by the reset flow.
///
/// `RejoinTimedOut` and `Superseded` are informational: the reset itself may
/// already have succeeded when they are reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResetError {
    /// No broker connection; nothing was published.
    #[error("transport unavailable: serial {serial} was not sent")]
    TransportUnavailable { serial: String },

    /// The transport refused a publish.
    #[error("publish to {topic} failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// Input did not normalize to a serial.
    #[error("invalid serial '{input}'")]
    InvalidSerial { input: String },

    /// The bridge answered the reset action with an error.
    #[error("reset of {serial} rejected by bridge: {error}")]
    ActionRejected { serial: String, error: String },

    /// No correlated response arrived in time.
    #[error("no response for reset of {serial} (transaction {transaction})")]
    ActionTimedOut {
        serial: String,
        transaction: TransactionId,
    },

    /// The device did not rejoin in time.
    #[error("{serial} did not rejoin before the watch expired")]
    RejoinTimedOut { serial: String },

    /// A newer submission replaced the in-flight one.
    #[error("operation for {serial} superseded by a newer submission")]
    Superseded { serial: String },

    /// The dispatch loop is no longer running.
    #[error("orchestrator stopped")]
    Stopped,
}

impl ResetError {
    /// Whether this error represents a failed operation rather than an
    /// informational outcome.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::RejoinTimedOut { .. } | Self::Superseded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_informational_errors() {
        assert!(!ResetError::Superseded { serial: "06E49F".into() }.is_failure());
        assert!(!ResetError::RejoinTimedOut { serial: "06E49F".into() }.is_failure());
        assert!(ResetError::ActionRejected {
            serial: "06E49F".into(),
            error: "timeout".into()
        }
        .is_failure());
    }
}
