//! Reset request record and action outcomes.

use std::fmt;

use serde::Serialize;

use super::serial::{ScanSource, Serial};
use super::transaction::TransactionId;
use crate::error::ResetError;

/// Lifecycle of a reset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestState {
    Pending,
    Confirmed,
    Failed,
    TimedOut,
    Superseded,
}

impl RequestState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The most recent reset request issued by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetRequest {
    pub serial: Serial,
    pub source: ScanSource,
    pub transaction: TransactionId,
    /// Acceptance time in milliseconds of the orchestrator clock.
    pub created_at: u64,
    pub state: RequestState,
}

impl ResetRequest {
    pub fn new(
        serial: Serial,
        source: ScanSource,
        transaction: TransactionId,
        created_at: u64,
    ) -> Self {
        Self {
            serial,
            source,
            transaction,
            created_at,
            state: RequestState::Pending,
        }
    }

    /// Move a pending request to `state`. Terminal requests are left as-is.
    ///
    /// Returns `true` when the state changed.
    pub fn finish(&mut self, state: RequestState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }
}

/// How the wait for a reset action response ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Bridge answered `ok`.
    Confirmed,
    /// Bridge answered `error` with this text.
    Rejected(String),
    /// No correlated response before the deadline.
    TimedOut,
    /// A newer submission replaced this one.
    Superseded,
}

impl ActionOutcome {
    /// Label used for metrics and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rejected(_) => "rejected",
            Self::TimedOut => "timed_out",
            Self::Superseded => "superseded",
        }
    }

    /// The error this outcome stands for; `None` when confirmed.
    #[must_use]
    pub fn to_error(&self, serial: &Serial, transaction: &TransactionId) -> Option<ResetError> {
        let serial = serial.to_string();
        match self {
            Self::Confirmed => None,
            Self::Rejected(error) => Some(ResetError::ActionRejected {
                serial,
                error: error.clone(),
            }),
            Self::TimedOut => Some(ResetError::ActionTimedOut {
                serial,
                transaction: transaction.clone(),
            }),
            Self::Superseded => Some(ResetError::Superseded { serial }),
        }
    }

    /// Terminal request state for this outcome.
    #[must_use]
    pub fn request_state(&self) -> RequestState {
        match self {
            Self::Confirmed => RequestState::Confirmed,
            Self::Rejected(_) => RequestState::Failed,
            Self::TimedOut => RequestState::TimedOut,
            Self::Superseded => RequestState::Superseded,
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(error) => write!(f, "rejected: {error}"),
            other => f.write_str(other.label()),
        }
    }
}
