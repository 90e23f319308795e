//! Cancellable timers referenced by id.

use std::fmt;
use std::time::Duration;

use super::transaction::TransactionId;

/// Identifies a scheduled timeout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Deadline for the response to the reset action with this transaction.
    ActionResponse(TransactionId),
    /// Soft timeout of the rejoin watch with this id.
    Rejoin(u64),
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActionResponse(txn) => write!(f, "action-response/{txn}"),
            Self::Rejoin(id) => write!(f, "rejoin/{id}"),
        }
    }
}

/// Schedules timer expiries back to the dispatch loop.
///
/// Expiry is delivered as the [`TimerId`] through whatever channel the
/// implementation was built with. Cancelling an unknown or already-fired
/// timer is a no-op; the orchestrator also ignores expiries that no longer
/// match its state.
pub trait TimerScheduler: Send + Sync {
    /// Arm `id` to fire after `delay`, replacing any timer with the same id.
    fn schedule(&self, id: TimerId, delay: Duration);

    /// Disarm `id`.
    fn cancel(&self, id: &TimerId);
}
