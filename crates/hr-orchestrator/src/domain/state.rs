//! The single mutable state record of an orchestrator.

use std::fmt;

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::debug;

use super::gate::SubmissionGate;
use super::pending::PendingActions;
use super::request::ResetRequest;
use super::watch::{RejoinOutcome, RejoinWatch};

/// Position of the current cycle in the reset flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchestratorPhase {
    Idle,
    RequestSent,
    AwaitingActionResponse,
    ActionConfirmed,
    ActionFailed,
    ActionTimedOut,
    JoinWindowRequested,
    JoinWindowConfirmed,
    AwaitingRejoin,
}

impl OrchestratorPhase {
    /// Phases that end a cycle before it returns to `Idle`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ActionFailed | Self::ActionTimedOut)
    }
}

impl fmt::Display for OrchestratorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RequestSent => "request-sent",
            Self::AwaitingActionResponse => "awaiting-action-response",
            Self::ActionConfirmed => "action-confirmed",
            Self::ActionFailed => "action-failed",
            Self::ActionTimedOut => "action-timed-out",
            Self::JoinWindowRequested => "join-window-requested",
            Self::JoinWindowConfirmed => "join-window-confirmed",
            Self::AwaitingRejoin => "awaiting-rejoin",
        };
        f.write_str(name)
    }
}

/// A rejoin watch together with its submitter's waiter.
#[derive(Debug)]
pub struct ActiveWatch {
    pub watch: RejoinWatch,
    responder: Option<oneshot::Sender<RejoinOutcome>>,
}

impl ActiveWatch {
    pub fn new(watch: RejoinWatch, responder: oneshot::Sender<RejoinOutcome>) -> Self {
        Self {
            watch,
            responder: Some(responder),
        }
    }

    /// Resolve the waiter. Later calls do nothing.
    pub fn resolve(&mut self, outcome: RejoinOutcome) {
        if let Some(responder) = self.responder.take() {
            if responder.send(outcome).is_err() {
                debug!(serial = %self.watch.serial, "Rejoin waiter dropped before resolution");
            }
        }
    }
}

/// Everything the orchestrator mutates, owned by one dispatch task.
#[derive(Debug)]
pub struct OrchestratorState {
    pub phase: OrchestratorPhase,
    pub gate: SubmissionGate,
    /// Most recent reset request, kept after it ends for status display.
    pub request: Option<ResetRequest>,
    pub pending: PendingActions,
    pub watch: Option<ActiveWatch>,
    next_watch_id: u64,
}

impl OrchestratorState {
    pub fn new(dedup_window_ms: u64) -> Self {
        Self {
            phase: OrchestratorPhase::Idle,
            gate: SubmissionGate::new(dedup_window_ms),
            request: None,
            pending: PendingActions::new(),
            watch: None,
            next_watch_id: 0,
        }
    }

    /// Allocate the id for the next watch.
    pub fn allocate_watch_id(&mut self) -> u64 {
        self.next_watch_id += 1;
        self.next_watch_id
    }

    /// The active watch, if it is still watching.
    pub fn watching(&mut self) -> Option<&mut ActiveWatch> {
        self.watch.as_mut().filter(|active| active.watch.is_watching())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ScanSource, Serial};

    #[tokio::test]
    async fn test_active_watch_resolves_once() {
        let (tx, rx) = oneshot::channel();
        let watch = RejoinWatch::start(1, Serial::parse("06E49F").unwrap(), ScanSource::Qr, 0);
        let mut active = ActiveWatch::new(watch, tx);

        active.resolve(RejoinOutcome::TimedOut);
        active.resolve(RejoinOutcome::Superseded);
        assert_eq!(rx.await.unwrap(), RejoinOutcome::TimedOut);
    }

    #[test]
    fn test_watch_ids_increase() {
        let mut state = OrchestratorState::new(20_000);
        assert_eq!(state.allocate_watch_id(), 1);
        assert_eq!(state.allocate_watch_id(), 2);
        assert_eq!(state.phase, OrchestratorPhase::Idle);
    }
}
