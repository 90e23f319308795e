//! # Pending Actions
//!
//! Reset actions awaiting a bridge response, keyed by transaction id.
//!
//! Each entry owns the resolution handles of one submission: the action
//! waiter and the rejoin waiter that is handed to the watch once the join
//! window is open. Removing an entry is the only way to resolve it, so an
//! entry is resolved exactly once.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tracing::debug;

use super::request::ActionOutcome;
use super::serial::{ScanSource, Serial};
use super::transaction::TransactionId;
use super::watch::RejoinOutcome;

/// A reset action waiting for its response.
#[derive(Debug)]
pub struct PendingAction {
    pub serial: Serial,
    pub source: ScanSource,
    /// Response deadline in milliseconds of the orchestrator clock.
    pub deadline: u64,
    responder: oneshot::Sender<ActionOutcome>,
    rejoin: oneshot::Sender<RejoinOutcome>,
}

impl PendingAction {
    pub fn new(
        serial: Serial,
        source: ScanSource,
        deadline: u64,
        responder: oneshot::Sender<ActionOutcome>,
        rejoin: oneshot::Sender<RejoinOutcome>,
    ) -> Self {
        Self {
            serial,
            source,
            deadline,
            responder,
            rejoin,
        }
    }

    /// Resolve the action waiter with `outcome`.
    ///
    /// Returns the rejoin waiter so the caller can either hand it to a watch
    /// or resolve it.
    pub fn resolve(self, outcome: ActionOutcome) -> oneshot::Sender<RejoinOutcome> {
        if self.responder.send(outcome).is_err() {
            debug!(serial = %self.serial, "Action waiter dropped before resolution");
        }
        self.rejoin
    }

    /// Resolve both waiters: the action with `outcome`, the rejoin with
    /// `rejoin`.
    pub fn resolve_all(self, outcome: ActionOutcome, rejoin: RejoinOutcome) {
        let serial = self.serial.clone();
        if self.resolve(outcome).send(rejoin).is_err() {
            debug!(serial = %serial, "Rejoin waiter dropped before resolution");
        }
    }
}

/// Table of reset actions awaiting a response.
#[derive(Debug, Default)]
pub struct PendingActions {
    entries: HashMap<TransactionId, PendingAction>,
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, transaction: TransactionId, action: PendingAction) {
        self.entries.insert(transaction, action);
    }

    /// Remove the entry for `transaction`, if still pending.
    pub fn take(&mut self, transaction: &TransactionId) -> Option<PendingAction> {
        self.entries.remove(transaction)
    }

    /// Remove every entry.
    pub fn drain(&mut self) -> Vec<(TransactionId, PendingAction)> {
        self.entries.drain().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> (
        PendingAction,
        oneshot::Receiver<ActionOutcome>,
        oneshot::Receiver<RejoinOutcome>,
    ) {
        let (tx, rx) = oneshot::channel();
        let (rejoin_tx, rejoin_rx) = oneshot::channel();
        let action = PendingAction::new(
            Serial::parse("06E49F").unwrap(),
            ScanSource::Manual,
            40_000,
            tx,
            rejoin_tx,
        );
        (action, rx, rejoin_rx)
    }

    #[test]
    fn test_take_once() {
        let mut table = PendingActions::new();
        let (action, _rx, _rejoin) = entry();
        table.insert("T1".into(), action);

        assert_eq!(table.len(), 1);
        assert!(table.take(&"T2".into()).is_none());
        assert!(table.take(&"T1".into()).is_some());
        assert!(table.take(&"T1".into()).is_none());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_returns_rejoin_waiter() {
        let (action, rx, rejoin_rx) = entry();

        let rejoin = action.resolve(ActionOutcome::Confirmed);
        assert_eq!(rx.await.unwrap(), ActionOutcome::Confirmed);

        rejoin.send(RejoinOutcome::TimedOut).unwrap();
        assert_eq!(rejoin_rx.await.unwrap(), RejoinOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_resolve_all_with_dropped_receivers() {
        let (action, rx, rejoin_rx) = entry();
        drop(rx);
        drop(rejoin_rx);
        action.resolve_all(ActionOutcome::Superseded, RejoinOutcome::Superseded);
    }

    #[test]
    fn test_drain() {
        let mut table = PendingActions::new();
        let (a, _ra, _ja) = entry();
        let (b, _rb, _jb) = entry();
        table.insert("T1".into(), a);
        table.insert("T2".into(), b);

        assert_eq!(table.drain().len(), 2);
        assert_eq!(table.len(), 0);
    }
}
