//! Transaction ids correlating reset actions with bridge responses.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation token attached to a reset action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Generates transaction ids that never repeat within the process.
pub trait TransactionIdSource: Send + Sync {
    fn next_id(&self) -> TransactionId;
}

/// Random v4 UUID ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTransactionIds;

impl TransactionIdSource for UuidTransactionIds {
    fn next_id(&self) -> TransactionId {
        TransactionId(Uuid::new_v4().to_string())
    }
}

/// Sequential ids `T1`, `T2`, ...
#[derive(Debug, Default)]
pub struct SequentialTransactionIds {
    counter: AtomicU64,
}

impl SequentialTransactionIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionIdSource for SequentialTransactionIds {
    fn next_id(&self) -> TransactionId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        TransactionId(format!("T{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialTransactionIds::new();
        assert_eq!(ids.next_id().as_str(), "T1");
        assert_eq!(ids.next_id().as_str(), "T2");
    }

    #[test]
    fn test_uuid_ids_unique() {
        let ids = UuidTransactionIds;
        let seen: HashSet<_> = (0..100).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 100);
    }
}
