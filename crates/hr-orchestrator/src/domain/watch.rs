//! # Rejoin Watch
//!
//! Correlates network-wide leave/join telemetry with the device that was
//! just reset. The bridge does not filter telemetry per device, so the match
//! is best-effort:
//!
//! ```text
//! [Watching] ──device_leave X (first)──→ [Watching, expected = X]
//!     │                                        │
//!     │ device_joined Y                        │ device_joined Y == X
//!     ↓ (assumed)                              ↓ (matched)
//! [Resolved] ←─────────────────────────────────┘
//!
//! device_joined Y != X  → logged, stays Watching
//! timer                 → [TimedOut] (soft outcome)
//! newer watch           → [Superseded]
//! ```

use std::fmt;

use serde::Serialize;

use super::event::{BridgeEvent, BridgeEventKind};
use super::serial::{ScanSource, Serial};

/// Lifecycle of a rejoin watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WatchState {
    Watching,
    Resolved,
    TimedOut,
    Superseded,
}

/// How sure the watch is that the joined device is the reset one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchConfidence {
    /// Joined address equals the address captured from `device_leave`.
    Matched,
    /// No leave was seen; the first join was taken as the device.
    Assumed,
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => f.write_str("matched"),
            Self::Assumed => f.write_str("assumed"),
        }
    }
}

/// Result of feeding one event to a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStep {
    /// The event does not affect the watch.
    Ignored,
    /// A leave narrowed the expected identity.
    IdentityCaptured(String),
    /// The device rejoined.
    Resolved {
        ieee_address: String,
        confidence: MatchConfidence,
    },
    /// A different device joined; the watch keeps waiting.
    Mismatch { expected: String, actual: String },
}

/// How a rejoin watch ended, as seen by the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejoinOutcome {
    Rejoined {
        ieee_address: String,
        confidence: MatchConfidence,
    },
    /// The watch expired; the reset itself already succeeded.
    TimedOut,
    /// A newer submission replaced this cycle.
    Superseded,
    /// No watch was started (the reset failed or the join window could not
    /// be requested).
    Abandoned,
}

impl RejoinOutcome {
    /// Label used for metrics and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejoined { .. } => "rejoined",
            Self::TimedOut => "timed_out",
            Self::Superseded => "superseded",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Rejoin watch for one reset device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejoinWatch {
    /// Process-unique watch number, used to key its timer.
    pub id: u64,
    pub serial: Serial,
    pub source: ScanSource,
    pub expected_ieee: Option<String>,
    /// Start time in milliseconds of the orchestrator clock.
    pub started_at: u64,
    pub state: WatchState,
}

impl RejoinWatch {
    pub fn start(id: u64, serial: Serial, source: ScanSource, started_at: u64) -> Self {
        Self {
            id,
            serial,
            source,
            expected_ieee: None,
            started_at,
            state: WatchState::Watching,
        }
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.state == WatchState::Watching
    }

    /// Feed one bridge event to the watch.
    pub fn observe(&mut self, event: &BridgeEvent) -> WatchStep {
        if !self.is_watching() {
            return WatchStep::Ignored;
        }
        let Some(ieee) = event.ieee_address.as_deref() else {
            return WatchStep::Ignored;
        };

        match (&event.kind, self.expected_ieee.as_deref()) {
            (BridgeEventKind::DeviceLeave, None) => {
                self.expected_ieee = Some(ieee.to_string());
                WatchStep::IdentityCaptured(ieee.to_string())
            }
            (BridgeEventKind::DeviceJoined, None) => {
                self.expected_ieee = Some(ieee.to_string());
                self.state = WatchState::Resolved;
                WatchStep::Resolved {
                    ieee_address: ieee.to_string(),
                    confidence: MatchConfidence::Assumed,
                }
            }
            (BridgeEventKind::DeviceJoined, Some(expected)) if expected == ieee => {
                self.state = WatchState::Resolved;
                WatchStep::Resolved {
                    ieee_address: ieee.to_string(),
                    confidence: MatchConfidence::Matched,
                }
            }
            (BridgeEventKind::DeviceJoined, Some(expected)) => WatchStep::Mismatch {
                expected: expected.to_string(),
                actual: ieee.to_string(),
            },
            _ => WatchStep::Ignored,
        }
    }

    /// Expire the watch. Returns `false` when it had already ended.
    pub fn expire(&mut self) -> bool {
        self.end(WatchState::TimedOut)
    }

    /// Supersede the watch. Returns `false` when it had already ended.
    pub fn supersede(&mut self) -> bool {
        self.end(WatchState::Superseded)
    }

    fn end(&mut self, state: WatchState) -> bool {
        if !self.is_watching() {
            return false;
        }
        self.state = state;
        true
    }
}
