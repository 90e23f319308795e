//! # Hue Reset Orchestrator
//!
//! Drives a device through factory reset and network rejoin over the
//! bridge control channel.
//!
//! ## Purpose
//!
//! A canonical serial comes in; the orchestrator publishes a reset action,
//! correlates the bridge's asynchronous response by transaction id, opens a
//! join window, and watches network telemetry until the device rejoins.
//! Outcomes are reported through a status sink, never by blocking.
//!
//! ## State Machine
//!
//! ```text
//! [Idle] ──submit──→ [RequestSent] ──publish ok──→ [AwaitingActionResponse]
//!                                                     │        │        │
//!                                              status=ok  status=error  40s
//!                                                     ↓        ↓        ↓
//!                                            [ActionConfirmed] [ActionFailed] [ActionTimedOut]
//!                                                     │
//!                                          publish permit_join
//!                                                     ↓
//!                        [JoinWindowRequested] → [JoinWindowConfirmed] → [AwaitingRejoin]
//!                                                                          │
//!                                                      device_joined / 120s soft timeout
//!                                                                          ↓
//!                                                                       [Idle]
//! ```
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Serials are exactly 6 chars of `[0-9A-F]` | `domain/serial.rs` - `Serial::parse()` |
//! | Transaction ids unique per process | `domain/transaction.rs` - id sources |
//! | Same serial within 20s is suppressed at acceptance | `domain/gate.rs` - `try_accept()` |
//! | Responses without a transaction never match | `service/orchestrator.rs` - `on_action_response()` |
//! | Superseding resolves the prior waiter and cancels its timer | `service/orchestrator.rs` - `supersede_cycle()` |
//! | At most one request and one watch live at a time | `domain/state.rs` |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - tokio timers, status sinks                         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - StatusSink, TimeSource, ResetMetrics       │
//! │  domain/timer.rs   - TimerScheduler                             │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/   - Serial, ResetRequest, RejoinWatch, PendingActions  │
//! │  router.rs - inbound classification and lenient parsing         │
//! │  service/  - ResetOrchestrator, OrchestratorRunner              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod router;
pub mod service;

pub use adapters::{
    ChannelStatusSink, RecordingTimerScheduler, TokioTimerScheduler, TracingStatusSink,
};
pub use config::{ConfigError, OrchestratorConfig};
pub use domain::{
    normalize, serial_from_qr_text, serial_from_z_hex, ActionOutcome, MatchConfidence,
    OrchestratorPhase, RejoinOutcome, RejoinWatch, RequestState, ResetRequest, ScanSource,
    SequentialTransactionIds, Serial, TimerId, TimerScheduler, TransactionId,
    TransactionIdSource, UuidTransactionIds, WatchState,
};
pub use error::ResetError;
pub use ports::{
    LogLevel, ManualClock, NoOpMetrics, ResetMetrics, StatusEvent, StatusSink, SystemTimeSource,
    TimeSource, TokioTimeSource,
};
pub use router::{BridgeEvent, BridgeEventKind, EventRouter, RoutedMessage};
pub use service::{
    OrchestratorBuilder, OrchestratorHandle, OrchestratorRunner, OrchestratorSnapshot,
    ResetOrchestrator, ResetTicket, Submission,
};

/// Same-serial suppression window.
pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 20_000;

/// Time allowed for the bridge to answer a reset action.
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 40_000;

/// Length of the join window requested after a confirmed reset.
pub const DEFAULT_JOIN_WINDOW_SECS: u32 = 120;

/// Time allowed for the reset device to rejoin.
pub const DEFAULT_REJOIN_TIMEOUT_MS: u64 = 120_000;

/// Bridge action name used for the reset request.
pub const DEFAULT_RESET_ACTION: &str = "factory_reset";
