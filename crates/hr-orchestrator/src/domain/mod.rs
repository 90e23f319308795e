//! Domain layer: serials, requests, watches, and the pending table.

pub mod event;
pub mod gate;
pub mod pending;
pub mod request;
pub mod serial;
pub mod state;
pub mod timer;
pub mod transaction;
pub mod watch;

pub use event::{BridgeEvent, BridgeEventKind};
pub use gate::SubmissionGate;
pub use pending::{PendingAction, PendingActions};
pub use request::{ActionOutcome, RequestState, ResetRequest};
pub use serial::{
    extract_serial_from_qr, extract_z_field, normalize, serial_from_qr_text, serial_from_z_hex,
    serial_from_z_hex_with, ScanSource, Serial, SERIAL_LEN,
};
pub use state::{ActiveWatch, OrchestratorPhase, OrchestratorState};
pub use timer::{TimerId, TimerScheduler};
pub use transaction::{
    SequentialTransactionIds, TransactionId, TransactionIdSource, UuidTransactionIds,
};
pub use watch::{MatchConfidence, RejoinOutcome, RejoinWatch, WatchState, WatchStep};
