//! Ports (hexagonal architecture boundaries).

pub mod outbound;

pub use outbound::{
    LogLevel, ManualClock, NoOpMetrics, ResetMetrics, StatusEvent, StatusSink, SystemTimeSource,
    TimeSource, TokioTimeSource,
};
