//! Outbound (driven) ports of the orchestrator.
//!
//! The transport port lives in `bridge-bus`; the timer port in
//! `domain/timer.rs`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::OrchestratorPhase;

/// Severity of a status log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    /// A step completed successfully.
    Ok,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Notification for the caller/UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Log { message: String, level: LogLevel },
    State(OrchestratorPhase),
}

impl StatusEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            level,
        }
    }
}

/// Receives status notifications. Must not block.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

/// Millisecond clock used for dedup and bookkeeping.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Monotonic milliseconds on the tokio clock since construction.
///
/// Follows paused/advanced time in tokio tests, so dedup windows line up
/// with tokio timers.
#[derive(Debug, Clone, Copy)]
pub struct TokioTimeSource {
    origin: tokio::time::Instant,
}

impl TokioTimeSource {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioTimeSource {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Counters describing reset activity.
pub trait ResetMetrics: Send + Sync {
    fn submission_accepted(&self);
    fn submission_suppressed(&self);
    fn action_outcome(&self, outcome: &str);
    fn rejoin_outcome(&self, outcome: &str);
    fn publish_failed(&self);
}

/// Discards all metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl ResetMetrics for NoOpMetrics {
    fn submission_accepted(&self) {}
    fn submission_suppressed(&self) {}
    fn action_outcome(&self, _outcome: &str) {}
    fn rejoin_outcome(&self, _outcome: &str) {}
    fn publish_failed(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        let shared = clock.clone();
        clock.advance(50);
        assert_eq!(shared.now_ms(), 150);
        shared.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_time_source_follows_paused_clock() {
        let time = TokioTimeSource::new();
        tokio::time::advance(std::time::Duration::from_millis(1_500)).await;
        assert_eq!(time.now_ms(), 1_500);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert_eq!(LogLevel::Ok.to_string(), "ok");
    }
}
