//! Adapters for the orchestrator's outbound ports.

pub mod status;
pub mod timers;

pub use status::{ChannelStatusSink, TracingStatusSink};
pub use timers::{RecordingTimerScheduler, TokioTimerScheduler};
