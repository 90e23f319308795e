//! Timer scheduler implementations.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::domain::{TimerId, TimerScheduler};

/// Runs each timer as a sleeping tokio task that posts its id on expiry.
///
/// Cancelling aborts the task. Must be used from within a tokio runtime.
pub struct TokioTimerScheduler {
    expired: mpsc::UnboundedSender<TimerId>,
    tasks: Mutex<HashMap<TimerId, JoinHandle<()>>>,
}

impl TokioTimerScheduler {
    /// Create a scheduler posting expiries to `expired`.
    pub fn new(expired: mpsc::UnboundedSender<TimerId>) -> Self {
        Self {
            expired,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of timers not yet cancelled.
    pub fn armed(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl TimerScheduler for TokioTimerScheduler {
    fn schedule(&self, id: TimerId, delay: Duration) {
        let expired = self.expired.clone();
        let fired = id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if expired.send(fired).is_err() {
                trace!("Timer expired after dispatch loop stopped");
            }
        });

        if let Some(previous) = self.tasks.lock().insert(id.clone(), task) {
            previous.abort();
        }
        debug!(timer = %id, delay_ms = delay.as_millis() as u64, "Timer armed");
    }

    fn cancel(&self, id: &TimerId) {
        if let Some(task) = self.tasks.lock().remove(id) {
            task.abort();
            debug!(timer = %id, "Timer cancelled");
        }
    }
}

impl Drop for TokioTimerScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.lock().drain() {
            task.abort();
        }
    }
}

/// Records schedule/cancel calls without running anything.
///
/// Tests fire a timer by passing its id to the orchestrator directly.
#[derive(Debug, Default)]
pub struct RecordingTimerScheduler {
    armed: Mutex<HashMap<TimerId, Duration>>,
    cancelled: Mutex<Vec<TimerId>>,
}

impl RecordingTimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_armed(&self, id: &TimerId) -> bool {
        self.armed.lock().contains_key(id)
    }

    /// Delay `id` was armed with, if armed.
    #[must_use]
    pub fn delay_of(&self, id: &TimerId) -> Option<Duration> {
        self.armed.lock().get(id).copied()
    }

    /// Currently armed timers.
    #[must_use]
    pub fn armed(&self) -> Vec<TimerId> {
        self.armed.lock().keys().cloned().collect()
    }

    /// Every cancel call, in order.
    #[must_use]
    pub fn cancelled(&self) -> Vec<TimerId> {
        self.cancelled.lock().clone()
    }
}

impl TimerScheduler for RecordingTimerScheduler {
    fn schedule(&self, id: TimerId, delay: Duration) {
        self.armed.lock().insert(id, delay);
    }

    fn cancel(&self, id: &TimerId) {
        self.armed.lock().remove(id);
        self.cancelled.lock().push(id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = TokioTimerScheduler::new(tx);

        timers.schedule(TimerId::Rejoin(1), Duration::from_secs(120));
        assert_eq!(timers.armed(), 1);

        assert_eq!(rx.recv().await, Some(TimerId::Rejoin(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = TokioTimerScheduler::new(tx);

        timers.schedule(TimerId::Rejoin(1), Duration::from_secs(1));
        timers.cancel(&TimerId::Rejoin(1));
        assert_eq!(timers.armed(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_reschedule_replaces() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = TokioTimerScheduler::new(tx);

        timers.schedule(TimerId::Rejoin(7), Duration::from_secs(1));
        timers.schedule(TimerId::Rejoin(7), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(rx.try_recv().ok(), Some(TimerId::Rejoin(7)));
    }

    #[test]
    fn test_recording_scheduler() {
        let timers = RecordingTimerScheduler::new();
        let id = TimerId::ActionResponse("T1".into());

        timers.schedule(id.clone(), Duration::from_secs(40));
        assert_eq!(timers.delay_of(&id), Some(Duration::from_secs(40)));

        timers.cancel(&id);
        assert!(!timers.is_armed(&id));
        assert_eq!(timers.cancelled(), vec![id]);
    }
}
