//! Same-serial suppression.

use super::serial::Serial;

/// Suppresses re-submission of the last accepted serial within a window.
///
/// The check and the bookkeeping happen in one call, so two detections of
/// the same serial processed back to back cannot both pass.
#[derive(Debug, Clone)]
pub struct SubmissionGate {
    window_ms: u64,
    last_accepted: Option<(Serial, u64)>,
}

impl SubmissionGate {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_accepted: None,
        }
    }

    /// Accept `serial` at `now_ms` unless it repeats the last accepted
    /// serial inside the window. Accepting records `(serial, now_ms)`.
    pub fn try_accept(&mut self, serial: &Serial, now_ms: u64) -> bool {
        if let Some((last, at)) = &self.last_accepted {
            if last == serial && now_ms.saturating_sub(*at) < self.window_ms {
                return false;
            }
        }
        self.last_accepted = Some((serial.clone(), now_ms));
        true
    }

    #[must_use]
    pub fn last_accepted(&self) -> Option<&Serial> {
        self.last_accepted.as_ref().map(|(serial, _)| serial)
    }
}
