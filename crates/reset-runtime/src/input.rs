//! Operator input: one command per stdin line.
//!
//! | Line | Meaning |
//! |------|---------|
//! | `qr <text>` | Scanned QR payload; serial extracted from it |
//! | `status` | Print the orchestrator snapshot |
//! | `metrics` | Print the Prometheus exposition |
//! | `quit` / `exit` | Stop |
//! | anything else | Manually typed serial |

use hr_orchestrator::{serial_from_qr_text, ScanSource, Serial};
use thiserror::Error;

/// Identical QR text within this window is ignored.
pub const QR_DEBOUNCE_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Qr(String),
    Manual(String),
    Status,
    Metrics,
    Quit,
    Empty,
}

impl InputCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head.to_ascii_lowercase().as_str() {
            "qr" => Self::Qr(rest.to_string()),
            "status" if rest.is_empty() => Self::Status,
            "metrics" if rest.is_empty() => Self::Metrics,
            "quit" | "exit" if rest.is_empty() => Self::Quit,
            _ => Self::Manual(line.to_string()),
        }
    }
}

/// Why a line produced no serial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Enter a 6-character serial (hex).")]
    InvalidManualSerial,

    #[error("QR detected, but no Z field or serial found.")]
    NoSerialInQr,
}

/// Serial and source for a `qr` or manual line.
pub fn resolve_serial(command: &InputCommand) -> Option<Result<(Serial, ScanSource), InputError>> {
    match command {
        InputCommand::Qr(text) => Some(
            serial_from_qr_text(text)
                .map(|serial| (serial, ScanSource::Qr))
                .ok_or(InputError::NoSerialInQr),
        ),
        InputCommand::Manual(text) => Some(
            Serial::parse(text)
                .map(|serial| (serial, ScanSource::Manual))
                .map_err(|_| InputError::InvalidManualSerial),
        ),
        _ => None,
    }
}

/// Drops a QR payload seen again within the window.
#[derive(Debug)]
pub struct QrDebounce {
    window_ms: u64,
    last: Option<(String, u64)>,
}

impl QrDebounce {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last: None,
        }
    }

    /// `true` if `text` should be processed. Records it when so.
    pub fn admit(&mut self, text: &str, now_ms: u64) -> bool {
        if let Some((last_text, at)) = &self.last {
            if last_text == text && now_ms.saturating_sub(*at) < self.window_ms {
                return false;
            }
        }
        self.last = Some((text.to_string(), now_ms));
        true
    }
}

impl Default for QrDebounce {
    fn default() -> Self {
        Self::new(QR_DEBOUNCE_MS)
    }
}
