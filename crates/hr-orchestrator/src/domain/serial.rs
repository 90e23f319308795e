//! # Serial Normalizer
//!
//! Canonical serials are exactly six uppercase hex characters. They are
//! either typed/printed literally or derived from the hashed `Z:` field of
//! a device QR code: the field's bytes are hashed with SHA-256 and the
//! first three digest bytes rendered as hex.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ResetError;

/// Length of a canonical serial.
pub const SERIAL_LEN: usize = 6;

/// Minimum hex run accepted after `Z:`.
const Z_FIELD_MIN_LEN: usize = 8;

/// A canonical six-character uppercase hex serial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Serial(String);

impl Serial {
    /// Normalize `raw` into a serial.
    ///
    /// Non-hex characters are dropped and the rest upper-cased; the result
    /// must be exactly six characters.
    pub fn parse(raw: &str) -> Result<Self, ResetError> {
        let cleaned: String = raw
            .to_uppercase()
            .chars()
            .filter(char::is_ascii_hexdigit)
            .collect();

        if cleaned.len() == SERIAL_LEN {
            Ok(Self(cleaned))
        } else {
            Err(ResetError::InvalidSerial {
                input: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Serial {
    type Error = ResetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Serial> for String {
    fn from(serial: Serial) -> Self {
        serial.0
    }
}

/// Canonicalize `raw`, or `None` when it is not a serial.
#[must_use]
pub fn normalize(raw: &str) -> Option<String> {
    Serial::parse(raw).ok().map(String::from)
}

/// Where a serial was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Qr,
    Manual,
}

impl fmt::Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qr => f.write_str("qr"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn at_word_start(chars: &[char], index: usize) -> bool {
    index == 0 || !is_word_char(chars[index - 1])
}

fn at_word_end(chars: &[char], index: usize) -> bool {
    index == chars.len() || !is_word_char(chars[index])
}

/// Hex run following a `Z:` marker at a word boundary.
///
/// The run must be at least eight hex characters and is returned upper-cased.
#[must_use]
pub fn extract_z_field(text: &str) -> Option<String> {
    let chars: Vec<char> = text.to_uppercase().chars().collect();

    (0..chars.len()).find_map(|start| {
        if chars.get(start) != Some(&'Z')
            || chars.get(start + 1) != Some(&':')
            || !at_word_start(&chars, start)
        {
            return None;
        }
        let run: String = chars[start + 2..]
            .iter()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        (run.len() >= Z_FIELD_MIN_LEN).then_some(run)
    })
}

/// First standalone six-hex-character token in `text`.
#[must_use]
pub fn extract_serial_from_qr(text: &str) -> Option<Serial> {
    let chars: Vec<char> = text.to_uppercase().chars().collect();
    if chars.len() < SERIAL_LEN {
        return None;
    }

    (0..=chars.len() - SERIAL_LEN).find_map(|start| {
        let end = start + SERIAL_LEN;
        let window = &chars[start..end];
        let standalone = at_word_start(&chars, start) && at_word_end(&chars, end);
        if standalone && window.iter().all(char::is_ascii_hexdigit) {
            Some(Serial(window.iter().collect()))
        } else {
            None
        }
    })
}

/// Derive a serial from a hashed hex payload using SHA-256.
#[must_use]
pub fn serial_from_z_hex(z_hex: &str) -> Option<Serial> {
    serial_from_z_hex_with::<Sha256>(z_hex)
}

/// Derive a serial from a hashed hex payload with digest `D`.
///
/// The payload must be non-empty, even-length hex.
#[must_use]
pub fn serial_from_z_hex_with<D: Digest>(z_hex: &str) -> Option<Serial> {
    let clean = z_hex.trim();
    if clean.is_empty() {
        return None;
    }
    let bytes = hex::decode(clean).ok()?;
    let digest = D::digest(&bytes);
    let prefix = digest.get(..3)?;
    Some(Serial(hex::encode_upper(prefix)))
}

/// Serial encoded in QR text: derived from the `Z:` field when present,
/// otherwise the first standalone six-hex token.
#[must_use]
pub fn serial_from_qr_text(text: &str) -> Option<Serial> {
    match extract_z_field(text) {
        Some(z_hex) => serial_from_z_hex(&z_hex),
        None => extract_serial_from_qr(text),
    }
}
