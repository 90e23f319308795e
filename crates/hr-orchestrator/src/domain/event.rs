//! Bridge network events relevant to rejoin correlation.

use std::fmt;

use bridge_bus::BridgeEventMessage;

/// Event types the rejoin watch distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEventKind {
    DeviceLeave,
    DeviceJoined,
    DeviceAnnounce,
    DeviceInterview,
    Other(String),
}

impl BridgeEventKind {
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        match kind {
            "device_leave" => Self::DeviceLeave,
            "device_joined" => Self::DeviceJoined,
            "device_announce" => Self::DeviceAnnounce,
            "device_interview" => Self::DeviceInterview,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BridgeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceLeave => f.write_str("device_leave"),
            Self::DeviceJoined => f.write_str("device_joined"),
            Self::DeviceAnnounce => f.write_str("device_announce"),
            Self::DeviceInterview => f.write_str("device_interview"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// A parsed bridge event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEvent {
    pub kind: BridgeEventKind,
    pub ieee_address: Option<String>,
    pub friendly_name: Option<String>,
    pub status: Option<String>,
}

impl BridgeEvent {
    /// Event of `kind` carrying `ieee_address`.
    pub fn device(kind: BridgeEventKind, ieee_address: impl Into<String>) -> Self {
        Self {
            kind,
            ieee_address: Some(ieee_address.into()),
            friendly_name: None,
            status: None,
        }
    }

    /// Best label for the device: friendly name, else address.
    #[must_use]
    pub fn device_label(&self) -> &str {
        self.friendly_name
            .as_deref()
            .or(self.ieee_address.as_deref())
            .unwrap_or("unknown device")
    }
}

impl From<BridgeEventMessage> for BridgeEvent {
    fn from(message: BridgeEventMessage) -> Self {
        let blank_to_none = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            kind: BridgeEventKind::parse(&message.kind),
            ieee_address: blank_to_none(message.data.ieee_address),
            friendly_name: blank_to_none(message.data.friendly_name),
            status: blank_to_none(message.data.status),
        }
    }
}
