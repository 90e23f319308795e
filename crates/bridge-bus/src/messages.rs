//! # Wire Messages
//!
//! JSON shapes exchanged with the bridge. Outbound requests serialize
//! exactly; inbound messages deserialize leniently (unknown fields are
//! ignored, optional fields default to `None`).

use serde::{Deserialize, Deserializer, Serialize};

/// Reset action published to `{base}/bridge/request/action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetActionRequest {
    /// Bridge action name.
    pub action: String,
    /// Action parameters.
    pub params: ResetParams,
    /// Correlation token echoed back in the response.
    pub transaction: String,
}

/// Parameters of the reset action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetParams {
    /// Serials to reset. The reset flow always sends exactly one.
    pub serial_numbers: Vec<String>,
    /// Network to direct the reset at, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_pan_id: Option<String>,
}

/// Join-window request published to `{base}/bridge/request/permit_join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitJoinRequest {
    /// Window length in seconds.
    pub time: u32,
}

/// Status carried by bridge responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
    /// Any other status string.
    #[serde(other)]
    Unknown,
}

/// Response on `{base}/bridge/response/action` or `.../permit_join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Echoed correlation token. Bridges may send it as a string or a number.
    #[serde(
        default,
        deserialize_with = "transaction_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl BridgeResponse {
    /// Successful response for `transaction`.
    #[must_use]
    pub fn ok(transaction: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            error: None,
            transaction: Some(transaction.into()),
            data: None,
        }
    }

    /// Error response for `transaction`.
    #[must_use]
    pub fn error(transaction: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            error: Some(error.into()),
            transaction: Some(transaction.into()),
            data: None,
        }
    }
}

fn transaction_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Event on `{base}/bridge/event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: BridgeEventData,
}

/// Payload of a bridge event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ieee_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl BridgeEventMessage {
    /// Event of `kind` about the device at `ieee_address`.
    #[must_use]
    pub fn device(kind: impl Into<String>, ieee_address: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: BridgeEventData {
                ieee_address: Some(ieee_address.into()),
                ..BridgeEventData::default()
            },
        }
    }
}
