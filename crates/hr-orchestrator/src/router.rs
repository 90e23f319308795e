//! # Event Router
//!
//! Classifies inbound messages by topic suffix and parses their payloads.
//! Parsing never fails the caller: a payload that does not decode for its
//! topic becomes [`RoutedMessage::Malformed`] carrying the raw text.

use bridge_bus::{BridgeEventMessage, BridgeResponse, InboundMessage, TopicKind};
use tracing::trace;

pub use crate::domain::{BridgeEvent, BridgeEventKind};

/// An inbound message after classification and parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedMessage {
    ActionResponse(BridgeResponse),
    JoinWindowResponse(BridgeResponse),
    BridgeEvent(BridgeEvent),
    /// Subscribed topic the reset flow does not interpret.
    Other { topic: String },
    /// Payload did not decode for its topic.
    Malformed {
        topic: String,
        kind: TopicKind,
        raw: String,
        reason: String,
    },
}

/// Stateless inbound classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventRouter;

impl EventRouter {
    pub fn new() -> Self {
        Self
    }

    /// Classify and parse `message`.
    pub fn route(&self, message: &InboundMessage) -> RoutedMessage {
        let kind = TopicKind::classify(&message.topic);
        trace!(topic = %message.topic, kind = %kind, "Routing inbound message");

        let routed = match kind {
            TopicKind::ActionResponse => {
                Self::decode::<BridgeResponse>(message, kind).map(RoutedMessage::ActionResponse)
            }
            TopicKind::JoinWindowResponse => Self::decode::<BridgeResponse>(message, kind)
                .map(RoutedMessage::JoinWindowResponse),
            TopicKind::BridgeEvent => Self::decode::<BridgeEventMessage>(message, kind)
                .map(|event| RoutedMessage::BridgeEvent(event.into())),
            TopicKind::Other => Ok(RoutedMessage::Other {
                topic: message.topic.clone(),
            }),
        };
        routed.unwrap_or_else(|malformed| malformed)
    }

    fn decode<T: serde::de::DeserializeOwned>(
        message: &InboundMessage,
        kind: TopicKind,
    ) -> Result<T, RoutedMessage> {
        serde_json::from_slice(&message.payload).map_err(|e| RoutedMessage::Malformed {
            topic: message.topic.clone(),
            kind,
            raw: message.payload_text(),
            reason: e.to_string(),
        })
    }

    /// One-line rendering of an inbound message: compact JSON when the
    /// payload parses, the verbatim text otherwise.
    #[must_use]
    pub fn describe(message: &InboundMessage) -> String {
        let body = serde_json::from_slice::<serde_json::Value>(&message.payload)
            .map(|value| value.to_string())
            .unwrap_or_else(|_| message.payload_text());
        format!("Response on {}: {}", message.topic, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_bus::ResponseStatus;

    fn inbound(topic: &str, payload: &str) -> InboundMessage {
        InboundMessage::new(topic, payload)
    }

    #[test]
    fn test_action_response() {
        let routed = EventRouter::new().route(&inbound(
            "zigbee2mqtt/bridge/response/action",
            r#"{"status":"ok","transaction":"T1"}"#,
        ));
        match routed {
            RoutedMessage::ActionResponse(response) => {
                assert_eq!(response.status, ResponseStatus::Ok);
                assert_eq!(response.transaction.as_deref(), Some("T1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_join_window_response() {
        let routed = EventRouter::new().route(&inbound(
            "zigbee2mqtt/bridge/response/permit_join",
            r#"{"status":"ok","data":{"time":120}}"#,
        ));
        assert!(matches!(routed, RoutedMessage::JoinWindowResponse(_)));
    }

    #[test]
    fn test_bridge_event() {
        let routed = EventRouter::new().route(&inbound(
            "zigbee2mqtt/bridge/event",
            r#"{"type":"device_leave","data":{"ieee_address":"0x1"}}"#,
        ));
        assert_eq!(
            routed,
            RoutedMessage::BridgeEvent(BridgeEvent::device(BridgeEventKind::DeviceLeave, "0x1"))
        );
    }

    #[test]
    fn test_malformed_payload_kept_verbatim() {
        let routed =
            EventRouter::new().route(&inbound("zigbee2mqtt/bridge/response/action", "not json"));
        match routed {
            RoutedMessage::Malformed { kind, raw, .. } => {
                assert_eq!(kind, TopicKind::ActionResponse);
                assert_eq!(raw, "not json");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_event_missing_type_is_malformed() {
        let routed = EventRouter::new().route(&inbound(
            "zigbee2mqtt/bridge/event",
            r#"{"data":{"ieee_address":"0x1"}}"#,
        ));
        assert!(matches!(routed, RoutedMessage::Malformed { .. }));
    }

    #[test]
    fn test_other_topic() {
        let routed = EventRouter::new().route(&inbound("zigbee2mqtt/bridge/state", "online"));
        assert_eq!(
            routed,
            RoutedMessage::Other {
                topic: "zigbee2mqtt/bridge/state".into()
            }
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            EventRouter::describe(&inbound("t", r#"{ "status" : "ok" }"#)),
            r#"Response on t: {"status":"ok"}"#
        );
        assert_eq!(
            EventRouter::describe(&inbound("t", "plain")),
            "Response on t: plain"
        );
    }
}
