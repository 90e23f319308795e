//! # Bridge Topics
//!
//! Builds request/response topic names from a configurable base and
//! classifies inbound topics by suffix.

use std::fmt;

use crate::DEFAULT_BASE_TOPIC;

const ACTION_REQUEST: &str = "/bridge/request/action";
const PERMIT_JOIN_REQUEST: &str = "/bridge/request/permit_join";
const ACTION_RESPONSE: &str = "/bridge/response/action";
const PERMIT_JOIN_RESPONSE: &str = "/bridge/response/permit_join";
const BRIDGE_EVENT: &str = "/bridge/event";

/// Category of an inbound topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Reply to a `bridge/request/action` publish.
    ActionResponse,
    /// Reply to a `bridge/request/permit_join` publish.
    JoinWindowResponse,
    /// Network telemetry (`device_leave`, `device_joined`, ...).
    BridgeEvent,
    /// Anything else delivered on a subscribed topic.
    Other,
}

impl TopicKind {
    /// Classify a topic by suffix.
    ///
    /// Only the suffix is inspected so that responses are recognised
    /// regardless of which base topic the bridge was configured with.
    #[must_use]
    pub fn classify(topic: &str) -> Self {
        if topic.ends_with(ACTION_RESPONSE) {
            Self::ActionResponse
        } else if topic.ends_with(PERMIT_JOIN_RESPONSE) {
            Self::JoinWindowResponse
        } else if topic.ends_with(BRIDGE_EVENT) {
            Self::BridgeEvent
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ActionResponse => "action-response",
            Self::JoinWindowResponse => "join-window-response",
            Self::BridgeEvent => "bridge-event",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Topic names rooted at a base topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTopics {
    base: String,
}

impl BridgeTopics {
    /// Create topics for `base`, falling back to the default when blank.
    ///
    /// Surrounding whitespace and trailing slashes are removed.
    #[must_use]
    pub fn new(base: &str) -> Self {
        let trimmed = base.trim().trim_end_matches('/');
        let base = if trimmed.is_empty() {
            DEFAULT_BASE_TOPIC
        } else {
            trimmed
        };
        Self {
            base: base.to_string(),
        }
    }

    /// The base topic.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Topic the reset action is published to.
    #[must_use]
    pub fn action_request(&self) -> String {
        format!("{}{}", self.base, ACTION_REQUEST)
    }

    /// Topic the join-window request is published to.
    #[must_use]
    pub fn permit_join_request(&self) -> String {
        format!("{}{}", self.base, PERMIT_JOIN_REQUEST)
    }

    /// Topic carrying action responses.
    #[must_use]
    pub fn action_response(&self) -> String {
        format!("{}{}", self.base, ACTION_RESPONSE)
    }

    /// Topic carrying join-window responses.
    #[must_use]
    pub fn permit_join_response(&self) -> String {
        format!("{}{}", self.base, PERMIT_JOIN_RESPONSE)
    }

    /// Topic carrying bridge events.
    #[must_use]
    pub fn bridge_event(&self) -> String {
        format!("{}{}", self.base, BRIDGE_EVENT)
    }

    /// Every inbound topic the reset flow listens on.
    #[must_use]
    pub fn inbound(&self) -> Vec<String> {
        vec![
            self.action_response(),
            self.permit_join_response(),
            self.bridge_event(),
        ]
    }
}

impl Default for BridgeTopics {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TOPIC)
    }
}
