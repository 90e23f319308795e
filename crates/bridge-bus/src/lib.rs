//! # Bridge Bus - Control Channel to the Network Bridge
//!
//! Everything the reset flow needs to talk to a bridge over a
//! publish/subscribe channel, without knowing which broker client sits
//! underneath.
//!
//! ## Topic Layout
//!
//! ```text
//!                      {base}/bridge/request/action       ──┐
//!   hue-reset  ──────► {base}/bridge/request/permit_join  ──┤
//!                                                           ▼
//!                                                    ┌──────────────┐
//!                                                    │    Bridge    │
//!                                                    └──────────────┘
//!                                                           │
//!   hue-reset  ◄────── {base}/bridge/response/action      ◄─┤
//!              ◄────── {base}/bridge/response/permit_join ◄─┤
//!              ◄────── {base}/bridge/event                ◄─┘
//! ```
//!
//! ## Contents
//!
//! - [`BridgeTransport`]: the transport port (publish, subscribe, connection state)
//! - [`Subscription`]: inbound `(topic, payload)` stream handed to the dispatcher
//! - [`BridgeTopics`] / [`TopicKind`]: topic construction and suffix classification
//! - [`messages`]: JSON wire shapes for requests, responses and bridge events
//! - [`InMemoryBridge`]: loopback transport for tests and dry runs

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod memory;
pub mod messages;
pub mod subscriber;
pub mod topics;
pub mod transport;

pub use memory::{InMemoryBridge, PublishedMessage, DEFAULT_PUBLISH_HISTORY};
pub use messages::{
    BridgeEventData, BridgeEventMessage, BridgeResponse, PermitJoinRequest, ResetActionRequest,
    ResetParams, ResponseStatus,
};
pub use subscriber::{Subscription, SubscriptionError};
pub use topics::{BridgeTopics, TopicKind};
pub use transport::{BridgeTransport, InboundMessage, TransportError};

/// Maximum inbound messages buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Base topic used by the bridge when none is configured.
pub const DEFAULT_BASE_TOPIC: &str = "zigbee2mqtt";
