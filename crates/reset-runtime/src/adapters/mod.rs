//! Port implementations backed by external systems.

pub mod metrics;
pub mod mqtt;

pub use metrics::PrometheusMetrics;
pub use mqtt::{mqtt_options, MqttBridge};
