//! Prometheus metrics for the reset workflow.
//!
//! All metrics follow the naming convention: `hr_<subject>_<metric>_<unit>`.
//! Everything here is a counter; rates and ratios are left to the query side.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SUBMISSION METRICS
    // =========================================================================

    /// Submissions that passed the duplicate gate
    pub static ref RESETS_SUBMITTED: Counter = Counter::new(
        "hr_resets_submitted_total",
        "Reset submissions accepted by the duplicate gate"
    ).expect("metric creation failed");

    /// Submissions dropped as duplicates
    pub static ref RESETS_SUPPRESSED: Counter = Counter::new(
        "hr_resets_suppressed_total",
        "Reset submissions suppressed as duplicates of a recent serial"
    ).expect("metric creation failed");

    // =========================================================================
    // OUTCOME METRICS
    // =========================================================================

    /// Reset action outcomes
    pub static ref ACTION_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("hr_action_outcomes_total", "Reset action outcomes"),
        &["outcome"]  // confirmed/rejected/timed_out/superseded
    ).expect("metric creation failed");

    /// Rejoin watch outcomes
    pub static ref REJOIN_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("hr_rejoin_outcomes_total", "Rejoin watch outcomes"),
        &["outcome"]  // rejoined/timed_out/superseded/abandoned
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSPORT METRICS
    // =========================================================================

    /// Publishes the transport refused
    pub static ref PUBLISH_FAILURES: Counter = Counter::new(
        "hr_publish_failures_total",
        "Bridge publishes that failed"
    ).expect("metric creation failed");
}

/// Keeps the registry alive for the holder.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics already registered are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RESETS_SUBMITTED.clone()),
        Box::new(RESETS_SUPPRESSED.clone()),
        Box::new(ACTION_OUTCOMES.clone()),
        Box::new(REJOIN_OUTCOMES.clone()),
        Box::new(PUBLISH_FAILURES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
