//! Prometheus-backed [`ResetMetrics`].

use hr_orchestrator::ResetMetrics;
use reset_telemetry::{
    metric_inc, ACTION_OUTCOMES, PUBLISH_FAILURES, REJOIN_OUTCOMES, RESETS_SUBMITTED,
    RESETS_SUPPRESSED,
};

/// Records orchestrator activity in the global Prometheus registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl ResetMetrics for PrometheusMetrics {
    fn submission_accepted(&self) {
        metric_inc!(RESETS_SUBMITTED);
    }

    fn submission_suppressed(&self) {
        metric_inc!(RESETS_SUPPRESSED);
    }

    fn action_outcome(&self, outcome: &str) {
        metric_inc!(ACTION_OUTCOMES, &[outcome]);
    }

    fn rejoin_outcome(&self, outcome: &str) {
        metric_inc!(REJOIN_OUTCOMES, &[outcome]);
    }

    fn publish_failed(&self) {
        metric_inc!(PUBLISH_FAILURES);
    }
}
