//! # Reset Telemetry
//!
//! Logging and metrics for the reset tooling.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events rendered by `tracing-subscriber`, pretty on a
//!   terminal and JSON when shipped to an aggregator
//! - **Metrics**: Prometheus counters in a process-wide registry, rendered
//!   on demand in the text exposition format
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reset_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HR_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `HR_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `HR_SERVICE_NAME` | `hue-reset` | Service name stamped on startup |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, ACTION_OUTCOMES, PUBLISH_FAILURES,
    REJOIN_OUTCOMES, RESETS_SUBMITTED, RESETS_SUPPRESSED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register the metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first; registration is idempotent.
    let metrics_handle = register_metrics()?;
    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Structured log line carrying the serial under reset.
///
/// ```rust,ignore
/// log_reset_event!(info, "06E49F", "Reset confirmed", transaction = %txn);
/// ```
#[macro_export]
macro_rules! log_reset_event {
    ($level:ident, $serial:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            serial = %$serial,
            $($($field)*,)?
            $msg
        )
    };
}

/// Increment a counter, optionally by label values.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
