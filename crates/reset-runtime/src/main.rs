//! # Hue Reset
//!
//! Factory-resets Zigbee lights through a zigbee2mqtt bridge and confirms
//! they rejoin.
//!
//! ## Flow
//!
//! ```text
//! stdin ──serial──→ orchestrator ──bridge/request/action──→ bridge
//!                        ↑                                     │
//!                        └──bridge/response/*, bridge/event────┘
//! ```
//!
//! Type a serial, paste `qr <payload>`, or use `status`, `metrics`, `quit`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hr_orchestrator::TracingStatusSink;
use reset_runtime::{Cli, ResetRuntime, RuntimeConfig};
use reset_telemetry::{init_telemetry, TelemetryConfig};
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &cli.log_level {
        telemetry = telemetry.with_log_level(level.as_str());
    }
    if cli.json_logs {
        telemetry = telemetry.with_json_logs(true);
    }
    let _telemetry = init_telemetry(telemetry).context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::load(&cli).context("Invalid configuration")?;
    info!(
        client_id = %config.client_id(),
        url = %config.mqtt.url,
        base_topic = %config.base_topic,
        "Configuration loaded"
    );

    let runtime = ResetRuntime::new(config, Arc::new(TracingStatusSink));
    let stdin = BufReader::new(tokio::io::stdin());
    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupted"),
            Err(e) => {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    runtime
        .run_until(stdin, tokio::io::stdout(), interrupted)
        .await
}
