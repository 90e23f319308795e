//! # Reset Runtime
//!
//! Wires configuration, transport, orchestrator and operator input.
//!
//! ## Startup Sequence
//!
//! 1. Pick the transport: MQTT broker, or the in-memory loopback for dry runs
//! 2. Spawn the orchestrator dispatch loop
//! 3. Read operator commands until `quit`, end of input or a shutdown signal
//! 4. Shut the loop down, then the transport

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use bridge_bus::{BridgeTransport, InMemoryBridge};
use hr_orchestrator::{
    LogLevel, OrchestratorBuilder, OrchestratorHandle, ResetError, ResetTicket, StatusEvent,
    StatusSink, Submission, SystemTimeSource, TimeSource,
};
use reset_telemetry::log_reset_event;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::adapters::{MqttBridge, PrometheusMetrics};
use crate::config::RuntimeConfig;
use crate::input::{resolve_serial, InputCommand, QrDebounce};

enum Connection {
    Mqtt {
        bridge: Arc<MqttBridge>,
        task: JoinHandle<()>,
    },
    Loopback(Arc<InMemoryBridge>),
}

impl Connection {
    fn transport(&self) -> Arc<dyn BridgeTransport> {
        match self {
            Self::Mqtt { bridge, .. } => Arc::clone(bridge) as Arc<dyn BridgeTransport>,
            Self::Loopback(bridge) => Arc::clone(bridge) as Arc<dyn BridgeTransport>,
        }
    }

    async fn close(self) {
        match self {
            Self::Mqtt { bridge, task } => {
                bridge.disconnect().await;
                if let Err(e) = task.await {
                    debug!(error = %e, "MQTT connection task ended abnormally");
                }
            }
            Self::Loopback(bridge) => {
                debug!(
                    published = bridge.published().len(),
                    "Loopback transport closed"
                );
            }
        }
    }
}

/// The `hue-reset` application.
pub struct ResetRuntime {
    config: RuntimeConfig,
    status: Arc<dyn StatusSink>,
    loopback: Option<Arc<InMemoryBridge>>,
    clock: Arc<dyn TimeSource>,
}

impl ResetRuntime {
    pub fn new(config: RuntimeConfig, status: Arc<dyn StatusSink>) -> Self {
        Self {
            config,
            status,
            loopback: None,
            clock: Arc::new(SystemTimeSource),
        }
    }

    /// Use `bridge` as the transport regardless of configuration.
    #[must_use]
    pub fn with_loopback(mut self, bridge: Arc<InMemoryBridge>) -> Self {
        self.loopback = Some(bridge);
        self
    }

    /// Clock for the QR debounce.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Run until `quit` or end of `input`. Command output goes to `output`.
    pub async fn run<R, W>(self, input: R, output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.run_until(input, output, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but also stops when `shutdown` completes.
    /// Outstanding waiters are resolved and the transport is closed either way.
    pub async fn run_until<R, W, S>(self, input: R, mut output: W, shutdown: S) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        info!("===========================================");
        info!("  Hue Reset v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let _metrics = reset_telemetry::register_metrics()?;
        let connection = self.connect()?;
        let loopback = matches!(connection, Connection::Loopback(_));
        let topics = self.config.topics();
        info!(base_topic = %topics.base(), dry_run = loopback, "Starting orchestrator");

        let (handle, dispatch) =
            OrchestratorBuilder::new(connection.transport(), Arc::clone(&self.status))
                .config(self.config.orchestrator.clone())
                .topics(topics)
                .metrics(Arc::new(PrometheusMetrics))
                .subscribe_on_start(loopback)
                .spawn();

        let result = self
            .read_commands(&handle, input, &mut output, shutdown)
            .await;

        handle.shutdown().await;
        if let Err(e) = dispatch.await {
            debug!(error = %e, "Dispatch loop ended abnormally");
        }
        connection.close().await;
        info!("Shutdown complete");
        result
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(bridge) = &self.loopback {
            return Ok(Connection::Loopback(Arc::clone(bridge)));
        }
        if self.config.dry_run {
            self.report(LogLevel::Info, "Dry run: using the in-memory loopback transport.");
            return Ok(Connection::Loopback(Arc::new(InMemoryBridge::new())));
        }

        let client_id = self.config.client_id();
        let (bridge, task) = MqttBridge::start(
            &self.config.mqtt,
            &client_id,
            &self.config.topics(),
            Arc::clone(&self.status),
        )
        .context("Failed to start MQTT transport")?;
        Ok(Connection::Mqtt { bridge, task })
    }

    async fn read_commands<R, W, S>(
        &self,
        handle: &OrchestratorHandle,
        input: R,
        output: &mut W,
        shutdown: S,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let mut lines = input.lines();
        let mut debounce = QrDebounce::default();
        tokio::pin!(shutdown);

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read input")?,
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            };
            let Some(line) = line else {
                break;
            };
            let command = InputCommand::parse(&line);
            match &command {
                InputCommand::Empty => continue,
                InputCommand::Quit => break,
                InputCommand::Status => {
                    let snapshot = handle.snapshot().await?;
                    write_line(output, &snapshot.to_string()).await?;
                    continue;
                }
                InputCommand::Metrics => {
                    let text = reset_telemetry::encode_metrics()?;
                    write_line(output, text.trim_end()).await?;
                    continue;
                }
                InputCommand::Qr(text) => {
                    if !debounce.admit(text, self.clock.now_ms()) {
                        debug!("Repeated QR text ignored");
                        continue;
                    }
                }
                InputCommand::Manual(_) => {}
            }

            match resolve_serial(&command) {
                Some(Ok((serial, source))) => match handle.submit(serial, source).await {
                    Ok(Submission::Accepted(ticket)) => {
                        tokio::spawn(follow_ticket(ticket));
                    }
                    Ok(Submission::Suppressed) => debug!("Duplicate submission suppressed"),
                    Err(ResetError::Stopped) => return Err(ResetError::Stopped.into()),
                    // Already reported on the status stream.
                    Err(e) => debug!(error = %e, "Submission refused"),
                },
                Some(Err(e)) => self.report(LogLevel::Warn, e.to_string()),
                None => {}
            }
        }
        Ok(())
    }

    fn report(&self, level: LogLevel, message: impl Into<String>) {
        self.status.emit(StatusEvent::log(level, message));
    }
}

async fn follow_ticket(ticket: ResetTicket) {
    let ResetTicket {
        serial,
        transaction,
        action,
        rejoin,
    } = ticket;

    let Ok(outcome) = action.await else {
        return;
    };
    if let Some(error) = outcome.to_error(&serial, &transaction) {
        log_reset_event!(
            debug,
            serial,
            "Reset cycle ended early",
            transaction = %transaction,
            failure = error.is_failure(),
            error = %error
        );
        return;
    }
    log_reset_event!(info, serial, "Reset confirmed", transaction = %transaction);

    if let Ok(rejoin) = rejoin.await {
        log_reset_event!(info, serial, "Rejoin watch finished", outcome = rejoin.label());
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
