//! # Dispatch Loop
//!
//! One task owns the [`ResetOrchestrator`] and feeds it submissions, inbound
//! messages and timer expiries one at a time, in arrival order. Callers talk
//! to it through a cloneable [`OrchestratorHandle`].

use std::sync::Arc;

use bridge_bus::{BridgeTopics, BridgeTransport, Subscription};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::TokioTimerScheduler;
use crate::config::OrchestratorConfig;
use crate::domain::{ScanSource, Serial, TimerId, TransactionIdSource, UuidTransactionIds};
use crate::error::ResetError;
use crate::ports::{NoOpMetrics, ResetMetrics, StatusSink, TimeSource, TokioTimeSource};
use crate::service::orchestrator::{OrchestratorSnapshot, ResetOrchestrator, Submission};

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

enum Command {
    Submit {
        serial: Serial,
        source: ScanSource,
        reply: oneshot::Sender<Result<Submission, ResetError>>,
    },
    Snapshot {
        reply: oneshot::Sender<OrchestratorSnapshot>,
    },
    Shutdown,
}

/// Cloneable handle to a running dispatch loop.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
}

impl OrchestratorHandle {
    /// Submit a serial for reset.
    ///
    /// Resolves once the reset action is published (or the submission is
    /// suppressed or refused); the returned ticket tracks the rest.
    pub async fn submit(
        &self,
        serial: Serial,
        source: ScanSource,
    ) -> Result<Submission, ResetError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                serial,
                source,
                reply,
            })
            .await
            .map_err(|_| ResetError::Stopped)?;
        response.await.map_err(|_| ResetError::Stopped)?
    }

    /// Current orchestrator state.
    pub async fn snapshot(&self) -> Result<OrchestratorSnapshot, ResetError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| ResetError::Stopped)?;
        response.await.map_err(|_| ResetError::Stopped)
    }

    /// Ask the loop to stop. Outstanding waiters resolve as superseded.
    pub async fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("Dispatch loop already stopped");
        }
    }
}

/// Owns the orchestrator and its event sources.
pub struct OrchestratorRunner {
    orchestrator: ResetOrchestrator,
    inbound: Subscription,
    commands: mpsc::Receiver<Command>,
    expired: mpsc::UnboundedReceiver<TimerId>,
    subscribe: Option<(Arc<dyn BridgeTransport>, BridgeTopics)>,
}

impl OrchestratorRunner {
    /// Wrap `orchestrator`.
    ///
    /// `expired` must receive the expiries of the scheduler the orchestrator
    /// was built with.
    pub fn new(
        orchestrator: ResetOrchestrator,
        inbound: Subscription,
        expired: mpsc::UnboundedReceiver<TimerId>,
    ) -> (Self, OrchestratorHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let runner = Self {
            orchestrator,
            inbound,
            commands: rx,
            expired,
            subscribe: None,
        };
        (runner, OrchestratorHandle { commands: tx })
    }

    /// Subscribe to the inbound bridge topics before dispatching.
    #[must_use]
    pub fn subscribe_on_start(mut self, transport: Arc<dyn BridgeTransport>) -> Self {
        let topics = self.orchestrator.topics().clone();
        self.subscribe = Some((transport, topics));
        self
    }

    /// Run until shut down or every handle is dropped.
    pub async fn run(mut self) {
        if let Some((transport, topics)) = self.subscribe.take() {
            for topic in topics.inbound() {
                match transport.subscribe(&topic).await {
                    Ok(()) => info!(topic = %topic, "Subscribed to inbound topic"),
                    Err(e) => warn!(topic = %topic, error = %e, "Subscribe failed"),
                }
            }
        }

        info!("Reset orchestrator dispatch loop started");
        let mut inbound_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Submit { serial, source, reply }) => {
                        let result = self.orchestrator.submit(serial, source).await;
                        if reply.send(result).is_err() {
                            debug!("Submitter dropped before reply");
                        }
                    }
                    Some(Command::Snapshot { reply }) => {
                        if reply.send(self.orchestrator.snapshot()).is_err() {
                            debug!("Snapshot requester dropped before reply");
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(id) = self.expired.recv() => {
                    self.orchestrator.handle_timer(id);
                }
                message = self.inbound.recv(), if inbound_open => match message {
                    Some(message) => self.orchestrator.handle_inbound(message).await,
                    None => {
                        warn!("Inbound channel closed; no further bridge messages");
                        inbound_open = false;
                    }
                },
            }
        }

        self.orchestrator.shutdown();
        info!("Reset orchestrator dispatch loop stopped");
    }
}

/// Assembles an orchestrator with tokio timers and spawns its loop.
pub struct OrchestratorBuilder {
    transport: Arc<dyn BridgeTransport>,
    status: Arc<dyn StatusSink>,
    config: OrchestratorConfig,
    topics: BridgeTopics,
    metrics: Arc<dyn ResetMetrics>,
    clock: Arc<dyn TimeSource>,
    ids: Arc<dyn TransactionIdSource>,
    subscribe: bool,
}

impl OrchestratorBuilder {
    pub fn new(transport: Arc<dyn BridgeTransport>, status: Arc<dyn StatusSink>) -> Self {
        Self {
            transport,
            status,
            config: OrchestratorConfig::default(),
            topics: BridgeTopics::default(),
            metrics: Arc::new(NoOpMetrics),
            clock: Arc::new(TokioTimeSource::new()),
            ids: Arc::new(UuidTransactionIds),
            subscribe: false,
        }
    }

    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn topics(mut self, topics: BridgeTopics) -> Self {
        self.topics = topics;
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn ResetMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn transaction_ids(mut self, ids: Arc<dyn TransactionIdSource>) -> Self {
        self.ids = ids;
        self
    }

    /// Subscribe to the inbound topics when the loop starts. Transports
    /// that subscribe on connect do not need this.
    #[must_use]
    pub fn subscribe_on_start(mut self, subscribe: bool) -> Self {
        self.subscribe = subscribe;
        self
    }

    /// Spawn the dispatch loop on the current tokio runtime.
    pub fn spawn(self) -> (OrchestratorHandle, JoinHandle<()>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let timers = Arc::new(TokioTimerScheduler::new(expired_tx));
        let inbound = self.transport.inbound();

        let orchestrator = ResetOrchestrator::new(
            self.config,
            self.topics,
            Arc::clone(&self.transport),
            timers,
            self.status,
        )
        .with_metrics(self.metrics)
        .with_clock(self.clock)
        .with_transaction_ids(self.ids);

        let (mut runner, handle) = OrchestratorRunner::new(orchestrator, inbound, expired_rx);
        if self.subscribe {
            runner = runner.subscribe_on_start(self.transport);
        }
        (handle, tokio::spawn(runner.run()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ChannelStatusSink;
    use crate::domain::OrchestratorPhase;
    use bridge_bus::InMemoryBridge;

    #[tokio::test]
    async fn test_abandoned_snapshot_request_keeps_loop_running() {
        let (status, _events) = ChannelStatusSink::new();
        let (handle, task) =
            OrchestratorBuilder::new(Arc::new(InMemoryBridge::new()), Arc::new(status)).spawn();

        let (reply, response) = oneshot::channel();
        drop(response);
        handle
            .commands
            .send(Command::Snapshot { reply })
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, OrchestratorPhase::Idle);

        handle.shutdown().await;
        task.await.unwrap();
    }
}
