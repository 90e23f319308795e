//! # Reset Orchestrator
//!
//! Owns the single in-flight reset cycle. Every method runs to completion on
//! the dispatch task; waiting for a response or a rejoin is represented by
//! entries in the pending table and armed timers, never by blocking.

use std::fmt;
use std::sync::Arc;

use bridge_bus::{
    BridgeResponse, BridgeTopics, BridgeTransport, InboundMessage, PermitJoinRequest,
    ResetActionRequest, ResetParams, ResponseStatus,
};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::config::OrchestratorConfig;
use crate::domain::{
    ActionOutcome, ActiveWatch, BridgeEvent, MatchConfidence, OrchestratorPhase,
    OrchestratorState, PendingAction, RejoinOutcome, RejoinWatch, RequestState, ResetRequest,
    ScanSource, Serial, TimerId, TimerScheduler, TransactionId, TransactionIdSource,
    UuidTransactionIds, WatchStep,
};
use crate::error::ResetError;
use crate::ports::{
    LogLevel, NoOpMetrics, ResetMetrics, StatusEvent, StatusSink, TimeSource, TokioTimeSource,
};
use crate::router::{EventRouter, RoutedMessage};

/// Result of an accepted or suppressed submission.
#[derive(Debug)]
pub enum Submission {
    /// A reset action was published; the ticket resolves as the cycle ends.
    Accepted(ResetTicket),
    /// Same serial as the last accepted one, inside the dedup window.
    Suppressed,
}

impl Submission {
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }

    /// The ticket, if accepted.
    pub fn into_ticket(self) -> Option<ResetTicket> {
        match self {
            Self::Accepted(ticket) => Some(ticket),
            Self::Suppressed => None,
        }
    }
}

/// Waiters for one reset cycle.
///
/// Both receivers always resolve: by the bridge, by a timer, or by a newer
/// submission superseding this one.
#[derive(Debug)]
pub struct ResetTicket {
    pub serial: Serial,
    pub transaction: TransactionId,
    pub action: oneshot::Receiver<ActionOutcome>,
    pub rejoin: oneshot::Receiver<RejoinOutcome>,
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorSnapshot {
    pub phase: OrchestratorPhase,
    pub connected: bool,
    pub request: Option<ResetRequest>,
    pub watch: Option<RejoinWatch>,
    pub pending_actions: usize,
    pub last_accepted: Option<Serial>,
}

impl fmt::Display for OrchestratorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "phase={} connected={} pending={}",
            self.phase, self.connected, self.pending_actions
        )?;
        if let Some(request) = &self.request {
            write!(
                f,
                " request={}/{} ({:?})",
                request.serial, request.transaction, request.state
            )?;
        }
        if let Some(watch) = &self.watch {
            write!(
                f,
                " watch={} expected={} ({:?})",
                watch.serial,
                watch.expected_ieee.as_deref().unwrap_or("-"),
                watch.state
            )?;
        }
        Ok(())
    }
}

/// Reset-and-rejoin state machine.
pub struct ResetOrchestrator {
    config: OrchestratorConfig,
    topics: BridgeTopics,
    transport: Arc<dyn BridgeTransport>,
    timers: Arc<dyn TimerScheduler>,
    status: Arc<dyn StatusSink>,
    metrics: Arc<dyn ResetMetrics>,
    clock: Arc<dyn TimeSource>,
    ids: Arc<dyn TransactionIdSource>,
    router: EventRouter,
    state: OrchestratorState,
}

impl ResetOrchestrator {
    /// Create an idle orchestrator.
    ///
    /// Uses UUID transaction ids, the tokio clock and no metrics until
    /// overridden.
    pub fn new(
        config: OrchestratorConfig,
        topics: BridgeTopics,
        transport: Arc<dyn BridgeTransport>,
        timers: Arc<dyn TimerScheduler>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let state = OrchestratorState::new(config.dedup_window_ms);
        Self {
            config,
            topics,
            transport,
            timers,
            status,
            metrics: Arc::new(NoOpMetrics),
            clock: Arc::new(TokioTimeSource::new()),
            ids: Arc::new(UuidTransactionIds),
            router: EventRouter::new(),
            state,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn ResetMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_transaction_ids(mut self, ids: Arc<dyn TransactionIdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn phase(&self) -> OrchestratorPhase {
        self.state.phase
    }

    pub fn topics(&self) -> &BridgeTopics {
        &self.topics
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            phase: self.state.phase,
            connected: self.transport.is_connected(),
            request: self.state.request.clone(),
            watch: self.state.watch.as_ref().map(|active| active.watch.clone()),
            pending_actions: self.state.pending.len(),
            last_accepted: self.state.gate.last_accepted().cloned(),
        }
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Start a reset cycle for `serial`.
    ///
    /// # Errors
    ///
    /// - `TransportUnavailable` when not connected (nothing published)
    /// - `PublishFailed` when the reset action could not be published
    pub async fn submit(
        &mut self,
        serial: Serial,
        source: ScanSource,
    ) -> Result<Submission, ResetError> {
        let now = self.clock.now_ms();
        if !self.state.gate.try_accept(&serial, now) {
            self.metrics.submission_suppressed();
            debug!(serial = %serial, source = %source, "Duplicate serial suppressed");
            return Ok(Submission::Suppressed);
        }
        self.metrics.submission_accepted();

        if !self.transport.is_connected() {
            self.report(
                LogLevel::Warn,
                format!("Serial {serial} detected from {source}, but the bridge is not connected."),
            );
            return Err(ResetError::TransportUnavailable {
                serial: serial.to_string(),
            });
        }

        self.supersede_cycle(&serial);

        let transaction = self.ids.next_id();
        info!(serial = %serial, source = %source, transaction = %transaction, "Submitting reset");
        self.state.request = Some(ResetRequest::new(
            serial.clone(),
            source,
            transaction.clone(),
            now,
        ));
        self.set_phase(OrchestratorPhase::RequestSent);

        let request = ResetActionRequest {
            action: self.config.reset_action.clone(),
            params: ResetParams {
                serial_numbers: vec![serial.to_string()],
                extended_pan_id: self.config.extended_pan_id.clone(),
            },
            transaction: transaction.to_string(),
        };
        let topic = self.topics.action_request();
        if let Err(err) = self.publish_json(&topic, &request).await {
            self.finish_request(&transaction, RequestState::Failed);
            self.report(LogLevel::Error, format!("Failed to publish reset: {err}"));
            self.set_phase(OrchestratorPhase::Idle);
            return Err(err);
        }
        self.report(
            LogLevel::Ok,
            format!("Reset sent for serial {serial} ({source})."),
        );

        let (action_tx, action_rx) = oneshot::channel();
        let (rejoin_tx, rejoin_rx) = oneshot::channel();
        let deadline = now.saturating_add(self.config.action_timeout_ms);
        self.state.pending.insert(
            transaction.clone(),
            PendingAction::new(serial.clone(), source, deadline, action_tx, rejoin_tx),
        );
        self.timers.schedule(
            TimerId::ActionResponse(transaction.clone()),
            self.config.action_timeout(),
        );
        self.set_phase(OrchestratorPhase::AwaitingActionResponse);

        Ok(Submission::Accepted(ResetTicket {
            serial,
            transaction,
            action: action_rx,
            rejoin: rejoin_rx,
        }))
    }

    /// Resolve everything still in flight before a new cycle starts.
    fn supersede_cycle(&mut self, incoming: &Serial) {
        for (transaction, pending) in self.state.pending.drain() {
            self.timers.cancel(&TimerId::ActionResponse(transaction.clone()));
            self.close_action(&transaction, &ActionOutcome::Superseded);
            self.metrics.rejoin_outcome(RejoinOutcome::Superseded.label());
            self.report(
                LogLevel::Info,
                format!(
                    "Reset for {} (transaction {transaction}) superseded by {incoming}.",
                    pending.serial
                ),
            );
            pending.resolve_all(ActionOutcome::Superseded, RejoinOutcome::Superseded);
        }
        self.supersede_watch(incoming);
    }

    fn supersede_watch(&mut self, incoming: &Serial) {
        let Some(active) = self.state.watching() else {
            return;
        };
        active.watch.supersede();
        active.resolve(RejoinOutcome::Superseded);
        let (id, serial) = (active.watch.id, active.watch.serial.clone());

        self.timers.cancel(&TimerId::Rejoin(id));
        self.metrics.rejoin_outcome(RejoinOutcome::Superseded.label());
        self.report(
            LogLevel::Info,
            format!("Rejoin watch for {serial} superseded by {incoming}."),
        );
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Dispatch one inbound message.
    pub async fn handle_inbound(&mut self, message: InboundMessage) {
        self.report(LogLevel::Info, EventRouter::describe(&message));

        match self.router.route(&message) {
            RoutedMessage::ActionResponse(response) => self.on_action_response(response).await,
            RoutedMessage::JoinWindowResponse(response) => self.on_join_window_response(&response),
            RoutedMessage::BridgeEvent(event) => self.on_bridge_event(&event),
            RoutedMessage::Other { topic } => {
                trace!(topic = %topic, "Inbound message not used by the reset flow");
            }
            RoutedMessage::Malformed {
                topic,
                kind,
                raw,
                reason,
            } => {
                warn!(topic = %topic, kind = %kind, reason = %reason, "Malformed inbound payload");
                self.report(
                    LogLevel::Warn,
                    format!("Malformed {kind} payload on {topic}: {raw}"),
                );
            }
        }
    }

    async fn on_action_response(&mut self, response: BridgeResponse) {
        let Some(token) = response.transaction.as_deref() else {
            debug!("Action response without transaction ignored");
            return;
        };
        let transaction = TransactionId::new(token);
        let Some(pending) = self.state.pending.take(&transaction) else {
            debug!(transaction = %transaction, "Action response for unknown transaction ignored");
            return;
        };
        self.timers.cancel(&TimerId::ActionResponse(transaction.clone()));

        match response.status {
            ResponseStatus::Ok => self.on_action_confirmed(transaction, pending).await,
            ResponseStatus::Error | ResponseStatus::Unknown => {
                let error = response
                    .error
                    .unwrap_or_else(|| "bridge reported failure without details".to_string());
                self.on_action_rejected(transaction, pending, error);
            }
        }
    }

    fn on_action_rejected(
        &mut self,
        transaction: TransactionId,
        pending: PendingAction,
        error: String,
    ) {
        let serial = pending.serial.clone();
        let outcome = ActionOutcome::Rejected(error.clone());
        self.close_action(&transaction, &outcome);
        self.metrics.rejoin_outcome(RejoinOutcome::Abandoned.label());
        pending.resolve_all(outcome, RejoinOutcome::Abandoned);

        let err = ResetError::ActionRejected {
            serial: serial.to_string(),
            error,
        };
        warn!(transaction = %transaction, error = %err, "Reset rejected");
        self.report(LogLevel::Error, err.to_string());
        self.set_phase(OrchestratorPhase::ActionFailed);
        self.set_phase(OrchestratorPhase::Idle);
    }

    async fn on_action_confirmed(&mut self, transaction: TransactionId, pending: PendingAction) {
        let serial = pending.serial.clone();
        let source = pending.source;
        self.close_action(&transaction, &ActionOutcome::Confirmed);
        let rejoin = pending.resolve(ActionOutcome::Confirmed);

        info!(serial = %serial, transaction = %transaction, "Reset confirmed");
        self.report(LogLevel::Ok, format!("Bridge confirmed reset of {serial}."));
        self.set_phase(OrchestratorPhase::ActionConfirmed);

        let window = PermitJoinRequest {
            time: self.config.join_window_secs,
        };
        let topic = self.topics.permit_join_request();
        self.set_phase(OrchestratorPhase::JoinWindowRequested);
        if let Err(err) = self.publish_json(&topic, &window).await {
            if rejoin.send(RejoinOutcome::Abandoned).is_err() {
                debug!(serial = %serial, "Rejoin waiter dropped before resolution");
            }
            self.metrics.rejoin_outcome(RejoinOutcome::Abandoned.label());
            self.report(
                LogLevel::Error,
                format!("Failed to open join window for {serial}: {err}"),
            );
            self.set_phase(OrchestratorPhase::Idle);
            return;
        }

        self.report(
            LogLevel::Info,
            format!("Join window opened for {}s.", window.time),
        );
        self.set_phase(OrchestratorPhase::JoinWindowConfirmed);
        self.start_watch(serial, source, rejoin);
    }

    fn on_join_window_response(&self, response: &BridgeResponse) {
        match response.status {
            ResponseStatus::Ok => {
                self.report(LogLevel::Info, "Bridge acknowledged the join window.");
            }
            ResponseStatus::Error | ResponseStatus::Unknown => {
                let error = response.error.as_deref().unwrap_or("no details");
                self.report(
                    LogLevel::Warn,
                    format!("Bridge refused the join window: {error}"),
                );
            }
        }
    }

    // =========================================================================
    // REJOIN WATCH
    // =========================================================================

    fn start_watch(
        &mut self,
        serial: Serial,
        source: ScanSource,
        responder: oneshot::Sender<RejoinOutcome>,
    ) {
        self.supersede_watch(&serial);

        let id = self.state.allocate_watch_id();
        let watch = RejoinWatch::start(id, serial.clone(), source, self.clock.now_ms());
        self.state.watch = Some(ActiveWatch::new(watch, responder));
        self.timers
            .schedule(TimerId::Rejoin(id), self.config.rejoin_timeout());

        info!(serial = %serial, watch = id, "Watching for rejoin");
        self.report(
            LogLevel::Info,
            format!("Waiting for {serial} to leave and rejoin the network."),
        );
        self.set_phase(OrchestratorPhase::AwaitingRejoin);
    }

    fn on_bridge_event(&mut self, event: &BridgeEvent) {
        let Some(active) = self.state.watching() else {
            trace!(kind = %event.kind, "Bridge event with no active watch");
            return;
        };
        let step = active.watch.observe(event);
        let (id, serial) = (active.watch.id, active.watch.serial.clone());

        match step {
            WatchStep::Ignored => {
                debug!(kind = %event.kind, device = event.device_label(), "Bridge event ignored by watch");
            }
            WatchStep::IdentityCaptured(ieee) => {
                self.report(
                    LogLevel::Info,
                    format!("Device {ieee} left the network; expecting it to rejoin as {serial}."),
                );
            }
            WatchStep::Mismatch { expected, actual } => {
                self.report(
                    LogLevel::Warn,
                    format!("Device {actual} joined, but still waiting for {expected} ({serial})."),
                );
            }
            WatchStep::Resolved {
                ieee_address,
                confidence,
            } => {
                self.timers.cancel(&TimerId::Rejoin(id));
                self.metrics.rejoin_outcome("rejoined");
                let message = match confidence {
                    MatchConfidence::Matched => {
                        format!("{serial} rejoined the network as {ieee_address}.")
                    }
                    MatchConfidence::Assumed => format!(
                        "Device {ieee_address} joined; assuming it is {serial} (no leave was seen)."
                    ),
                };
                if let Some(active) = self.state.watch.as_mut() {
                    active.resolve(RejoinOutcome::Rejoined {
                        ieee_address,
                        confidence,
                    });
                }
                self.report(LogLevel::Ok, message);
                self.set_phase(OrchestratorPhase::Idle);
            }
        }
    }

    // =========================================================================
    // TIMERS
    // =========================================================================

    /// Handle an expired timer. Expiries that no longer match the current
    /// state are ignored.
    pub fn handle_timer(&mut self, id: TimerId) {
        self.timers.cancel(&id);

        match id {
            TimerId::ActionResponse(transaction) => self.on_action_timeout(transaction),
            TimerId::Rejoin(watch_id) => self.on_rejoin_timeout(watch_id),
        }
    }

    fn on_action_timeout(&mut self, transaction: TransactionId) {
        let Some(pending) = self.state.pending.take(&transaction) else {
            debug!(transaction = %transaction, "Stale action timer ignored");
            return;
        };
        let serial = pending.serial.clone();
        self.close_action(&transaction, &ActionOutcome::TimedOut);
        self.metrics.rejoin_outcome(RejoinOutcome::Abandoned.label());
        pending.resolve_all(ActionOutcome::TimedOut, RejoinOutcome::Abandoned);

        let err = ResetError::ActionTimedOut {
            serial: serial.to_string(),
            transaction,
        };
        warn!(error = %err, "Reset timed out");
        self.report(LogLevel::Error, err.to_string());
        self.set_phase(OrchestratorPhase::ActionTimedOut);
        self.set_phase(OrchestratorPhase::Idle);
    }

    fn on_rejoin_timeout(&mut self, watch_id: u64) {
        let Some(active) = self
            .state
            .watching()
            .filter(|active| active.watch.id == watch_id)
        else {
            debug!(watch = watch_id, "Stale rejoin timer ignored");
            return;
        };
        active.watch.expire();
        active.resolve(RejoinOutcome::TimedOut);
        let serial = active.watch.serial.clone();

        self.metrics.rejoin_outcome(RejoinOutcome::TimedOut.label());
        let err = ResetError::RejoinTimedOut {
            serial: serial.to_string(),
        };
        info!(error = %err, "Rejoin watch expired");
        self.report(
            LogLevel::Info,
            format!("{err}; the reset itself was confirmed."),
        );
        self.set_phase(OrchestratorPhase::Idle);
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    /// Resolve every outstanding waiter and cancel every timer.
    pub fn shutdown(&mut self) {
        for (transaction, pending) in self.state.pending.drain() {
            self.timers.cancel(&TimerId::ActionResponse(transaction.clone()));
            self.finish_request(&transaction, ActionOutcome::Superseded.request_state());
            pending.resolve_all(ActionOutcome::Superseded, RejoinOutcome::Superseded);
        }
        if let Some(active) = self.state.watching() {
            active.watch.supersede();
            active.resolve(RejoinOutcome::Superseded);
            let id = active.watch.id;
            self.timers.cancel(&TimerId::Rejoin(id));
        }
        self.set_phase(OrchestratorPhase::Idle);
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn publish_json<T: Serialize>(&self, topic: &str, message: &T) -> Result<(), ResetError> {
        let result = match serde_json::to_vec(message) {
            Ok(payload) => self
                .transport
                .publish(topic, payload)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        result.map_err(|reason| {
            self.metrics.publish_failed();
            warn!(topic = %topic, reason = %reason, "Publish failed");
            ResetError::PublishFailed {
                topic: topic.to_string(),
                reason,
            }
        })
    }

    /// Record how the wait for `transaction` ended, on the request and in metrics.
    fn close_action(&mut self, transaction: &TransactionId, outcome: &ActionOutcome) {
        self.finish_request(transaction, outcome.request_state());
        self.metrics.action_outcome(outcome.label());
    }

    fn finish_request(&mut self, transaction: &TransactionId, state: RequestState) {
        if let Some(request) = self
            .state
            .request
            .as_mut()
            .filter(|request| &request.transaction == transaction)
        {
            request.finish(state);
        }
    }

    fn set_phase(&mut self, phase: OrchestratorPhase) {
        if self.state.phase == phase {
            return;
        }
        debug!(from = %self.state.phase, to = %phase, "Phase transition");
        self.state.phase = phase;
        self.status.emit(StatusEvent::State(phase));
    }

    fn report(&self, level: LogLevel, message: impl Into<String>) {
        self.status.emit(StatusEvent::log(level, message));
    }
}
