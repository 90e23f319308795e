//! Shared harness: an orchestrator dispatch loop over the in-memory bridge.
//!
//! Tests run on paused tokio time. [`Harness::settle`] lets the dispatch
//! loop drain everything already delivered before the test inspects state.

use std::sync::Arc;
use std::time::Duration;

use bridge_bus::{BridgeEventMessage, BridgeTopics, InMemoryBridge};
use hr_orchestrator::{
    ChannelStatusSink, LogLevel, OrchestratorBuilder, OrchestratorConfig, OrchestratorHandle,
    OrchestratorPhase, OrchestratorSnapshot, ResetError, ScanSource, SequentialTransactionIds,
    Serial, StatusEvent, Submission,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct Harness {
    pub bridge: Arc<InMemoryBridge>,
    pub topics: BridgeTopics,
    pub handle: OrchestratorHandle,
    pub task: JoinHandle<()>,
    status: mpsc::UnboundedReceiver<StatusEvent>,
}

impl Harness {
    pub fn start() -> Self {
        Self::start_with(OrchestratorConfig::default())
    }

    pub fn start_with(config: OrchestratorConfig) -> Self {
        let bridge = Arc::new(InMemoryBridge::new());
        let topics = BridgeTopics::default();
        let (status, events) = ChannelStatusSink::new();

        let (handle, task) = OrchestratorBuilder::new(bridge.clone(), Arc::new(status))
            .config(config)
            .topics(topics.clone())
            .transaction_ids(Arc::new(SequentialTransactionIds::new()))
            .subscribe_on_start(true)
            .spawn();

        Self {
            bridge,
            topics,
            handle,
            task,
            status: events,
        }
    }

    pub async fn submit(&self, serial: &str, source: ScanSource) -> Result<Submission, ResetError> {
        let serial = Serial::parse(serial).expect("test serial must be valid");
        self.handle.submit(serial, source).await
    }

    /// Let the dispatch loop process everything delivered so far.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    pub fn respond(&self, response: Value) -> usize {
        self.bridge
            .inject_json(&self.topics.action_response(), &response)
    }

    pub fn respond_raw(&self, payload: &str) -> usize {
        self.bridge
            .inject(&self.topics.action_response(), payload.as_bytes().to_vec())
    }

    pub fn device_event(&self, kind: &str, ieee_address: &str) -> usize {
        self.bridge.inject_json(
            &self.topics.bridge_event(),
            &BridgeEventMessage::device(kind, ieee_address),
        )
    }

    pub fn action_requests(&self) -> Vec<Value> {
        self.bridge
            .published_to(&self.topics.action_request())
            .iter()
            .map(|m| m.json())
            .collect()
    }

    pub fn join_requests(&self) -> Vec<Value> {
        self.bridge
            .published_to(&self.topics.permit_join_request())
            .iter()
            .map(|m| m.json())
            .collect()
    }

    pub async fn snapshot(&self) -> OrchestratorSnapshot {
        self.handle.snapshot().await.expect("dispatch loop running")
    }

    pub async fn phase(&self) -> OrchestratorPhase {
        self.snapshot().await.phase
    }

    /// Log lines emitted since the last drain.
    pub fn drain_logs(&mut self) -> Vec<(String, LogLevel)> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                StatusEvent::Log { message, level } => Some((message, level)),
                StatusEvent::State(_) => None,
            })
            .collect()
    }

    /// Phase notifications emitted since the last drain.
    pub fn drain_phases(&mut self) -> Vec<OrchestratorPhase> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                StatusEvent::State(phase) => Some(phase),
                StatusEvent::Log { .. } => None,
            })
            .collect()
    }

    fn drain(&mut self) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.status.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn stop(self) {
        self.handle.shutdown().await;
        self.task.await.expect("dispatch loop panicked");
    }
}
