//! # Reset Cycle Scenarios
//!
//! Full cycles through the dispatch loop, the in-memory bridge and tokio
//! timers:
//!
//! 1. **Happy path**: reset request → `ok` → join window → leave → join
//! 2. **Bridge refusal**: `error` response aborts before the join window
//! 3. **Timeouts**: action response and rejoin watch deadlines
//! 4. **Single flight**: dedup window and superseding submissions

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hr_orchestrator::{
        ActionOutcome, LogLevel, MatchConfidence, OrchestratorConfig, OrchestratorPhase,
        RejoinOutcome, RequestState, ResetError, ScanSource, Submission, WatchState,
    };
    use serde_json::json;

    use crate::integration::fixtures::Harness;

    async fn accepted(harness: &Harness, serial: &str) -> hr_orchestrator::ResetTicket {
        harness
            .submit(serial, ScanSource::Qr)
            .await
            .expect("submission refused")
            .into_ticket()
            .expect("submission suppressed")
    }

    // =========================================================================
    // HAPPY PATH
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_reset_and_rejoin_end_to_end() {
        let mut harness = Harness::start();

        let ticket = accepted(&harness, "06E49F").await;
        assert_eq!(ticket.transaction.as_str(), "T1");
        assert_eq!(
            harness.action_requests(),
            vec![json!({
                "action": "factory_reset",
                "params": { "serial_numbers": ["06E49F"] },
                "transaction": "T1"
            })]
        );
        assert_eq!(
            harness.phase().await,
            OrchestratorPhase::AwaitingActionResponse
        );

        harness.respond(json!({ "status": "ok", "transaction": "T1" }));
        assert_eq!(ticket.action.await.unwrap(), ActionOutcome::Confirmed);
        harness.settle().await;
        assert_eq!(harness.join_requests(), vec![json!({ "time": 120 })]);
        assert_eq!(harness.phase().await, OrchestratorPhase::AwaitingRejoin);

        harness.device_event("device_leave", "0x1");
        harness.settle().await;
        let watch = harness.snapshot().await.watch.expect("watch started");
        assert_eq!(watch.expected_ieee.as_deref(), Some("0x1"));
        assert_eq!(watch.state, WatchState::Watching);

        harness.device_event("device_joined", "0x1");
        let outcome = ticket.rejoin.await.unwrap();
        assert_eq!(
            outcome,
            RejoinOutcome::Rejoined {
                ieee_address: "0x1".to_string(),
                confidence: MatchConfidence::Matched,
            }
        );
        assert_eq!(harness.phase().await, OrchestratorPhase::Idle);

        assert_eq!(
            harness.drain_phases(),
            vec![
                OrchestratorPhase::RequestSent,
                OrchestratorPhase::AwaitingActionResponse,
                OrchestratorPhase::ActionConfirmed,
                OrchestratorPhase::JoinWindowRequested,
                OrchestratorPhase::JoinWindowConfirmed,
                OrchestratorPhase::AwaitingRejoin,
                OrchestratorPhase::Idle,
            ]
        );
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_without_leave_is_assumed() {
        let harness = Harness::start();
        let ticket = accepted(&harness, "06E49F").await;

        harness.respond(json!({ "status": "ok", "transaction": "T1" }));
        harness.settle().await;
        harness.device_event("device_joined", "0xabc");

        assert_eq!(
            ticket.rejoin.await.unwrap(),
            RejoinOutcome::Rejoined {
                ieee_address: "0xabc".to_string(),
                confidence: MatchConfidence::Assumed,
            }
        );
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_device_join_does_not_confirm() {
        let mut harness = Harness::start();
        let mut ticket = accepted(&harness, "06E49F").await;

        harness.respond(json!({ "status": "ok", "transaction": "T1" }));
        harness.settle().await;
        harness.device_event("device_leave", "0x1");
        harness.device_event("device_joined", "0x2");
        harness.device_event("device_announce", "0x1");
        harness.settle().await;

        assert!(ticket.rejoin.try_recv().is_err());
        assert!(harness
            .drain_logs()
            .iter()
            .any(|(message, level)| *level == LogLevel::Warn
                && message.contains("0x2")
                && message.contains("0x1")));

        harness.device_event("device_joined", "0x1");
        assert!(matches!(
            ticket.rejoin.await.unwrap(),
            RejoinOutcome::Rejoined { ieee_address, .. } if ieee_address == "0x1"
        ));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_extended_pan_id_is_sent() {
        let harness =
            Harness::start_with(OrchestratorConfig::default().with_extended_pan_id("0xdd12"));
        let _ticket = accepted(&harness, "06E49F").await;

        let request = &harness.action_requests()[0];
        assert_eq!(request["params"]["extended_pan_id"], "0xdd12");
        assert_eq!(request["params"]["serial_numbers"], json!(["06E49F"]));
        harness.stop().await;
    }

    // =========================================================================
    // BRIDGE REFUSAL
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_error_response_aborts_before_join_window() {
        let mut harness = Harness::start();
        let ticket = accepted(&harness, "06E49F").await;

        harness.respond(json!({ "status": "error", "error": "timeout", "transaction": "T1" }));
        let outcome = ticket.action.await.unwrap();
        assert_eq!(outcome, ActionOutcome::Rejected("timeout".to_string()));
        assert_eq!(
            outcome.to_error(&ticket.serial, &ticket.transaction),
            Some(ResetError::ActionRejected {
                serial: "06E49F".to_string(),
                error: "timeout".to_string(),
            })
        );
        assert_eq!(ticket.rejoin.await.unwrap(), RejoinOutcome::Abandoned);

        harness.settle().await;
        assert!(harness.join_requests().is_empty());
        let snapshot = harness.snapshot().await;
        assert_eq!(snapshot.phase, OrchestratorPhase::Idle);
        assert_eq!(snapshot.request.unwrap().state, RequestState::Failed);
        assert!(harness
            .drain_logs()
            .iter()
            .any(|(message, level)| *level == LogLevel::Error && message.contains("timeout")));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_window_publish_failure_stops_flow() {
        let harness = Harness::start();
        harness
            .bridge
            .fail_publishes_to(harness.topics.permit_join_request());
        let ticket = accepted(&harness, "06E49F").await;

        harness.respond(json!({ "status": "ok", "transaction": "T1" }));
        assert_eq!(ticket.action.await.unwrap(), ActionOutcome::Confirmed);
        assert_eq!(ticket.rejoin.await.unwrap(), RejoinOutcome::Abandoned);

        let snapshot = harness.snapshot().await;
        assert!(snapshot.watch.is_none());
        assert_eq!(snapshot.phase, OrchestratorPhase::Idle);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_response_is_logged_and_ignored() {
        let mut harness = Harness::start();
        let mut ticket = accepted(&harness, "06E49F").await;

        harness.respond_raw("{not json");
        harness.settle().await;

        assert!(ticket.action.try_recv().is_err());
        assert!(harness
            .drain_logs()
            .iter()
            .any(|(message, level)| *level == LogLevel::Warn && message.contains("{not json")));
        assert_eq!(
            harness.phase().await,
            OrchestratorPhase::AwaitingActionResponse
        );
        harness.stop().await;
    }

    // =========================================================================
    // TIMEOUTS
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_uncorrelated_response_ends_in_timeout() {
        let harness = Harness::start();
        let ticket = accepted(&harness, "06E49F").await;
        let started = tokio::time::Instant::now();

        harness.respond(json!({ "status": "ok" }));
        harness.respond(json!({ "status": "ok", "transaction": "T9" }));

        assert_eq!(ticket.action.await.unwrap(), ActionOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(40_000));
        assert_eq!(ticket.rejoin.await.unwrap(), RejoinOutcome::Abandoned);
        assert!(harness.join_requests().is_empty());

        let snapshot = harness.snapshot().await;
        assert_eq!(snapshot.request.unwrap().state, RequestState::TimedOut);
        assert_eq!(snapshot.pending_actions, 0);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_timeout_is_soft() {
        let mut harness = Harness::start();
        let ticket = accepted(&harness, "06E49F").await;

        harness.respond(json!({ "status": "ok", "transaction": "T1" }));
        assert_eq!(ticket.action.await.unwrap(), ActionOutcome::Confirmed);
        harness.drain_logs();

        assert_eq!(ticket.rejoin.await.unwrap(), RejoinOutcome::TimedOut);

        let logs = harness.drain_logs();
        assert!(logs.iter().all(|(_, level)| *level != LogLevel::Error));
        assert!(logs.iter().any(|(message, level)| *level == LogLevel::Info
            && message.contains("did not rejoin")));

        let snapshot = harness.snapshot().await;
        assert_eq!(snapshot.request.unwrap().state, RequestState::Confirmed);
        assert_eq!(snapshot.watch.unwrap().state, WatchState::TimedOut);

        // A join after expiry changes nothing.
        harness.device_event("device_joined", "0x1");
        harness.settle().await;
        assert_eq!(harness.phase().await, OrchestratorPhase::Idle);
        harness.stop().await;
    }

    // =========================================================================
    // SINGLE FLIGHT
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_same_serial_within_window_publishes_once() {
        let harness = Harness::start();
        let _first = accepted(&harness, "06E49F").await;

        let second = harness.submit("06E49F", ScanSource::Manual).await.unwrap();
        assert!(second.is_suppressed());
        assert_eq!(harness.action_requests().len(), 1);

        tokio::time::advance(Duration::from_millis(20_000)).await;
        let third = harness.submit("06E49F", ScanSource::Qr).await.unwrap();
        assert!(matches!(third, Submission::Accepted(_)));
        assert_eq!(harness.action_requests().len(), 2);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_serial_supersedes_pending_request() {
        let harness = Harness::start();
        let first = accepted(&harness, "06E49F").await;
        let second = accepted(&harness, "ABCDEF").await;

        assert_eq!(first.action.await.unwrap(), ActionOutcome::Superseded);
        assert_eq!(first.rejoin.await.unwrap(), RejoinOutcome::Superseded);
        assert_eq!(second.transaction.as_str(), "T2");

        // The stale response for the first cycle must not open a join window.
        harness.respond(json!({ "status": "ok", "transaction": "T1" }));
        harness.settle().await;
        assert!(harness.join_requests().is_empty());

        harness.respond(json!({ "status": "ok", "transaction": "T2" }));
        assert_eq!(second.action.await.unwrap(), ActionOutcome::Confirmed);
        harness.settle().await;
        assert_eq!(harness.join_requests().len(), 1);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_transport_blocks_before_publish() {
        let harness = Harness::start();
        // Let the loop subscribe before going offline.
        harness.settle().await;
        harness.bridge.set_connected(false);

        let err = harness
            .submit("06E49F", ScanSource::Manual)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResetError::TransportUnavailable {
                serial: "06E49F".to_string()
            }
        );
        assert!(harness.bridge.published().is_empty());
        assert!(harness.snapshot().await.request.is_none());
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_resolves_outstanding_waiters() {
        let harness = Harness::start();
        let ticket = accepted(&harness, "06E49F").await;

        let handle = harness.handle.clone();
        harness.stop().await;

        assert_eq!(ticket.action.await.unwrap(), ActionOutcome::Superseded);
        assert_eq!(ticket.rejoin.await.unwrap(), RejoinOutcome::Superseded);
        assert_eq!(handle.snapshot().await.unwrap_err(), ResetError::Stopped);
    }
}
