//! # Runtime Flows
//!
//! Operator input through `ResetRuntime` on the loopback transport, with
//! bridge responses injected while the command loop is running.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bridge_bus::{BridgeEventMessage, BridgeResponse, BridgeTopics, InMemoryBridge};
    use hr_orchestrator::{ChannelStatusSink, LogLevel, StatusEvent};
    use reset_runtime::{ResetRuntime, RuntimeConfig};
    use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    struct Session {
        bridge: Arc<InMemoryBridge>,
        topics: BridgeTopics,
        input: DuplexStream,
        status: mpsc::UnboundedReceiver<StatusEvent>,
        task: JoinHandle<Result<(), String>>,
    }

    impl Session {
        fn start(config: RuntimeConfig) -> Self {
            let bridge = Arc::new(InMemoryBridge::new());
            let (status, events) = ChannelStatusSink::new();
            let (input, reader) = tokio::io::duplex(1024);

            let runtime =
                ResetRuntime::new(config, Arc::new(status)).with_loopback(bridge.clone());
            let task = tokio::spawn(async move {
                runtime
                    .run(BufReader::new(reader), tokio::io::sink())
                    .await
                    .map_err(|e| e.to_string())
            });

            Self {
                bridge,
                topics: BridgeTopics::default(),
                input,
                status: events,
                task,
            }
        }

        async fn line(&mut self, line: &str) {
            self.input.write_all(line.as_bytes()).await.unwrap();
            self.input.write_all(b"\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        async fn settle(&self) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        fn last_transaction(&self) -> String {
            let requests = self.bridge.published_to(&self.topics.action_request());
            let last = requests.last().expect("no reset request published");
            last.json()["transaction"]
                .as_str()
                .expect("transaction is a string")
                .to_string()
        }

        fn logs(&mut self) -> Vec<(String, LogLevel)> {
            let mut logs = Vec::new();
            while let Ok(event) = self.status.try_recv() {
                if let StatusEvent::Log { message, level } = event {
                    logs.push((message, level));
                }
            }
            logs
        }

        async fn finish(mut self) -> Result<(), String> {
            self.line("quit").await;
            self.task.await.expect("runtime task panicked")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_serial_runs_full_cycle() {
        let mut session = Session::start(RuntimeConfig::default());

        session.line("06-e4-9f").await;
        let transaction = session.last_transaction();
        assert_eq!(
            session.bridge.published_to(&session.topics.action_request())[0].json()["params"]
                ["serial_numbers"][0],
            "06E49F"
        );

        session.bridge.inject_json(
            &session.topics.action_response(),
            &BridgeResponse::ok(transaction),
        );
        session.settle().await;
        let join = session.bridge.published_to(&session.topics.permit_join_request());
        assert_eq!(join.len(), 1);
        assert_eq!(join[0].json()["time"], 120);

        session.bridge.inject_json(
            &session.topics.bridge_event(),
            &BridgeEventMessage::device("device_leave", "0x00178801aabbccdd"),
        );
        session.bridge.inject_json(
            &session.topics.bridge_event(),
            &BridgeEventMessage::device("device_joined", "0x00178801aabbccdd"),
        );
        session.settle().await;

        let logs = session.logs();
        assert!(logs
            .iter()
            .any(|(message, level)| *level == LogLevel::Ok && message.contains("rejoined")));
        assert_eq!(session.finish().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_payload_with_z_field() {
        let mut session = Session::start(RuntimeConfig::default());

        session
            .line("qr HUE:Z:1CCA7BF5138442DCBAB24E63DB590E0419C7 D:Hue")
            .await;

        let requests = session.bridge.published_to(&session.topics.action_request());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].json()["params"]["serial_numbers"][0], "06E49F");
        assert_eq!(session.finish().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_error_reported_without_join_window() {
        let mut session = Session::start(RuntimeConfig::default());

        session.line("ABCDEF").await;
        let transaction = session.last_transaction();
        session.bridge.inject_json(
            &session.topics.action_response(),
            &BridgeResponse::error(transaction, "device not found"),
        );
        session.settle().await;

        assert!(session
            .bridge
            .published_to(&session.topics.permit_join_request())
            .is_empty());
        assert!(session.logs().iter().any(|(message, level)| *level == LogLevel::Error
            && message.contains("device not found")));
        assert_eq!(session.finish().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_input_is_warned_not_sent() {
        let mut session = Session::start(RuntimeConfig::default());

        session.line("qr https://example.invalid/nothing-here").await;
        session.line("12345").await;

        assert!(session.bridge.published().is_empty());
        let warnings: Vec<String> = session
            .logs()
            .into_iter()
            .filter(|(_, level)| *level == LogLevel::Warn)
            .map(|(message, _)| message)
            .collect();
        assert!(warnings.contains(&"QR detected, but no Z field or serial found.".to_string()));
        assert!(warnings.contains(&"Enter a 6-character serial (hex).".to_string()));
        assert_eq!(session.finish().await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_base_topic_and_pan_id() {
        let mut config = RuntimeConfig::default();
        config.base_topic = "home/z2m".to_string();
        config.orchestrator = config.orchestrator.clone().with_extended_pan_id("0xdd12");
        let mut session = Session::start(config);
        session.topics = BridgeTopics::new("home/z2m");

        session.line("06E49F").await;

        let requests = session
            .bridge
            .published_to("home/z2m/bridge/request/action");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].json()["params"]["extended_pan_id"], "0xdd12");
        assert!(session
            .bridge
            .is_subscribed("home/z2m/bridge/response/action"));
        assert_eq!(session.finish().await, Ok(()));
    }
}
