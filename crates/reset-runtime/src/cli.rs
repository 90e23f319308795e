//! Command line flags. Every flag overrides the file and environment layers.

use std::path::PathBuf;

use clap::Parser;

/// Factory-reset Zigbee lights through a zigbee2mqtt bridge.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "hue-reset", version, about)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Broker URL (`mqtt://`, `tcp://` or `ws://`).
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// MQTT client id. Generated when omitted.
    #[arg(long)]
    pub client_id: Option<String>,

    /// Base topic of the bridge.
    #[arg(long, value_name = "TOPIC")]
    pub base_topic: Option<String>,

    /// Extended PAN id to direct resets at.
    #[arg(long, value_name = "ID")]
    pub extended_pan_id: Option<String>,

    /// Do not subscribe to the response and event topics.
    #[arg(long)]
    pub no_subscribe: bool,

    /// Use the in-memory loopback instead of a broker.
    #[arg(long)]
    pub dry_run: bool,

    /// Log filter, e.g. `info` or `warn,hr_orchestrator=debug`.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    pub json_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "hue-reset",
            "--url",
            "ws://broker:9001",
            "--base-topic",
            "z2m",
            "--no-subscribe",
            "--dry-run",
        ]);
        assert_eq!(cli.url.as_deref(), Some("ws://broker:9001"));
        assert_eq!(cli.base_topic.as_deref(), Some("z2m"));
        assert!(cli.no_subscribe);
        assert!(cli.dry_run);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["hue-reset"]);
        assert!(!cli.dry_run);
        assert!(!cli.json_logs);
        assert!(cli.url.is_none());
    }
}
