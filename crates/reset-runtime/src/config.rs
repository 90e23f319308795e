//! # Runtime Configuration
//!
//! Layered, later layers win:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config`)
//! 3. `HR_*` environment variables
//! 4. Command line flags
//!
//! ```toml
//! base_topic = "zigbee2mqtt"
//!
//! [mqtt]
//! url = "ws://localhost:9001"
//! subscribe_responses = true
//!
//! [orchestrator]
//! action_timeout_ms = 40000
//! extended_pan_id = "0xdd12a3c4b5e6f789"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_bus::{BridgeTopics, DEFAULT_BASE_TOPIC};
use hr_orchestrator::{ConfigError, OrchestratorConfig};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::cli::Cli;

/// Default broker: the bridge's WebSocket listener on this machine.
pub const DEFAULT_MQTT_URL: &str = "ws://localhost:9001";

const DEFAULT_MQTT_PORT: u16 = 1883;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid broker URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported broker scheme {scheme:?}; use mqtt://, tcp:// or ws://")]
    UnsupportedScheme { scheme: String },

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("base topic must not be empty")]
    EmptyBaseTopic,

    #[error("{field} must be greater than zero")]
    ZeroSetting { field: &'static str },

    #[error(transparent)]
    Orchestrator(#[from] ConfigError),
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Generated as `hue-reset-<8 hex>` when not set.
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts.
    pub reconnect_delay_ms: u64,
    /// Subscribe to the response and event topics on every connect.
    pub subscribe_responses: bool,
    /// Depth of the client request queue.
    pub request_capacity: usize,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_MQTT_URL.to_string(),
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 30,
            reconnect_delay_ms: 2_000,
            subscribe_responses: true,
            request_capacity: 64,
        }
    }
}

impl MqttSettings {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Credentials, when a username is configured.
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = self.username.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        Some((
            username.to_string(),
            self.password.clone().unwrap_or_default(),
        ))
    }
}

/// Where the broker lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerAddress {
    Tcp { host: String, port: u16 },
    /// rumqttc wants the full URL as the host for WebSocket connections.
    WebSocket { url: String, port: u16 },
}

impl BrokerAddress {
    pub fn parse(raw: &str) -> Result<Self, RuntimeConfigError> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|e| RuntimeConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RuntimeConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        match url.scheme() {
            "mqtt" | "tcp" => Ok(Self::Tcp {
                host,
                port: url.port().unwrap_or(DEFAULT_MQTT_PORT),
            }),
            "ws" => Ok(Self::WebSocket {
                port: url.port_or_known_default().unwrap_or(80),
                url: raw.to_string(),
            }),
            other => Err(RuntimeConfigError::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub base_topic: String,
    pub mqtt: MqttSettings,
    pub orchestrator: OrchestratorConfig,
    /// Loopback transport instead of a broker. Command line only.
    #[serde(skip)]
    pub dry_run: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            mqtt: MqttSettings::default(),
            orchestrator: OrchestratorConfig::default(),
            dry_run: false,
        }
    }
}

impl RuntimeConfig {
    /// Build the configuration from every layer and validate it.
    pub fn load(cli: &Cli) -> Result<Self, RuntimeConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_cli(cli);
        config.ensure_client_id();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, RuntimeConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuntimeConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| RuntimeConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `HR_*` overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), RuntimeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("HR_MQTT_URL") {
            self.mqtt.url = url;
        }
        if let Some(username) = lookup("HR_MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("HR_MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(client_id) = lookup("HR_CLIENT_ID") {
            self.mqtt.client_id = Some(client_id);
        }
        if let Some(base) = lookup("HR_BASE_TOPIC") {
            self.base_topic = base;
        }
        if let Some(pan_id) = lookup("HR_EXTENDED_PAN_ID") {
            self.orchestrator = self.orchestrator.clone().with_extended_pan_id(pan_id);
        }
        if let Some(value) = lookup("HR_SUBSCRIBE_RESPONSES") {
            self.mqtt.subscribe_responses = parse_bool(&value).ok_or(
                RuntimeConfigError::InvalidEnv {
                    key: "HR_SUBSCRIBE_RESPONSES",
                    value,
                },
            )?;
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.url {
            self.mqtt.url = url.clone();
        }
        if let Some(username) = &cli.username {
            self.mqtt.username = Some(username.clone());
        }
        if let Some(password) = &cli.password {
            self.mqtt.password = Some(password.clone());
        }
        if let Some(client_id) = &cli.client_id {
            self.mqtt.client_id = Some(client_id.clone());
        }
        if let Some(base) = &cli.base_topic {
            self.base_topic = base.clone();
        }
        if let Some(pan_id) = &cli.extended_pan_id {
            self.orchestrator = self.orchestrator.clone().with_extended_pan_id(pan_id.as_str());
        }
        if cli.no_subscribe {
            self.mqtt.subscribe_responses = false;
        }
        self.dry_run |= cli.dry_run;
    }

    /// Fill in a random client id when none is configured.
    pub fn ensure_client_id(&mut self) {
        let missing = self
            .mqtt
            .client_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty());
        if missing {
            self.mqtt.client_id = Some(generate_client_id());
        }
    }

    pub fn validate(&self) -> Result<(), RuntimeConfigError> {
        if self.base_topic.trim().trim_end_matches('/').is_empty() {
            return Err(RuntimeConfigError::EmptyBaseTopic);
        }
        if self.mqtt.keep_alive_secs == 0 {
            return Err(RuntimeConfigError::ZeroSetting {
                field: "mqtt.keep_alive_secs",
            });
        }
        if self.mqtt.reconnect_delay_ms == 0 {
            return Err(RuntimeConfigError::ZeroSetting {
                field: "mqtt.reconnect_delay_ms",
            });
        }
        if self.mqtt.request_capacity == 0 {
            return Err(RuntimeConfigError::ZeroSetting {
                field: "mqtt.request_capacity",
            });
        }
        if !self.dry_run {
            BrokerAddress::parse(&self.mqtt.url)?;
        }
        self.orchestrator.validate()?;
        Ok(())
    }

    pub fn topics(&self) -> BridgeTopics {
        BridgeTopics::new(&self.base_topic)
    }

    pub fn client_id(&self) -> String {
        self.mqtt
            .client_id
            .clone()
            .unwrap_or_else(generate_client_id)
    }
}

/// `hue-reset-` followed by 8 random lowercase hex digits.
pub fn generate_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("hue-reset-{}", &id[..8])
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
