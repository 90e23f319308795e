//! # Reset Runtime Library
//!
//! Exposes the internals of the `hue-reset` binary for testing. The entry
//! point is `main.rs`.
//!
//! ## Layout
//!
//! - `cli` - command line flags
//! - `config` - layered runtime configuration
//! - `adapters/` - MQTT transport and Prometheus metrics
//! - `input` - operator command parsing and QR debounce
//! - `runtime` - wiring and the command loop

pub mod adapters;
pub mod cli;
pub mod config;
pub mod input;
pub mod runtime;

pub use cli::Cli;
pub use config::{BrokerAddress, MqttSettings, RuntimeConfig, RuntimeConfigError};
pub use input::{InputCommand, InputError, QrDebounce};
pub use runtime::ResetRuntime;
