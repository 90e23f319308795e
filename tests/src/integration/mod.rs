//! Cross-crate integration scenarios.

pub mod fixtures;
pub mod reset_cycle;
pub mod runtime_flows;
