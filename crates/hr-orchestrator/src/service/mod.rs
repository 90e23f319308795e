//! Service layer: the orchestrator state machine and its dispatch loop.

pub mod orchestrator;
pub mod runner;


pub use orchestrator::{OrchestratorSnapshot, ResetOrchestrator, ResetTicket, Submission};
pub use runner::{OrchestratorBuilder, OrchestratorHandle, OrchestratorRunner};
