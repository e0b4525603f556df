//! The phased import: phase contract, the seven phases and the orchestrator
//! that runs them.

pub mod orchestrator;
pub mod persist;
pub mod phase;
pub mod phases;

pub use orchestrator::{ImportOrchestrator, RunOutcome};
pub use persist::Persist;
pub use phase::{BatchProgress, Phase, PhaseContext, PhaseReport};
