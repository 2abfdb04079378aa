//! Orchestration: one observation driven through plan, execute, critique.

mod orchestrator;

pub use orchestrator::{EngineError, Orchestrator};
