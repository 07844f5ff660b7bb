//! Pipeline execution engine

pub mod config;
pub mod engine;
pub mod executor;
pub mod scheduler;

pub use config::EngineConfig;
pub use engine::{EngineError, EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{RunInfo, StepExecutor};
pub use scheduler::{BatchCoordinator, ExecutionMode};
