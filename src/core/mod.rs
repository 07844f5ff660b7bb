//! Core domain models for pipelines
//!
//! This module defines the fundamental data structures that represent
//! pipeline definitions, steps, run state and the per-run variable scope.

pub mod condition;
pub mod config;
pub mod pipeline;
pub mod retry;
pub mod scope;
pub mod state;
pub mod step;
pub mod value;

pub use condition::{ConditionError, ConditionEvaluator};
pub use pipeline::*;
pub use retry::{Backoff, RetryPolicy};
pub use scope::VariableScope;
pub use state::*;
pub use step::*;
pub use value::Value;
