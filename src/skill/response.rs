//! Skill output and error types

use crate::core::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for skill and service operations
#[derive(Debug, Clone, Error)]
pub enum SkillError {
    #[error("{0}")]
    Failed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service error: {0}")]
    Service(String),
}

/// Result of a successful skill invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillOutput {
    /// The produced value
    pub output: Value,

    /// Total tokens consumed
    pub tokens_used: u64,

    /// Cost in abstract units
    pub cost_units: f64,

    /// Model that served the request, if any
    pub model_used: Option<String>,
}

impl SkillOutput {
    /// Create an output with no usage attached
    pub fn new(output: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
            tokens_used: 0,
            cost_units: 0.0,
            model_used: None,
        }
    }

    pub fn with_usage(mut self, tokens_used: u64, cost_units: f64) -> Self {
        self.tokens_used = tokens_used;
        self.cost_units = cost_units;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_used = Some(model.into());
        self
    }

    /// Split total tokens into (input, output) using a 60/40 ratio
    pub fn split_tokens(&self) -> (u64, u64) {
        let input = (self.tokens_used as f64 * 0.6).round() as u64;
        (input, self.tokens_used.saturating_sub(input))
    }
}
