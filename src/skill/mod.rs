//! Pluggable skills invoked by pipeline steps

pub mod registry;
pub mod response;
pub mod services;

use crate::core::{ModelTier, Value};
use async_trait::async_trait;
use std::collections::BTreeMap;
use uuid::Uuid;

pub use registry::SkillRegistry;
pub use response::{SkillError, SkillOutput};
pub use services::{
    Completion, CompletionRequest, LlmClient, MemoryStore, SkillServices, StepLogger, ToolInvoker,
};

/// Everything a skill receives for one invocation
#[derive(Debug, Clone)]
pub struct SkillContext {
    pub run_id: Uuid,

    pub pipeline_id: String,

    /// Step id, or `id[index]` inside a batch
    pub invocation_id: String,

    /// Inputs after reference resolution (batches add `_index`)
    pub inputs: BTreeMap<String, Value>,

    pub model_tier: ModelTier,

    pub services: SkillServices,

    pub logger: StepLogger,
}

impl SkillContext {
    /// Get a resolved input
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    /// Get a resolved input as a string, or fail with `InvalidInput`
    pub fn require_str(&self, key: &str) -> Result<&str, SkillError> {
        self.inputs
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| SkillError::InvalidInput(format!("missing string input '{}'", key)))
    }

    /// Position inside a batch, if any
    pub fn batch_index(&self) -> Option<usize> {
        self.inputs
            .get("_index")
            .and_then(Value::as_f64)
            .map(|i| i as usize)
    }
}

/// Trait for skill execution - allows for different implementations
#[async_trait]
pub trait Skill: Send + Sync {
    /// Identifier steps use to reference this skill
    fn id(&self) -> &str;

    /// Execute the skill once
    async fn execute(&self, context: SkillContext) -> Result<SkillOutput, SkillError>;
}
