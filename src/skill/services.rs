//! Service handles available to skills

use crate::core::{ModelTier, Value};
use crate::skill::SkillError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A completion request sent to an LLM backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub tier: ModelTier,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            tier,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Response from an LLM backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub tokens_used: u64,
    pub cost_units: f64,
}

/// LLM backend used by skills
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, SkillError>;
}

/// External tool invocation
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, tool: &str, arguments: Value) -> Result<Value, SkillError>;
}

/// Key-value memory shared across runs
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn recall(&self, key: &str) -> Result<Option<Value>, SkillError>;

    async fn remember(&self, key: &str, value: Value) -> Result<(), SkillError>;
}

/// Handles passed to every skill invocation
#[derive(Clone, Default)]
pub struct SkillServices {
    pub llm: Option<Arc<dyn LlmClient>>,
    pub tools: Option<Arc<dyn ToolInvoker>>,
    pub memory: Option<Arc<dyn MemoryStore>>,
}

impl SkillServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolInvoker>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// The LLM client, or a service error if none is configured
    pub fn llm(&self) -> Result<&Arc<dyn LlmClient>, SkillError> {
        self.llm
            .as_ref()
            .ok_or_else(|| SkillError::Service("no LLM client configured".to_string()))
    }

    pub fn tools(&self) -> Result<&Arc<dyn ToolInvoker>, SkillError> {
        self.tools
            .as_ref()
            .ok_or_else(|| SkillError::Service("no tool invoker configured".to_string()))
    }

    pub fn memory(&self) -> Result<&Arc<dyn MemoryStore>, SkillError> {
        self.memory
            .as_ref()
            .ok_or_else(|| SkillError::Service("no memory store configured".to_string()))
    }
}

impl std::fmt::Debug for SkillServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillServices")
            .field("llm", &self.llm.is_some())
            .field("tools", &self.tools.is_some())
            .field("memory", &self.memory.is_some())
            .finish()
    }
}

/// Structured log sink handed to skills
///
/// Every event carries the run id and invocation id.
#[derive(Debug, Clone)]
pub struct StepLogger {
    run_id: Uuid,
    invocation_id: String,
}

impl StepLogger {
    pub fn new(run_id: Uuid, invocation_id: impl Into<String>) -> Self {
        Self {
            run_id,
            invocation_id: invocation_id.into(),
        }
    }

    pub fn debug(&self, message: &str) {
        debug!(run_id = %self.run_id, step = %self.invocation_id, "{}", message);
    }

    pub fn info(&self, message: &str) {
        info!(run_id = %self.run_id, step = %self.invocation_id, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(run_id = %self.run_id, step = %self.invocation_id, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(run_id = %self.run_id, step = %self.invocation_id, "{}", message);
    }
}
