//! Step domain model

use crate::core::{config::StepConfig, retry::RetryPolicy, value::Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Model size hint passed through to skills and metering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    #[default]
    Standard,
    Premium,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Fast => "fast",
            ModelTier::Standard => "standard",
            ModelTier::Premium => "premium",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan-out configuration for a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Number of invocations
    pub count: usize,

    /// Run invocations concurrently (in windows) instead of one after another
    #[serde(default)]
    pub parallel: bool,
}

/// A single step in a pipeline definition
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinition {
    /// Unique step identifier within the pipeline
    pub id: String,

    /// Skill invoked by this step
    pub skill: String,

    /// Declared inputs: literals, `$refs`, `${templates}` or `{ $ref: path }`
    pub inputs: BTreeMap<String, Value>,

    /// Optional condition; the step is skipped when it is not true
    pub condition: Option<String>,

    /// Retry policy for failed invocations
    pub retry: RetryPolicy,

    /// Optional fan-out
    pub batch: Option<BatchConfig>,

    /// Name the output is bound under (`$<output>`)
    pub output: String,

    /// Model size hint
    pub model_tier: ModelTier,

    /// Per-attempt timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl StepDefinition {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig) -> Self {
        StepDefinition {
            id: config.id.clone(),
            skill: config.skill.clone(),
            inputs: config.inputs.clone(),
            condition: config
                .condition
                .as_ref()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            retry: config.retry.unwrap_or_default(),
            batch: config.batch,
            output: config.output.clone().unwrap_or_else(|| config.id.clone()),
            model_tier: config.model_tier.unwrap_or_default(),
            timeout_secs: config.timeout_secs,
        }
    }

    /// Minimal step for programmatic construction
    pub fn new(id: impl Into<String>, skill: impl Into<String>) -> Self {
        let id = id.into();
        StepDefinition {
            output: id.clone(),
            id,
            skill: skill.into(),
            inputs: BTreeMap::new(),
            condition: None,
            retry: RetryPolicy::none(),
            batch: None,
            model_tier: ModelTier::default(),
            timeout_secs: None,
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch(mut self, count: usize, parallel: bool) -> Self {
        self.batch = Some(BatchConfig { count, parallel });
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Identifier for one invocation of a batch (`id[index]`)
    pub fn invocation_id(&self, index: usize) -> String {
        format!("{}[{}]", self.id, index)
    }
}
