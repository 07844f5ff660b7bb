//! Pipeline configuration from YAML or JSON

use crate::core::{
    pipeline::PipelineDefinition,
    retry::RetryPolicy,
    step::{BatchConfig, ModelTier},
    value::Value,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Unique pipeline identifier
    pub id: String,

    /// Human-readable name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Pipeline version
    #[serde(default)]
    pub version: Option<String>,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Case-insensitive regex matched against free-text requests
    #[serde(default)]
    pub trigger: Option<String>,

    /// Ordered pipeline steps
    pub steps: Vec<StepConfig>,
}

/// Step configuration as declared in a definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Skill to invoke
    pub skill: String,

    /// Declared inputs
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,

    /// Boolean expression gating the step
    #[serde(default)]
    pub condition: Option<String>,

    /// Retry policy
    #[serde(default)]
    pub retry: Option<RetryPolicy>,

    /// Fan-out configuration
    #[serde(default)]
    pub batch: Option<BatchConfig>,

    /// Output variable name (defaults to the step id)
    #[serde(default)]
    pub output: Option<String>,

    /// Model size hint
    #[serde(default, alias = "model")]
    pub model_tier: Option<ModelTier>,

    /// Per-attempt timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl PipelineConfig {
    /// Load a pipeline configuration from a file (`.json` or YAML)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse pipeline configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("Pipeline id must not be empty");
        }

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
            if step.id.trim().is_empty() {
                anyhow::bail!("Pipeline '{}' has a step with an empty id", self.id);
            }
            if step.skill.trim().is_empty() {
                anyhow::bail!("Step '{}' does not name a skill", step.id);
            }
            if let Some(batch) = &step.batch {
                if batch.count == 0 {
                    anyhow::bail!("Step '{}' has a batch count of 0", step.id);
                }
            }
            if let Some(output) = &step.output {
                if output.trim().is_empty() || output.starts_with('$') {
                    anyhow::bail!("Step '{}' has an invalid output name '{}'", step.id, output);
                }
            }
        }

        Ok(())
    }

    /// Convert config to an immutable pipeline definition
    pub fn to_definition(&self) -> PipelineDefinition {
        PipelineDefinition::from_config(self)
    }
}
