//! Pipeline domain model

use crate::core::{config::PipelineConfig, step::StepDefinition};

/// An immutable pipeline definition
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    /// Unique pipeline identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Definition version
    pub version: String,

    /// Optional description
    pub description: Option<String>,

    /// Steps in declared execution order
    pub steps: Vec<StepDefinition>,

    /// Case-insensitive trigger regex
    pub trigger: Option<String>,
}

impl PipelineDefinition {
    /// Create a pipeline definition from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        PipelineDefinition {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            version: config.version.clone().unwrap_or_else(|| "1.0".to_string()),
            description: config.description.clone(),
            steps: config.steps.iter().map(StepDefinition::from_config).collect(),
            trigger: config.trigger.clone().filter(|t| !t.trim().is_empty()),
        }
    }

    /// Minimal definition for programmatic construction
    pub fn new(id: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        let id = id.into();
        PipelineDefinition {
            name: id.clone(),
            id,
            version: "1.0".to_string(),
            description: None,
            steps,
            trigger: None,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }
}
