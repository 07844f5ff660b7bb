//! Engine-wide execution settings

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings shared by every run an engine executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Invocations per window in a parallel batch
    #[serde(default = "default_parallel_limit")]
    pub parallel_limit: usize,

    /// Base delay the retry backoff is multiplied from
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Timeout for steps that don't set their own
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
}

fn default_parallel_limit() -> usize {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_limit: default_parallel_limit(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            step_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load engine settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse engine settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        if config.parallel_limit == 0 {
            anyhow::bail!("parallel_limit must be at least 1");
        }
        Ok(config)
    }

    /// Set the parallel batch window size (clamped to at least 1)
    pub fn with_parallel_limit(mut self, limit: usize) -> Self {
        self.parallel_limit = limit.max(1);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_step_timeout(mut self, secs: u64) -> Self {
        self.step_timeout_secs = Some(secs);
        self
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
