//! Execution state models

use crate::core::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Overall pipeline run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is executing steps
    Running,
    /// All steps finished (or were skipped)
    Completed,
    /// A step failed or the run loop errored
    Failed,
    /// Run was cancelled by an external actor
    Cancelled,
}

impl RunStatus {
    /// Check if the status is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

/// Status of a single skill invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Record of one attempted skill invocation
///
/// A batch of N invocations produces N records. Retries of one invocation
/// collapse into a single record carrying the final outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRunRecord {
    /// Step id, or `id[index]` for batch invocations
    pub step_id: String,

    /// Index within the batch, if the step was batched
    pub batch_index: Option<usize>,

    pub status: StepStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Output of the successful attempt
    pub output: Option<Value>,

    pub tokens_used: u64,

    pub cost_units: f64,

    pub model_used: Option<String>,

    pub duration_ms: u64,

    /// Error of the last failed attempt
    pub error: Option<String>,

    /// Number of attempts made
    pub attempts: u32,
}

impl StepRunRecord {
    /// Create a running record
    pub fn start(step_id: impl Into<String>, batch_index: Option<usize>) -> Self {
        Self {
            step_id: step_id.into(),
            batch_index,
            status: StepStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            output: None,
            tokens_used: 0,
            cost_units: 0.0,
            model_used: None,
            duration_ms: 0,
            error: None,
            attempts: 0,
        }
    }

    /// Mark as completed with the successful attempt's output
    pub fn complete(
        &mut self,
        output: Value,
        tokens_used: u64,
        cost_units: f64,
        model_used: Option<String>,
    ) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.tokens_used = tokens_used;
        self.cost_units = cost_units;
        self.model_used = model_used;
        self.error = None;
        self.finish();
    }

    /// Mark as failed with the last error
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.finish();
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = elapsed_ms(self.started_at, now);
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Usage attributed to a single model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub tokens: u64,
    pub cost_units: f64,
    pub invocations: u32,
}

/// Aggregated metering for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetering {
    pub total_tokens: u64,
    pub total_cost_units: f64,
    pub by_model: BTreeMap<String, ModelUsage>,
    pub total_duration_ms: u64,
}

impl RunMetering {
    /// Fold one step record into the totals
    pub fn add(&mut self, record: &StepRunRecord) {
        self.total_tokens += record.tokens_used;
        self.total_cost_units += record.cost_units;
        if let Some(model) = &record.model_used {
            let usage = self.by_model.entry(model.clone()).or_default();
            usage.tokens += record.tokens_used;
            usage.cost_units += record.cost_units;
            usage.invocations += 1;
        }
    }
}

/// One execution of a pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run ID
    pub id: Uuid,

    pub pipeline_id: String,

    pub brand_id: Option<String>,

    pub status: RunStatus,

    /// Records in the order they were appended
    pub steps: Vec<StepRunRecord>,

    /// Inputs the run was started with
    pub inputs: BTreeMap<String, Value>,

    pub metering: RunMetering,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Human-readable failure reason
    pub error: Option<String>,
}

impl PipelineRun {
    /// Create a running pipeline run
    pub fn new(
        pipeline_id: impl Into<String>,
        brand_id: Option<String>,
        inputs: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id: pipeline_id.into(),
            brand_id,
            status: RunStatus::Running,
            steps: Vec::new(),
            inputs,
            metering: RunMetering::default(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Append a step record and fold its metering
    pub fn push_record(&mut self, record: StepRunRecord) {
        self.metering.add(&record);
        self.steps.push(record);
    }

    /// Mark run as completed (no-op once terminal)
    pub fn complete(&mut self) -> bool {
        self.transition(RunStatus::Completed, None)
    }

    /// Mark run as failed (no-op once terminal)
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        self.transition(RunStatus::Failed, Some(error.into()))
    }

    /// Mark run as cancelled (no-op once terminal)
    pub fn cancel(&mut self) -> bool {
        self.transition(RunStatus::Cancelled, Some("Run cancelled".to_string()))
    }

    fn transition(&mut self, status: RunStatus, error: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = error;
        true
    }

    /// Stamp completion time and total duration
    pub fn finalize(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.metering.total_duration_ms = elapsed_ms(self.started_at, now);
    }

    /// Records belonging to a step definition (including batch invocations)
    pub fn records_for(&self, step_id: &str) -> Vec<&StepRunRecord> {
        let prefix = format!("{}[", step_id);
        self.steps
            .iter()
            .filter(|r| r.step_id == step_id || r.step_id.starts_with(&prefix))
            .collect()
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|r| r.is_completed()).count()
    }

    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|r| r.is_failed()).count()
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    to.signed_duration_since(from).num_milliseconds().max(0) as u64
}
