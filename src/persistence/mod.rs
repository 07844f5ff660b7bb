//! Persistence hand-off for pipeline runs

use crate::core::{PipelineRun, RunStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    pub pipeline_id: String,

    pub brand_id: Option<String>,

    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of completed step records
    pub completed_steps: usize,

    /// Number of failed step records
    pub failed_steps: usize,

    pub total_tokens: u64,

    pub error: Option<String>,
}

/// Trait for run storage backends
#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    /// Save (insert or overwrite) a run snapshot
    async fn save_run(&self, run: &PipelineRun) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<PipelineRun>>;

    /// List runs of a pipeline, oldest first
    async fn list_runs(&self, pipeline_id: &str) -> Result<Vec<RunSummary>>;
}

/// In-memory run store (for testing or ephemeral use)
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<Uuid, PipelineRun>>,
    by_pipeline: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RunStore for InMemoryRunStore {
    async fn save_run(&self, run: &PipelineRun) -> Result<()> {
        let is_new = self.runs.write().await.insert(run.id, run.clone()).is_none();

        if is_new {
            self.by_pipeline
                .write()
                .await
                .entry(run.pipeline_id.clone())
                .or_default()
                .push(run.id);
        }

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<PipelineRun>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_id: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        Ok(by_pipeline
            .get(pipeline_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| runs.get(id))
                    .map(create_summary)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Create a summary from a run
pub fn create_summary(run: &PipelineRun) -> RunSummary {
    RunSummary {
        run_id: run.id,
        pipeline_id: run.pipeline_id.clone(),
        brand_id: run.brand_id.clone(),
        status: run.status,
        started_at: run.started_at,
        completed_at: run.completed_at,
        completed_steps: run.completed_steps(),
        failed_steps: run.failed_steps(),
        total_tokens: run.metering.total_tokens,
        error: run.error.clone(),
    }
}
