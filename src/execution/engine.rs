//! Main execution engine - orchestrates a pipeline run

use crate::{
    core::{
        ConditionEvaluator, PipelineDefinition, PipelineRun, RunStatus, StepRunRecord, Value,
        VariableScope,
    },
    execution::{BatchCoordinator, EngineConfig, ExecutionMode, RunInfo, StepExecutor},
    metering::{MeteringSink, NoopMetering},
    persistence::RunStore,
    registry::PipelineRegistry,
    skill::{SkillRegistry, SkillServices},
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors that prevent a run from being created
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Pipeline not found: {0}")]
    DefinitionNotFound(String),

    #[error("Usage limit exceeded: {0}")]
    LimitExceeded(String),
}

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_id: String,
    },
    StepSkipped {
        run_id: Uuid,
        step_id: String,
    },
    /// One per record appended to the run, in order
    StepRecorded {
        run_id: Uuid,
        record: StepRunRecord,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

struct ActiveRun {
    snapshot: PipelineRun,
    cancelled: Arc<AtomicBool>,
}

type ActiveRuns = Arc<Mutex<HashMap<Uuid, ActiveRun>>>;

/// Removes a run from the active set when `execute_pipeline` exits by any path
struct ActiveRunGuard {
    active_runs: ActiveRuns,
    run_id: Uuid,
    released: bool,
}

impl ActiveRunGuard {
    async fn release(mut self) {
        self.active_runs.lock().await.remove(&self.run_id);
        self.released = true;
    }
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!("Run {} exited abnormally; dropping it from active runs", self.run_id);
        if let Ok(mut active_runs) = self.active_runs.try_lock() {
            active_runs.remove(&self.run_id);
        } else if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let active_runs = self.active_runs.clone();
            let run_id = self.run_id;
            handle.spawn(async move {
                active_runs.lock().await.remove(&run_id);
            });
        }
    }
}

/// Pipeline execution engine
///
/// Construct one per process and share it; runs are independent and may
/// execute concurrently.
pub struct ExecutionEngine {
    registry: Arc<PipelineRegistry>,
    skills: Arc<SkillRegistry>,
    services: SkillServices,
    metering: Arc<dyn MeteringSink>,
    store: Option<Arc<dyn RunStore>>,
    config: EngineConfig,
    active_runs: ActiveRuns,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl ExecutionEngine {
    pub fn new(registry: Arc<PipelineRegistry>, skills: Arc<SkillRegistry>) -> Self {
        Self {
            registry,
            skills,
            services: SkillServices::default(),
            metering: Arc::new(NoopMetering),
            store: None,
            config: EngineConfig::default(),
            active_runs: Arc::new(Mutex::new(HashMap::new())),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_services(mut self, services: SkillServices) -> Self {
        self.services = services;
        self
    }

    pub fn with_metering(mut self, metering: Arc<dyn MeteringSink>) -> Self {
        self.metering = metering;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<PipelineRegistry> {
        &self.registry
    }

    pub fn skills(&self) -> &Arc<SkillRegistry> {
        &self.skills
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Snapshot of a run: in-flight runs from memory, finished ones from the store
    pub async fn get_run(&self, run_id: Uuid) -> Option<PipelineRun> {
        if let Some(active) = self.active_runs.lock().await.get(&run_id) {
            return Some(active.snapshot.clone());
        }

        let store = self.store.as_ref()?;
        match store.load_run(run_id).await {
            Ok(run) => run,
            Err(e) => {
                warn!("Failed to load run {}: {:#}", run_id, e);
                None
            }
        }
    }

    /// Snapshots of all in-flight runs
    pub async fn active_runs(&self) -> Vec<PipelineRun> {
        let mut runs: Vec<PipelineRun> = self
            .active_runs
            .lock()
            .await
            .values()
            .map(|active| active.snapshot.clone())
            .collect();
        runs.sort_by_key(|run| run.started_at);
        runs
    }

    /// Request cancellation of an in-flight run
    ///
    /// The step currently executing runs to completion; the run stops at the
    /// next step boundary. Returns false if the run is not active.
    pub async fn cancel_run(&self, run_id: Uuid) -> bool {
        let mut active_runs = self.active_runs.lock().await;
        match active_runs.get_mut(&run_id) {
            Some(active) => {
                info!("Cancellation requested for run {}", run_id);
                active.cancelled.store(true, Ordering::SeqCst);
                active.snapshot.cancel();
                true
            }
            None => false,
        }
    }

    /// Execute a registered pipeline
    ///
    /// Returns `Err` only when no run is created (unknown pipeline or usage
    /// limit reached). Step failures come back as a `Failed` run.
    pub async fn execute_pipeline(
        &self,
        pipeline_id: &str,
        inputs: BTreeMap<String, Value>,
        brand_id: Option<String>,
    ) -> Result<PipelineRun, EngineError> {
        let definition = self
            .registry
            .get(pipeline_id)
            .ok_or_else(|| EngineError::DefinitionNotFound(pipeline_id.to_string()))?;

        let limits = self.metering.check_limits().await;
        if !limits.allowed {
            let reason = limits
                .reason
                .unwrap_or_else(|| "usage limit reached".to_string());
            warn!("Refusing to start pipeline {}: {}", pipeline_id, reason);
            return Err(EngineError::LimitExceeded(reason));
        }

        let mut run = PipelineRun::new(&definition.id, brand_id, inputs);
        let cancelled = Arc::new(AtomicBool::new(false));
        self.active_runs.lock().await.insert(
            run.id,
            ActiveRun {
                snapshot: run.clone(),
                cancelled: cancelled.clone(),
            },
        );
        let guard = ActiveRunGuard {
            active_runs: self.active_runs.clone(),
            run_id: run.id,
            released: false,
        };

        info!("Starting pipeline execution: {} ({})", definition.id, run.id);
        self.emit_event(ExecutionEvent::RunStarted {
            run_id: run.id,
            pipeline_id: definition.id.clone(),
        })
        .await;

        self.run_steps(&definition, &mut run, &cancelled).await;

        if cancelled.load(Ordering::SeqCst) {
            run.cancel();
        }
        run.complete();
        run.finalize();

        guard.release().await;
        if let Some(store) = &self.store {
            if let Err(e) = store.save_run(&run).await {
                error!("Failed to persist finished run {}: {:#}", run.id, e);
            }
        }

        info!(
            "Pipeline execution finished: {} - {}",
            definition.id,
            run.status.as_str()
        );
        self.emit_event(ExecutionEvent::RunFinished {
            run_id: run.id,
            status: run.status,
        })
        .await;

        Ok(run)
    }

    /// Drive the step loop; leaves `run` running unless a step fails,
    /// cancellation is observed, or bookkeeping fails
    async fn run_steps(
        &self,
        definition: &PipelineDefinition,
        run: &mut PipelineRun,
        cancelled: &AtomicBool,
    ) {
        let executor = StepExecutor::new(self.skills.clone(), self.metering.clone())
            .with_services(self.services.clone())
            .with_config(self.config.clone());
        let coordinator = BatchCoordinator::new(Arc::new(executor));
        let run_info = RunInfo {
            run_id: run.id,
            pipeline_id: definition.id.clone(),
            brand_id: run.brand_id.clone(),
        };
        let mut scope = VariableScope::seeded(&run.inputs);

        for step in &definition.steps {
            if cancelled.load(Ordering::SeqCst) {
                info!("Run {} cancelled before step {}", run.id, step.id);
                run.cancel();
                return;
            }

            if let Some(condition) = &step.condition {
                if !ConditionEvaluator::evaluate(condition, &scope) {
                    info!("Skipping step {}: condition '{}' not met", step.id, condition);
                    self.emit_event(ExecutionEvent::StepSkipped {
                        run_id: run.id,
                        step_id: step.id.clone(),
                    })
                    .await;
                    continue;
                }
            }

            let mode = ExecutionMode::for_step(step);
            let inputs = scope.resolve_inputs(&step.inputs);
            debug!("Resolved inputs for step {}: {:?}", step.id, inputs);

            let records = coordinator.run_step(&run_info, step, inputs, mode).await;
            let failure = records
                .iter()
                .find(|record| record.is_failed())
                .map(|record| record.error.clone().unwrap_or_default());

            for record in &records {
                run.push_record(record.clone());
                self.emit_event(ExecutionEvent::StepRecorded {
                    run_id: run.id,
                    record: record.clone(),
                })
                .await;
            }

            if let Some(error) = failure {
                if cancelled.load(Ordering::SeqCst) {
                    run.cancel();
                } else {
                    run.fail(format!("Step \"{}\" failed: {}", step.id, error));
                }
                if let Err(e) = self.publish(run).await {
                    warn!("Failed to persist run {} after step {}: {:#}", run.id, step.id, e);
                }
                return;
            }

            let outputs = records.into_iter().map(|record| record.output.unwrap_or_default());
            if mode.is_batch() {
                scope.bind_batch_output(&step.output, outputs.collect());
            } else if let Some(output) = outputs.last() {
                scope.bind_output(&step.output, output);
            }

            if let Err(e) = self.publish(run).await {
                error!("Run {} bookkeeping failed after step {}: {:#}", run.id, step.id, e);
                run.fail(e.to_string());
                return;
            }
        }
    }

    /// Refresh the active snapshot and hand the run to the store
    async fn publish(&self, run: &PipelineRun) -> anyhow::Result<()> {
        if let Some(active) = self.active_runs.lock().await.get_mut(&run.id) {
            if active.snapshot.status == RunStatus::Cancelled {
                let mut snapshot = run.clone();
                snapshot.cancel();
                active.snapshot = snapshot;
            } else {
                active.snapshot = run.clone();
            }
        }

        if let Some(store) = &self.store {
            store.save_run(run).await?;
        }
        Ok(())
    }
}
