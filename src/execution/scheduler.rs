//! Batch coordinator - fans a step out into sequential or windowed parallel invocations

use crate::{
    core::{StepDefinition, StepRunRecord, Value},
    execution::executor::{RunInfo, StepExecutor},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// How a step's invocations are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One invocation, output bound as-is
    Single,

    /// `count` invocations, one after another
    Sequential { count: usize },

    /// `count` invocations in fixed-size concurrent windows
    Parallel { count: usize },
}

impl ExecutionMode {
    /// Pick the mode from a step's batch config; a batch of one runs as `Single`
    pub fn for_step(step: &StepDefinition) -> Self {
        match step.batch {
            Some(batch) if batch.count > 1 && batch.parallel => {
                ExecutionMode::Parallel { count: batch.count }
            }
            Some(batch) if batch.count > 1 => ExecutionMode::Sequential { count: batch.count },
            _ => ExecutionMode::Single,
        }
    }

    pub fn is_batch(&self) -> bool {
        !matches!(self, ExecutionMode::Single)
    }
}

/// Runs a step in whichever mode its config asks for
pub struct BatchCoordinator {
    executor: Arc<StepExecutor>,
    parallel_limit: usize,
}

impl BatchCoordinator {
    pub fn new(executor: Arc<StepExecutor>) -> Self {
        let parallel_limit = executor.config().parallel_limit.max(1);
        Self {
            executor,
            parallel_limit,
        }
    }

    /// Execute `step` and return its records in invocation index order
    ///
    /// Every invocation runs on its own task; a skill that panics yields a
    /// failed record. Sequential batches stop at the first failed invocation.
    /// Parallel batches let the current window finish, then start no further
    /// windows.
    pub async fn run_step(
        &self,
        run: &RunInfo,
        step: &StepDefinition,
        inputs: BTreeMap<String, Value>,
        mode: ExecutionMode,
    ) -> Vec<StepRunRecord> {
        let step = Arc::new(step.clone());
        match mode {
            ExecutionMode::Single => vec![self.run_invocation(run, &step, inputs, None).await],
            ExecutionMode::Sequential { count } => {
                self.run_sequential(run, &step, &inputs, count).await
            }
            ExecutionMode::Parallel { count } => {
                self.run_parallel(run, &step, &inputs, count).await
            }
        }
    }

    async fn run_invocation(
        &self,
        run: &RunInfo,
        step: &Arc<StepDefinition>,
        inputs: BTreeMap<String, Value>,
        batch_index: Option<usize>,
    ) -> StepRunRecord {
        let executor = self.executor.clone();
        let task_run = run.clone();
        let task_step = step.clone();
        let handle = tokio::spawn(async move {
            executor
                .execute(&task_run, &task_step, inputs, batch_index)
                .await
        });

        match handle.await {
            Ok(record) => record,
            Err(e) => {
                error!("Invocation of {} did not finish: {}", step.id, e);
                aborted_record(step, batch_index)
            }
        }
    }

    async fn run_sequential(
        &self,
        run: &RunInfo,
        step: &Arc<StepDefinition>,
        inputs: &BTreeMap<String, Value>,
        count: usize,
    ) -> Vec<StepRunRecord> {
        info!("Running step {} as sequential batch of {}", step.id, count);
        let mut records = Vec::new();

        for index in 0..count {
            let record = self
                .run_invocation(run, step, indexed_inputs(inputs, index), Some(index))
                .await;
            let failed = record.is_failed();
            records.push(record);
            if failed {
                warn!("Sequential batch {} stopped at index {}", step.id, index);
                break;
            }
        }

        records
    }

    async fn run_parallel(
        &self,
        run: &RunInfo,
        step: &Arc<StepDefinition>,
        inputs: &BTreeMap<String, Value>,
        count: usize,
    ) -> Vec<StepRunRecord> {
        info!(
            "Running step {} as parallel batch of {} (window {})",
            step.id, count, self.parallel_limit
        );
        let mut records = Vec::new();
        let mut window_start = 0;

        while window_start < count {
            let window_end = window_start.saturating_add(self.parallel_limit).min(count);
            let mut slots: Vec<Option<StepRunRecord>> = vec![None; window_end - window_start];
            let mut tasks = JoinSet::new();

            for index in window_start..window_end {
                let executor = self.executor.clone();
                let run = run.clone();
                let step = step.clone();
                let inputs = indexed_inputs(inputs, index);
                tasks.spawn(async move {
                    let record = executor.execute(&run, &step, inputs, Some(index)).await;
                    (index, record)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, record)) => slots[index - window_start] = Some(record),
                    Err(e) => error!("Batch invocation of {} did not finish: {}", step.id, e),
                }
            }

            let mut window_failed = false;
            for (offset, slot) in slots.into_iter().enumerate() {
                let record =
                    slot.unwrap_or_else(|| aborted_record(step, Some(window_start + offset)));
                window_failed |= record.is_failed();
                records.push(record);
            }

            if window_failed {
                warn!(
                    "Parallel batch {} failed in window starting at {}; skipping remaining windows",
                    step.id, window_start
                );
                break;
            }
            window_start = window_end;
        }

        records
    }
}

/// Failed record for an invocation whose task panicked or was cancelled
fn aborted_record(step: &StepDefinition, batch_index: Option<usize>) -> StepRunRecord {
    let invocation_id = match batch_index {
        Some(index) => step.invocation_id(index),
        None => step.id.clone(),
    };
    let mut record = StepRunRecord::start(invocation_id, batch_index);
    record.fail("Invocation aborted unexpectedly");
    record
}

/// Inputs for one batch invocation, with `_index` injected
fn indexed_inputs(inputs: &BTreeMap<String, Value>, index: usize) -> BTreeMap<String, Value> {
    let mut inputs = inputs.clone();
    inputs.insert("_index".to_string(), Value::from(index));
    inputs
}
