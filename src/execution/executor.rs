//! Step executor - runs one skill invocation with retry and metering

use crate::{
    core::{StepDefinition, StepRunRecord, Value},
    execution::EngineConfig,
    metering::{MeteringEntry, MeteringSink},
    skill::{SkillContext, SkillError, SkillOutput, SkillRegistry, SkillServices, StepLogger},
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Identity of the run an invocation belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub pipeline_id: String,
    pub brand_id: Option<String>,
}

/// Executes a single skill invocation
pub struct StepExecutor {
    skills: Arc<SkillRegistry>,
    services: SkillServices,
    metering: Arc<dyn MeteringSink>,
    config: EngineConfig,
}

impl StepExecutor {
    pub fn new(skills: Arc<SkillRegistry>, metering: Arc<dyn MeteringSink>) -> Self {
        Self {
            skills,
            services: SkillServices::default(),
            metering,
            config: EngineConfig::default(),
        }
    }

    pub fn with_services(mut self, services: SkillServices) -> Self {
        self.services = services;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one invocation of `step` with already-resolved inputs
    ///
    /// Always returns a record: `Completed` with the first successful
    /// attempt's output, or `Failed` with the last attempt's error.
    pub async fn execute(
        &self,
        run: &RunInfo,
        step: &StepDefinition,
        inputs: BTreeMap<String, Value>,
        batch_index: Option<usize>,
    ) -> StepRunRecord {
        let invocation_id = match batch_index {
            Some(index) => step.invocation_id(index),
            None => step.id.clone(),
        };
        let mut record = StepRunRecord::start(&invocation_id, batch_index);

        let Some(skill) = self.skills.get(&step.skill) else {
            error!("Step {} references unknown skill '{}'", invocation_id, step.skill);
            record.fail(format!("Skill not found: {}", step.skill));
            return record;
        };

        let max_attempts = step.retry.max_attempts();
        let step_timeout = step.timeout_secs.or(self.config.step_timeout_secs);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let delay = step.retry.delay_before(attempt, self.config.retry_base_delay());
            if !delay.is_zero() {
                debug!("Waiting {:?} before retrying {}", delay, invocation_id);
                sleep(delay).await;
            }

            info!(
                "Executing step: {} (attempt {}/{})",
                invocation_id,
                attempt + 1,
                max_attempts
            );
            record.attempts = attempt + 1;

            let context = SkillContext {
                run_id: run.run_id,
                pipeline_id: run.pipeline_id.clone(),
                invocation_id: invocation_id.clone(),
                inputs: inputs.clone(),
                model_tier: step.model_tier,
                services: self.services.clone(),
                logger: StepLogger::new(run.run_id, invocation_id.clone()),
            };

            let result = match step_timeout {
                Some(secs) => match timeout(Duration::from_secs(secs), skill.execute(context)).await {
                    Ok(result) => result,
                    Err(_) => Err(SkillError::Timeout(secs)),
                },
                None => skill.execute(context).await,
            };

            match result {
                Ok(output) => {
                    info!("Step {} completed successfully", invocation_id);
                    self.meter(run, step, &output);
                    record.complete(
                        output.output,
                        output.tokens_used,
                        output.cost_units,
                        output.model_used,
                    );
                    return record;
                }
                Err(e) => {
                    warn!(
                        "Step {} attempt {}/{} failed: {}",
                        invocation_id,
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "No attempts made".to_string());
        error!("Step {} failed after {} attempt(s): {}", invocation_id, max_attempts, error);
        record.fail(error);
        record
    }

    fn meter(&self, run: &RunInfo, step: &StepDefinition, output: &SkillOutput) {
        let (input_tokens, output_tokens) = output.split_tokens();
        self.metering.record(MeteringEntry {
            run_id: run.run_id,
            pipeline_id: run.pipeline_id.clone(),
            brand_id: run.brand_id.clone(),
            skill_id: step.skill.clone(),
            model: output.model_used.clone(),
            tier: step.model_tier,
            input_tokens,
            output_tokens,
            cost_units: output.cost_units,
            recorded_at: Utc::now(),
        });
    }
}
