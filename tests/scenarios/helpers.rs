//! Test utility functions for skill-pipeline scenarios

use async_trait::async_trait;
use skill_pipeline::core::config::PipelineConfig;
use skill_pipeline::{
    EngineConfig, ExecutionEngine, PipelineRegistry, PipelineRun, RunStatus, Skill, SkillContext,
    SkillError, SkillOutput, SkillRegistry, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Responder = Box<dyn Fn(&SkillContext, usize) -> Result<SkillOutput, SkillError> + Send + Sync>;
type Latency = Box<dyn Fn(&SkillContext) -> Duration + Send + Sync>;

/// Mock skill whose responses are computed from the context and call number
pub struct ScriptedSkill {
    id: String,
    responder: Responder,
    latency: Option<Latency>,
    calls: AtomicUsize,
}

impl ScriptedSkill {
    pub fn new<F>(id: &str, responder: F) -> Self
    where
        F: Fn(&SkillContext, usize) -> Result<SkillOutput, SkillError> + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            responder: Box::new(responder),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always succeeds with `output`
    pub fn returning(id: &str, output: Value) -> Self {
        Self::new(id, move |_, _| Ok(SkillOutput::new(output.clone()).with_usage(100, 1.0)))
    }

    /// Always fails with `message`
    pub fn failing(id: &str, message: &str) -> Self {
        let message = message.to_string();
        Self::new(id, move |_, _| Err(SkillError::Failed(message.clone())))
    }

    /// Fails the first `failures` calls, then returns `output`
    pub fn flaky(id: &str, failures: usize, output: Value) -> Self {
        Self::new(id, move |_, call| {
            if call < failures {
                Err(SkillError::Failed(format!("attempt {} failed", call + 1)))
            } else {
                Ok(SkillOutput::new(output.clone()))
            }
        })
    }

    /// Returns its resolved inputs as a map
    pub fn echo_inputs(id: &str) -> Self {
        Self::new(id, |ctx, _| {
            let inputs: std::collections::BTreeMap<String, Value> = ctx.inputs.clone();
            Ok(SkillOutput::new(inputs))
        })
    }

    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(&SkillContext) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Box::new(latency));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Skill for ScriptedSkill {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, context: SkillContext) -> Result<SkillOutput, SkillError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(&context)).await;
        }
        (self.responder)(&context, call)
    }
}

/// Engine over the given YAML definitions and skills, with no retry delay
pub fn build_engine(definitions: &[&str], skills: &[Arc<ScriptedSkill>]) -> ExecutionEngine {
    let registry = Arc::new(PipelineRegistry::new());
    for yaml in definitions {
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        registry.register(config.to_definition());
    }

    let mut skill_registry = SkillRegistry::new();
    for skill in skills {
        skill_registry.register(skill.clone());
    }

    ExecutionEngine::new(registry, Arc::new(skill_registry))
        .with_config(EngineConfig::new().with_retry_base_delay(Duration::ZERO))
}

/// Build a map value from string pairs
pub fn map(pairs: &[(&str, Value)]) -> Value {
    Value::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

pub fn inputs(pairs: &[(&str, &str)]) -> std::collections::BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

/// Assert the run completed
pub fn assert_run_completed(run: &PipelineRun) {
    assert_eq!(
        run.status,
        RunStatus::Completed,
        "Run should be completed, got {:?} ({:?})",
        run.status,
        run.error
    );
    assert!(run.error.is_none());
    assert!(run.completed_at.is_some());
}

/// Assert the run failed with an error containing `fragment`
pub fn assert_run_failed(run: &PipelineRun, fragment: &str) {
    assert_eq!(run.status, RunStatus::Failed, "Run should have failed");
    let error = run.error.as_deref().unwrap_or_default();
    assert!(
        error.contains(fragment),
        "Run error '{}' should contain '{}'",
        error,
        fragment
    );
}

/// Assert the step log holds exactly these step ids, in order
pub fn assert_step_order(run: &PipelineRun, expected: &[&str]) {
    let actual: Vec<&str> = run.steps.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(actual, expected, "Step log order mismatch");
}

/// Output of the only record for `step_id`
pub fn step_output<'a>(run: &'a PipelineRun, step_id: &str) -> &'a Value {
    let records = run.records_for(step_id);
    assert_eq!(records.len(), 1, "Expected one record for {}", step_id);
    records[0]
        .output
        .as_ref()
        .unwrap_or_else(|| panic!("Step {} has no output", step_id))
}
