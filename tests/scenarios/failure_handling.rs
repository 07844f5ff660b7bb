//! Scenario: Mid-pipeline failure - the run stops at the failing step

use crate::helpers::*;
use async_trait::async_trait;
use skill_pipeline::persistence::RunSummary;
use skill_pipeline::{InMemoryRunStore, PipelineRun, RunStatus, RunStore, StepStatus, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const PIPELINE: &str = r#"
id: "three-steps"
steps:
  - id: "research"
    skill: "researcher"
  - id: "write"
    skill: "writer"
    retry:
      max: 0
  - id: "publish"
    skill: "publisher"
"#;

#[tokio::test]
async fn test_mid_pipeline_failure() {
    let researcher = Arc::new(ScriptedSkill::returning("researcher", Value::from("notes")));
    let writer = Arc::new(ScriptedSkill::failing("writer", "model overloaded"));
    let publisher = Arc::new(ScriptedSkill::returning("publisher", Value::from("done")));
    let store = Arc::new(InMemoryRunStore::new());

    let engine = build_engine(
        &[PIPELINE],
        &[researcher.clone(), writer.clone(), publisher.clone()],
    )
    .with_store(store.clone());

    let run = engine
        .execute_pipeline("three-steps", Default::default(), None)
        .await
        .unwrap();

    assert_run_failed(&run, "Step \"write\" failed: model overloaded");
    assert_step_order(&run, &["research", "write"]);
    assert_eq!(run.steps[0].status, StepStatus::Completed);
    assert_eq!(run.steps[1].status, StepStatus::Failed);
    assert_eq!(writer.calls(), 1);
    assert_eq!(publisher.calls(), 0);

    let stored = store.load_run(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert_eq!(stored.steps.len(), 2);
}

#[tokio::test]
async fn test_unregistered_skill_fails_run_without_retry() {
    let pipeline = r#"
id: "ghost"
steps:
  - id: "haunt"
    skill: "not-registered"
    retry:
      max: 3
"#;
    let engine = build_engine(&[pipeline], &[]);

    let run = engine
        .execute_pipeline("ghost", Default::default(), None)
        .await
        .unwrap();

    assert_run_failed(&run, "Skill not found: not-registered");
    assert_eq!(run.steps.len(), 1);
    assert_eq!(run.steps[0].attempts, 0);
}

#[tokio::test]
async fn test_unknown_pipeline_is_an_error() {
    let engine = build_engine(&[], &[]);
    let err = engine
        .execute_pipeline("nope", Default::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Pipeline not found: nope");
}

/// Run store whose writes always fail
#[derive(Default)]
struct UnavailableStore {
    saves: AtomicUsize,
}

#[async_trait]
impl RunStore for UnavailableStore {
    async fn save_run(&self, _run: &PipelineRun) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("run store unavailable")
    }

    async fn load_run(&self, _run_id: Uuid) -> anyhow::Result<Option<PipelineRun>> {
        Ok(None)
    }

    async fn list_runs(&self, _pipeline_id: &str) -> anyhow::Result<Vec<RunSummary>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_store_failure_mid_run_fails_run() {
    let researcher = Arc::new(ScriptedSkill::returning("researcher", Value::from("notes")));
    let writer = Arc::new(ScriptedSkill::returning("writer", Value::from("draft")));
    let publisher = Arc::new(ScriptedSkill::returning("publisher", Value::from("done")));
    let store = Arc::new(UnavailableStore::default());

    let engine = build_engine(
        &[PIPELINE],
        &[researcher.clone(), writer.clone(), publisher.clone()],
    )
    .with_store(store.clone());

    let run = engine
        .execute_pipeline("three-steps", Default::default(), None)
        .await
        .unwrap();

    assert_run_failed(&run, "run store unavailable");
    assert_eq!(run.error.as_deref(), Some("run store unavailable"));
    assert_step_order(&run, &["research"]);
    assert_eq!(run.steps[0].output, Some(Value::from("notes")));
    assert_eq!(writer.calls(), 0);
    assert_eq!(publisher.calls(), 0);
    // One save after "research", one for the finished run
    assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    assert!(engine.active_runs().await.is_empty());
}
