//! Scenario: Retry behavior - attempt counts and backoff delays

use crate::helpers::*;
use skill_pipeline::{EngineConfig, RunStatus, StepStatus, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn pipeline(max: u32, backoff: &str) -> String {
    format!(
        r#"
id: "retrying"
steps:
  - id: "draft"
    skill: "writer"
    retry:
      max: {}
      backoff: {}
"#,
        max, backoff
    )
}

#[tokio::test]
async fn test_fails_k_times_then_succeeds() {
    let writer = Arc::new(ScriptedSkill::flaky("writer", 2, Value::from("third time lucky")));
    let yaml = pipeline(2, "exponential");
    let engine = build_engine(&[yaml.as_str()], &[writer.clone()]);

    let run = engine
        .execute_pipeline("retrying", Default::default(), None)
        .await
        .unwrap();

    assert_run_completed(&run);
    assert_eq!(writer.calls(), 3);
    assert_eq!(run.steps.len(), 1);
    assert_eq!(run.steps[0].status, StepStatus::Completed);
    assert_eq!(run.steps[0].attempts, 3);
    assert_eq!(run.steps[0].output, Some(Value::from("third time lucky")));
}

#[tokio::test]
async fn test_always_failing_exhausts_attempts() {
    let writer = Arc::new(ScriptedSkill::flaky("writer", usize::MAX, Value::Null));
    let yaml = pipeline(3, "linear");
    let engine = build_engine(&[yaml.as_str()], &[writer.clone()]);

    let run = engine
        .execute_pipeline("retrying", Default::default(), None)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(writer.calls(), 4);
    assert_eq!(run.steps.len(), 1);
    assert_eq!(run.steps[0].error.as_deref(), Some("attempt 4 failed"));
    assert_run_failed(&run, "attempt 4 failed");
}

#[tokio::test]
async fn test_linear_backoff_waits_between_attempts() {
    let writer = Arc::new(ScriptedSkill::flaky("writer", 2, Value::from("ok")));
    let yaml = pipeline(2, "linear");
    let engine = build_engine(&[yaml.as_str()], &[writer.clone()])
        .with_config(EngineConfig::new().with_retry_base_delay(Duration::from_millis(20)));

    let started = Instant::now();
    let run = engine
        .execute_pipeline("retrying", Default::default(), None)
        .await
        .unwrap();

    assert_run_completed(&run);
    // 1 * 20ms + 2 * 20ms
    assert!(started.elapsed() >= Duration::from_millis(60));
}
