//! Scenario: Batch execution - ordering, windows and failure

use crate::helpers::*;
use skill_pipeline::{EngineConfig, SkillOutput, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PARALLEL: &str = r#"
id: "variants"
steps:
  - id: "drafts"
    skill: "drafter"
    batch:
      count: 4
      parallel: true
    inputs:
      topic: "${inputs.topic}"

  - id: "pick"
    skill: "picker"
    inputs:
      candidates: "$drafts"
"#;

/// Returns its batch index; lower indices take longer
fn indexed_drafter() -> ScriptedSkill {
    ScriptedSkill::new("drafter", |ctx, _| {
        Ok(SkillOutput::new(ctx.batch_index().unwrap_or(usize::MAX)).with_usage(10, 0.1))
    })
    .with_latency(|ctx| Duration::from_millis(10 * (4 - ctx.batch_index().unwrap_or(0) as u64)))
}

#[tokio::test]
async fn test_parallel_batch_reassembles_index_order() {
    let drafter = Arc::new(indexed_drafter());
    let picker = Arc::new(ScriptedSkill::echo_inputs("picker"));
    let engine = build_engine(&[PARALLEL], &[drafter.clone(), picker.clone()]);

    let run = engine
        .execute_pipeline("variants", inputs(&[("topic", "AI")]), None)
        .await
        .unwrap();

    assert_run_completed(&run);
    assert_step_order(
        &run,
        &["drafts[0]", "drafts[1]", "drafts[2]", "drafts[3]", "pick"],
    );

    let indices: Vec<Option<usize>> = run.steps[..4].iter().map(|r| r.batch_index).collect();
    assert_eq!(indices, vec![Some(0), Some(1), Some(2), Some(3)]);

    let expected = Value::List((0..4usize).map(Value::from).collect());
    assert_eq!(step_output(&run, "pick").child("candidates"), Some(&expected));
    assert_eq!(run.metering.total_tokens, 40);
}

#[tokio::test]
async fn test_parallel_windows_bound_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (counter, high) = (in_flight.clone(), peak.clone());

    let worker = Arc::new(
        ScriptedSkill::new("worker", move |_, _| {
            counter.fetch_sub(1, Ordering::SeqCst);
            Ok(SkillOutput::new("done"))
        })
        .with_latency({
            let counter = in_flight.clone();
            move |_| {
                let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                high.fetch_max(now, Ordering::SeqCst);
                Duration::from_millis(15)
            }
        }),
    );

    let yaml = r#"
id: "wide"
steps:
  - id: "work"
    skill: "worker"
    batch:
      count: 12
      parallel: true
"#;
    let engine = build_engine(&[yaml], &[worker.clone()]);

    let run = engine
        .execute_pipeline("wide", Default::default(), None)
        .await
        .unwrap();

    assert_run_completed(&run);
    assert_eq!(run.steps.len(), 12);
    assert_eq!(worker.calls(), 12);
    assert!(peak.load(Ordering::SeqCst) <= 5, "window limit exceeded");
}

#[tokio::test]
async fn test_parallel_failure_aborts_after_window() {
    let worker = Arc::new(ScriptedSkill::new("worker", |ctx, _| match ctx.batch_index() {
        Some(3) => Err(skill_pipeline::SkillError::Failed("index 3 broke".to_string())),
        index => Ok(SkillOutput::new(index.unwrap_or(0))),
    }));
    let yaml = r#"
id: "fragile"
steps:
  - id: "work"
    skill: "worker"
    batch:
      count: 10
      parallel: true
  - id: "after"
    skill: "worker"
"#;
    let engine = build_engine(&[yaml], &[worker.clone()])
        .with_config(EngineConfig::new().with_parallel_limit(4));

    let run = engine
        .execute_pipeline("fragile", Default::default(), None)
        .await
        .unwrap();

    assert_run_failed(&run, "Step \"work\" failed: index 3 broke");
    // First window of four ran to completion; later windows and steps never started
    assert_eq!(run.steps.len(), 4);
    assert_eq!(worker.calls(), 4);
    assert_eq!(run.completed_steps(), 3);
}

#[tokio::test]
async fn test_sequential_batch_injects_index() {
    let yaml = r#"
id: "serial"
steps:
  - id: "part"
    skill: "echo"
    batch:
      count: 3
    inputs:
      title: "Part ${inputs.title}"
"#;
    let echo = Arc::new(ScriptedSkill::echo_inputs("echo"));
    let engine = build_engine(&[yaml], &[echo.clone()]);

    let run = engine
        .execute_pipeline("serial", inputs(&[("title", "One")]), None)
        .await
        .unwrap();

    assert_run_completed(&run);
    assert_eq!(run.steps.len(), 3);
    for (index, record) in run.steps.iter().enumerate() {
        let output = record.output.as_ref().unwrap();
        assert_eq!(output.child("_index"), Some(&Value::from(index)));
        assert_eq!(output.child("title"), Some(&Value::from("Part One")));
    }
}
