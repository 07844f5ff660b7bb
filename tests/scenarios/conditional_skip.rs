//! Scenario: Conditional skip - false or broken conditions skip without failing

use crate::helpers::*;
use skill_pipeline::{ExecutionEvent, Value};
use std::sync::{Arc, Mutex};

const PIPELINE: &str = r#"
id: "publish"
steps:
  - id: "fetch"
    skill: "fetcher"

  - id: "post"
    skill: "poster"
    condition: "$fetch.ok"

  - id: "audit"
    skill: "auditor"
    condition: "$fetch.ok ==="

  - id: "notify"
    skill: "notifier"
    condition: "!$fetch.ok && inputs.channel == 'email'"
"#;

#[tokio::test]
async fn test_conditional_skip() {
    let fetcher = Arc::new(ScriptedSkill::returning(
        "fetcher",
        map(&[("ok", Value::Bool(false)), ("text", Value::from("stale"))]),
    ));
    let poster = Arc::new(ScriptedSkill::returning("poster", Value::from("posted")));
    let auditor = Arc::new(ScriptedSkill::returning("auditor", Value::from("audited")));
    let notifier = Arc::new(ScriptedSkill::returning("notifier", Value::from("sent")));

    let engine = build_engine(
        &[PIPELINE],
        &[fetcher.clone(), poster.clone(), auditor.clone(), notifier.clone()],
    );

    let skipped = Arc::new(Mutex::new(Vec::new()));
    let sink = skipped.clone();
    engine
        .add_event_handler(move |event| {
            if let ExecutionEvent::StepSkipped { step_id, .. } = event {
                sink.lock().unwrap().push(step_id);
            }
        })
        .await;

    let run = engine
        .execute_pipeline("publish", inputs(&[("channel", "email")]), None)
        .await
        .unwrap();

    assert_run_completed(&run);
    assert_step_order(&run, &["fetch", "notify"]);
    assert_eq!(poster.calls(), 0);
    assert_eq!(auditor.calls(), 0);
    assert_eq!(notifier.calls(), 1);
    assert_eq!(*skipped.lock().unwrap(), vec!["post", "audit"]);
}
