//! Scenario: Trigger matching - free text picks a pipeline loaded from disk

use crate::helpers::*;
use skill_pipeline::{ExecutionEngine, PipelineRegistry, SkillRegistry, Value};
use std::fs;
use std::sync::Arc;

#[tokio::test]
async fn test_trigger_selects_pipeline_to_run() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("blog.yaml"),
        r#"
id: "blog"
trigger: "blog( post)?"
steps:
  - id: "write"
    skill: "writer"
    inputs:
      request: "${inputs.request}"
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("tweet.json"),
        r#"{"id": "tweet", "trigger": "tweet|post", "steps": [{"id": "write", "skill": "writer"}]}"#,
    )
    .unwrap();
    fs::write(dir.path().join("invalid.yaml"), "id: broken\ntrigger: \"[\"\nsteps: []\n").unwrap();
    fs::write(dir.path().join("garbage.yaml"), ": : :").unwrap();

    let registry = Arc::new(PipelineRegistry::from_dir(dir.path()).unwrap());
    assert_eq!(registry.len(), 3);

    let ranked = registry.match_all_pipelines("Write a Blog Post");
    let ids: Vec<&str> = ranked.iter().map(|m| m.pipeline_id.as_str()).collect();
    assert_eq!(ids, vec!["blog", "tweet"]);

    let best = registry.match_pipeline("Write a Blog Post").unwrap();
    let writer = Arc::new(ScriptedSkill::echo_inputs("writer"));
    let engine = ExecutionEngine::new(
        registry.clone(),
        Arc::new(SkillRegistry::new().with_skill(writer.clone())),
    );

    let run = engine
        .execute_pipeline(&best.pipeline_id, inputs(&[("request", "Write a Blog Post")]), None)
        .await
        .unwrap();

    assert_run_completed(&run);
    assert_eq!(run.pipeline_id, "blog");
    assert_eq!(
        step_output(&run, "write").child("request"),
        Some(&Value::from("Write a Blog Post"))
    );
}
