//! Scenario: Variable substitution - references, templates and unresolved literals

use crate::helpers::*;
use skill_pipeline::Value;
use std::sync::Arc;

const PIPELINE: &str = r#"
id: "substitution"
steps:
  - id: "fetch"
    skill: "fetcher"
    output: "page"

  - id: "render"
    skill: "echo"
    inputs:
      exact: "${inputs.topic}"
      missing: "$missing"
      inline: "About ${inputs.topic} by ${page.author.name} (${nope})"
      whole: "$page"
      field: "$page.title"
      nested: "${page.tags.1}"
      structured: { "$ref": "inputs.topic" }
      dangling: { "$ref": "nowhere" }
      literal: 42
      plain: "no references here"
"#;

#[tokio::test]
async fn test_variable_substitution() {
    let page = map(&[
        ("title", Value::from("Rust")),
        ("author", map(&[("name", Value::from("Ferris"))])),
        (
            "tags",
            Value::List(vec![Value::from("systems"), Value::from("safety")]),
        ),
    ]);
    let fetcher = Arc::new(ScriptedSkill::returning("fetcher", page.clone()));
    let echo = Arc::new(ScriptedSkill::echo_inputs("echo"));
    let engine = build_engine(&[PIPELINE], &[fetcher, echo]);

    let run = engine
        .execute_pipeline("substitution", inputs(&[("topic", "AI")]), None)
        .await
        .unwrap();

    assert_run_completed(&run);
    let resolved = step_output(&run, "render");
    let get = |key: &str| resolved.child(key).cloned().unwrap_or_default();

    assert_eq!(get("exact"), Value::from("AI"));
    assert_eq!(get("missing"), Value::from("$missing"));
    assert_eq!(get("inline"), Value::from("About AI by Ferris (${nope})"));
    assert_eq!(get("whole"), page);
    assert_eq!(get("field"), Value::from("Rust"));
    assert_eq!(get("nested"), Value::from("safety"));
    assert_eq!(get("structured"), Value::from("AI"));
    assert_eq!(get("dangling"), map(&[("$ref", Value::from("nowhere"))]));
    assert_eq!(get("literal"), Value::Number(42.0));
    assert_eq!(get("plain"), Value::from("no references here"));
}
