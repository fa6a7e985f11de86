use anyhow::Result;
use cortex_decomposer::workflow::{
    validate_workflow, RiskLevel, Step, StepKind, Workflow, WorkflowBuilder, WorkflowError,
};
use serde_json::json;
use tempfile::TempDir;

fn release_workflow() -> Workflow {
    WorkflowBuilder::new("release")
        .with_description("Cut and publish a release")
        .with_estimated_time("15 minutes")
        .with_context([("version", json!("1.4.0")), ("dry_run", json!(false))])
        .add_tool_step("Run the test suite", "bash", RiskLevel::Low, Vec::<String>::new())
        .add_llm_step("Write release notes", "Notes for {{version}}", ["step1"])
        .add_template_step("Render changelog", "changelog", ["step2"])
        .add_approval_step("Confirm publish", ["step3"])
        .add_step(
            Step::tool("publish", "Publish crate", "bash")
                .with_risk(RiskLevel::High)
                .with_variable("registry", "crates.io")
                .with_dependencies(["step4"]),
        )
        .build()
}

#[test]
fn test_json_round_trip_preserves_plan() -> Result<()> {
    let original = release_workflow();
    validate_workflow(&original)?;

    let restored = Workflow::from_json(&original.to_json()?)?;

    assert_eq!(restored, original);
    let ids: Vec<&str> = restored.steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["step1", "step2", "step3", "step4", "publish"]);
    assert_eq!(restored.steps[4].depends_on, vec!["step4".to_string()]);
    assert_eq!(
        restored.steps[2].kind,
        StepKind::Template {
            template_id: "changelog".to_string()
        }
    );
    Ok(())
}

#[test]
fn test_document_round_trip_through_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("release.json");

    let original = release_workflow();
    std::fs::write(&path, original.to_json()?)?;

    let restored = Workflow::from_json(&std::fs::read_to_string(&path)?)?;
    assert_eq!(restored.id, original.id);
    assert_eq!(restored.created_at, original.created_at);
    assert!(restored.requires_approval());
    Ok(())
}

#[test]
fn test_document_layout() -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(&release_workflow().to_json()?)?;

    for field in ["id", "name", "description", "steps", "context", "created_at", "estimated_time"] {
        assert!(value.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(value["steps"][1]["type"], "llm");
    assert_eq!(value["steps"][1]["prompt"], "Notes for {{version}}");
    assert_eq!(value["steps"][3]["type"], "approval");
    assert_eq!(value["steps"][3]["risk_level"], "high");
    assert_eq!(value["steps"][4]["variables"]["registry"], "crates.io");
    Ok(())
}

const HEADER: &str = r#""id": "wf-1", "name": "broken", "created_at": "2026-01-01T00:00:00Z""#;

fn document(steps: &str) -> String {
    format!("{{{}, \"steps\": {}}}", HEADER, steps)
}

#[test]
fn test_from_json_rejects_cycles() {
    let err = Workflow::from_json(&document(
        r#"[{"id": "A", "type": "llm", "depends_on": ["B"]},
            {"id": "B", "type": "llm", "depends_on": ["A"]}]"#,
    ))
    .unwrap_err();

    assert!(matches!(err, WorkflowError::CircularDependency { .. }));
    assert!(err.to_string().starts_with("circular dependency detected:"));
}

#[test]
fn test_from_json_rejects_self_loop() {
    let err = Workflow::from_json(&document(
        r#"[{"id": "loop", "type": "llm", "depends_on": ["loop"]}]"#,
    ))
    .unwrap_err();

    assert_eq!(err.to_string(), "circular dependency detected: loop -> loop");
}

#[test]
fn test_from_json_rejects_dangling_reference() {
    let err = Workflow::from_json(&document(
        r#"[{"id": "c", "type": "tool", "tool": "read", "depends_on": ["missing"]}]"#,
    ))
    .unwrap_err();

    assert_eq!(
        err.to_string(),
        "step c references non-existent dependency: missing"
    );
}

#[test]
fn test_from_json_rejects_duplicate_ids() {
    let err = Workflow::from_json(&document(
        r#"[{"id": "x", "type": "llm"}, {"id": "x", "type": "approval"}]"#,
    ))
    .unwrap_err();

    assert_eq!(err.to_string(), "duplicate step ID: x");
}

#[test]
fn test_from_json_rejects_empty_id() {
    let err = Workflow::from_json(&document(r#"[{"type": "llm"}]"#)).unwrap_err();

    assert!(matches!(err, WorkflowError::EmptyStepId { index: 0 }));
}

#[test]
fn test_from_json_rejects_malformed_documents() {
    assert!(matches!(
        Workflow::from_json("{not json").unwrap_err(),
        WorkflowError::Parse(_)
    ));
    assert!(matches!(
        Workflow::from_json(&document(r#"[{"id": "a", "type": "llm", "risk_level": "extreme"}]"#))
            .unwrap_err(),
        WorkflowError::Parse(_)
    ));
}
