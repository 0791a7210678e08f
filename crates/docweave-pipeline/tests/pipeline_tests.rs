//! End-to-end tests for docweave-pipeline: full catalog runs, context flow,
//! fail-fast behaviour, output cleanup, and exports. No network; every model
//! call goes to a ScriptedProvider.

use docweave_core::{Error, ModelConfig, TaskNodeId};
use docweave_llm::{LlmProvider, MockBehavior, ScriptedProvider};
use docweave_pipeline::*;
use std::path::Path;
use std::sync::Arc;

fn registry_with(provider: Arc<dyn LlmProvider>) -> AgentRegistry {
    AgentRegistry::single_model(
        ModelBinding::new(ModelConfig::default(), provider),
        VarSet::default(),
    )
}

fn catalog_executor(provider: Arc<dyn LlmProvider>, out: &Path) -> Executor {
    let graph = catalog::documentation_pipeline(registry_with(provider), "default").unwrap();
    Executor::new(graph, Arc::new(LocalFsDriver::new(out)))
        .with_exports(catalog::export_specs())
        .unwrap()
}

/// Markdown-ish reply naming the agent that produced it.
fn report_responder() -> ScriptedProvider {
    ScriptedProvider::from_fn(|req| {
        let who = req.system.as_deref().unwrap_or("").lines().next().unwrap_or("").to_string();
        MockBehavior::Text(format!(
            "# Report\n\n{}\n\n## Details\n- first point\n* second point\n**Notes**:\nplain closing line\n",
            who
        ))
    })
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ===========================================================================
// Full catalog
// ===========================================================================

#[tokio::test]
async fn login_system_produces_every_file() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("outputs");
    let provider = Arc::new(report_responder());
    let exec = catalog_executor(provider.clone(), &out);

    let mut report = exec.run(TemplateVars::new("Build a login system")).await.unwrap();
    let exported = exec.export(&mut report).await.unwrap();

    assert_eq!(provider.call_count().await, 19);
    assert_eq!(report.context.len(), 19);
    assert_eq!(report.manifest.outcome, Outcome::Success);
    assert_eq!(report.manifest.count(NodeState::Completed), 19);
    assert_eq!(exported.len(), 2);

    let files = files_in(&out);
    assert_eq!(files.len(), 21, "{files:?}");
    for node in exec.graph().nodes() {
        let path = out.join(&node.output_sink);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Report"), "{}", path.display());
    }
    assert!(out.join("09a_final_full.docx").is_file());
    assert!(out.join("09b_summary.docx").is_file());

    // Every prompt carried the topic.
    let requests = provider.requests().await;
    assert!(requests[0].last_user_text().unwrap().contains("Build a login system"));
    assert!(requests[0]
        .system
        .as_deref()
        .unwrap()
        .starts_with("You are Requirement Intake Agent."));
}

#[tokio::test]
async fn dependent_prompts_carry_upstream_text() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::from_fn(|req| {
        // Name each reply after the first line of its system prompt.
        let role = req.system.as_deref().unwrap_or("").lines().next().unwrap_or("").to_string();
        MockBehavior::Text(format!("<<{}>>", role))
    }));
    let exec = catalog_executor(provider.clone(), tmp.path());
    exec.run(TemplateVars::new("payroll")).await.unwrap();

    let requests = provider.requests().await;
    // final_writer is the 16th node: user story, PDD and SDD updates in that order.
    let final_writer = requests[15].last_user_text().unwrap();
    let first = final_writer.find("<<You are Final Reviewer.>>").unwrap();
    assert!(final_writer[first..].contains("---"));
    assert_eq!(final_writer.matches("<<You are Final Reviewer.>>").count(), 3);
    // The first node has no upstream context.
    assert!(!requests[0].last_user_text().unwrap().contains("<<"));
}

// ===========================================================================
// Context ordering
// ===========================================================================

#[tokio::test]
async fn context_for_c_is_a_then_b() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::from_fn(|req| {
        let user = req.last_user_text().unwrap_or_default();
        if user.starts_with("Task A") {
            MockBehavior::Text("alpha".into())
        } else if user.starts_with("Task B") {
            MockBehavior::Text("beta".into())
        } else {
            MockBehavior::Echo
        }
    }));
    let mut reg = registry_with(provider);
    reg.register(AgentSpec::new("w", "Writer", "Write about {topic}", "")).unwrap();
    let mut graph = TaskGraph::new(Arc::new(reg));
    graph.add_task(TaskSpec::new("a", "w", "a.txt").describe("Task A", "")).unwrap();
    graph.add_task(TaskSpec::new("b", "w", "b.txt").describe("Task B", "")).unwrap();
    graph
        .add_task(TaskSpec::new("c", "w", "c.txt").after(&["a", "b"]).describe("Task C", ""))
        .unwrap();

    let exec = Executor::new(graph, Arc::new(LocalFsDriver::new(tmp.path())));
    let report = exec.run(TemplateVars::new("t")).await.unwrap();

    let c = report.context.output(&TaskNodeId::new("c")).unwrap();
    assert_eq!(c.text, "alpha\n\nbeta\n\n---\n\nTask C");
    assert_eq!(
        report
            .context
            .resolve_context(&[TaskNodeId::new("a"), TaskNodeId::new("b")])
            .unwrap(),
        "alpha\n\nbeta"
    );
    assert_eq!(std::fs::read_to_string(tmp.path().join("c.txt")).unwrap(), c.text);
}

// ===========================================================================
// Output directory lifecycle
// ===========================================================================

#[tokio::test]
async fn stale_outputs_are_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("outputs");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("stale.txt"), "from last week").unwrap();
    std::fs::write(out.join("01_requirements.txt"), "old requirements").unwrap();

    let exec = catalog_executor(Arc::new(report_responder()), &out);
    exec.run(TemplateVars::new("Build a login system")).await.unwrap();

    assert!(!out.join("stale.txt").exists());
    let fresh = std::fs::read_to_string(out.join("01_requirements.txt")).unwrap();
    assert!(!fresh.contains("old requirements"));
    assert_eq!(files_in(&out).len(), 19);
}

#[tokio::test]
async fn failure_stops_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("outputs");
    let manifest_path = tmp.path().join("run.yaml");
    let provider = Arc::new(ScriptedProvider::sequence(vec![
        MockBehavior::Text("requirements".into()),
        MockBehavior::Text("review".into()),
        MockBehavior::Text("updated".into()),
        MockBehavior::Error("503 service unavailable".into()),
    ]));
    let exec = catalog_executor(provider.clone(), &out).with_manifest(&manifest_path);

    let err = exec.run(TemplateVars::new("Build a login system")).await.unwrap_err();
    match &err {
        Error::ExternalCall { node, agent, message } => {
            assert_eq!(node, "user_story");
            assert_eq!(agent, "business_analyst");
            assert!(message.contains("503"));
        }
        other => panic!("expected ExternalCall, got {other:?}"),
    }
    assert_eq!(provider.call_count().await, 4);

    assert_eq!(
        files_in(&out),
        ["01_requirements.txt", "01a_requirements_review.txt", "01b_requirements_updated.txt"]
    );

    let manifest =
        RunManifest::from_yaml(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    assert_eq!(manifest.outcome, Outcome::Failure);
    let states: Vec<NodeState> = manifest.nodes.iter().map(|n| n.status).collect();
    assert!(states[..3].iter().all(|s| *s == NodeState::Completed));
    assert_eq!(states[3], NodeState::Failed);
    assert!(states[4..].iter().all(|s| *s == NodeState::Pending));
    assert!(manifest.nodes[3].error.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn manifest_inside_output_dir_is_refused_before_any_call() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("outputs");
    for manifest_path in [out.join("./run.yaml"), tmp.path().join("other/../outputs/run.yaml")] {
        let provider = Arc::new(ScriptedProvider::constant(MockBehavior::Echo));
        let exec = catalog_executor(provider.clone(), &out).with_manifest(&manifest_path);
        let err = exec.run(TemplateVars::new("x")).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("manifest")), "{err}");
        assert_eq!(provider.call_count().await, 0);
        assert!(!out.exists());
    }
}

#[tokio::test]
async fn mid_stream_failure_writes_nothing_for_that_node() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::sequence(vec![MockBehavior::StreamError {
        partial: "# Requirem".into(),
        message: "connection reset".into(),
    }]));
    let exec = catalog_executor(provider, tmp.path());
    let err = exec.run(TemplateVars::new("x")).await.unwrap_err();
    assert!(matches!(err, Error::ExternalCall { ref node, .. } if node == "requirements"));
    assert!(files_in(tmp.path()).is_empty());
}

// ===========================================================================
// Setup errors
// ===========================================================================

#[test]
fn unknown_model_is_configuration_error() {
    let mut reg = registry_with(Arc::new(ScriptedProvider::constant(MockBehavior::Echo)));
    let err = reg
        .register(AgentSpec::new("a", "A", "goal", "").on_model("gemini-ultra"))
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn forward_and_self_dependencies_rejected() {
    let mut reg = registry_with(Arc::new(ScriptedProvider::constant(MockBehavior::Echo)));
    reg.register(AgentSpec::new("w", "W", "g", "")).unwrap();
    let mut graph = TaskGraph::new(Arc::new(reg));
    graph.add_task(TaskSpec::new("a", "w", "a.txt")).unwrap();

    let err = graph.add_task(TaskSpec::new("b", "w", "b.txt").after(&["c"])).unwrap_err();
    assert!(matches!(err, Error::CyclicOrUnknownDependency { .. }));
    let err = graph.add_task(TaskSpec::new("b", "w", "b.txt").after(&["a", "b"])).unwrap_err();
    assert!(matches!(err, Error::CyclicOrUnknownDependency { ref dependency, .. } if dependency == "b"));
    assert_eq!(graph.len(), 1);
}

#[tokio::test]
async fn missing_variable_value_fails_before_any_node() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::Echo));
    let mut reg = AgentRegistry::single_model(
        ModelBinding::new(ModelConfig::default(), provider.clone()),
        VarSet::default().with("audience"),
    );
    reg.register(AgentSpec::new("w", "W", "Write {topic} for {audience}", "")).unwrap();
    let mut graph = TaskGraph::new(Arc::new(reg));
    graph.add_task(TaskSpec::new("a", "w", "a.txt").describe("{audience}", "")).unwrap();

    let exec = Executor::new(graph, Arc::new(LocalFsDriver::new(tmp.path())));
    let err = exec.run(TemplateVars::new("t")).await.unwrap_err();
    assert!(err.is_setup_error());
    assert_eq!(provider.call_count().await, 0);

    let report = exec
        .run(TemplateVars::new("t").with("audience", "auditors"))
        .await
        .unwrap();
    assert!(report.context.outputs().next().unwrap().text.starts_with("auditors"));
}

// ===========================================================================
// Exports
// ===========================================================================

#[tokio::test]
async fn export_is_repeatable() {
    let tmp = tempfile::tempdir().unwrap();
    let driver = LocalFsDriver::new(tmp.path());
    driver
        .write(Path::new("docs_full.txt"), b"# Intro\n\n- one\n**Risks**:\nBody text")
        .await
        .unwrap();
    let spec = ExportSpec::new("docs_full.txt", "09a_final_full.docx", "Full Technical Report");

    let first = export::export_document(&driver, &spec).await.unwrap();
    let second = export::export_document(&driver, &spec).await.unwrap();
    assert_eq!(first, second);
    assert!(first.is_file());

    let text = std::fs::read_to_string(tmp.path().join("docs_full.txt")).unwrap();
    let a = format_document("Full Technical Report", &text);
    let b = format_document("Full Technical Report", &text);
    assert_eq!(a, b);
    assert_eq!(a.to_docx_bytes().unwrap(), b.to_docx_bytes().unwrap());
    assert_eq!(
        a.blocks,
        vec![
            Block::Heading { level: 1, text: "Intro".into() },
            Block::Bullet("one".into()),
            Block::Heading { level: 3, text: "Risks".into() },
            Block::Paragraph("Body text".into()),
        ]
    );
}

#[test]
fn formatter_line_scenarios() {
    let cases = [
        ("# Scope", Some(Block::Heading { level: 1, text: "Scope".into() })),
        ("## API", Some(Block::Heading { level: 2, text: "API".into() })),
        ("- item one", Some(Block::Bullet("item one".into()))),
        ("**Notes**:", Some(Block::Heading { level: 3, text: "Notes".into() })),
        ("   ", None),
        ("Plain text line.", Some(Block::Paragraph("Plain text line.".into()))),
    ];
    for (line, expected) in cases {
        assert_eq!(classify_line(line), expected, "{line:?}");
    }

    let doc = format_document("T", "# Scope\n   \nPlain text line.");
    assert_eq!(doc.blocks.len(), 2);
}

#[tokio::test]
async fn export_with_missing_source_is_export_error() {
    let tmp = tempfile::tempdir().unwrap();
    let driver = LocalFsDriver::new(tmp.path());
    let spec = ExportSpec::new("docs_summary.txt", "09b_summary.docx", "Summarized Report");
    let err = export::export_document(&driver, &spec).await.unwrap_err();
    assert!(matches!(err, Error::Export { ref document, .. } if document == "09b_summary.docx"));
}

#[test]
fn export_file_writes_docx() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("notes.txt");
    std::fs::write(&src, "## Section\nline").unwrap();
    let dest = tmp.path().join("notes.docx");
    export::export_file(&src, &dest, "Notes").unwrap();
    let bytes = std::fs::read(&dest).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}
