//! End-to-end pipeline tests: observation in, verified journal out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};

use piebot_audit::{AuditJournal, replay_audit_log, verify_audit_log};
use piebot_engine::Orchestrator;
use piebot_models::ModelRouter;
use piebot_policy::{PolicyEngine, SecurityConfig};
use piebot_tools::builtins::fs_read_file_spec;
use piebot_tools::{ApprovalGate, ToolRegistry};
use piebot_types::{JsonMap, Observation};

fn write_router_config(dir: &Path) -> PathBuf {
    let path = dir.join("router.yaml");
    std::fs::write(
        &path,
        "models:\n  null:\n    kind: null\n    capabilities: []\nrouting:\n  planner: null\n  executor: null\n  critic: null\n",
    )
    .unwrap();
    path
}

fn make_orchestrator(repo: &Path, runtime: &Path, config_dir: &Path) -> Orchestrator {
    let journal = Arc::new(AuditJournal::for_runtime(runtime).unwrap());
    let security = SecurityConfig::default();
    let mut tools = ToolRegistry::new(
        PolicyEngine::new(security.clone()),
        ApprovalGate::new(security.approval_token),
        Arc::clone(&journal),
        repo.to_path_buf(),
        runtime.to_path_buf(),
    );
    tools.register(fs_read_file_spec()).unwrap();

    let router = ModelRouter::load(&write_router_config(config_dir)).unwrap();
    Orchestrator::new(tools, journal, router).with_max_attempts(2)
}

fn observation(run_id: &str, kind: &str, data: Value) -> Observation {
    let data = match data {
        Value::Object(m) => m,
        _ => JsonMap::new(),
    };
    Observation::new(run_id, kind, data)
}

fn journal_events(runtime: &Path) -> Vec<Value> {
    let text = std::fs::read_to_string(runtime.join("logs").join("audit.jsonl")).unwrap();
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn file_read_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir(&repo).unwrap();
    std::fs::write(repo.join("hello.txt"), "hi").unwrap();
    let runtime = dir.path().join("runtime");

    let orch = make_orchestrator(&repo, &runtime, dir.path());
    let res = orch.run_once(&observation("run-1", "file_read", json!({"path": "hello.txt"})));

    assert!(res.ok);
    assert_eq!(res.tool_results.len(), 1);
    assert!(res.tool_results[0].ok);
    assert_eq!(res.tool_results[0].result["text"], json!("hi"));

    let log_path = runtime.join("logs").join("audit.jsonl");
    verify_audit_log(&log_path).unwrap();
    let summary = replay_audit_log(&log_path).unwrap();
    assert_eq!(summary.run_id, "run-1");
}

#[test]
fn happy_path_event_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir(&repo).unwrap();
    std::fs::write(repo.join("hello.txt"), "hi").unwrap();
    let runtime = dir.path().join("runtime");

    let orch = make_orchestrator(&repo, &runtime, dir.path());
    orch.run_once(&observation("run-1", "file_read", json!({"path": "hello.txt"})));

    let types: Vec<String> = journal_events(&runtime)
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        types,
        vec![
            "RunStarted",
            "ObservationCaptured",
            "PlanProposed",
            "PlanProposed",
            "PolicyDecision",
            "ToolExecuted",
            "ToolResultStored",
            "CriticReport",
            "RunCompleted",
        ]
    );
}

#[test]
fn missing_file_retries_then_fails() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir(&repo).unwrap();
    let runtime = dir.path().join("runtime");

    let orch = make_orchestrator(&repo, &runtime, dir.path());
    let res = orch.run_once(&observation("run-2", "file_read", json!({"path": "missing.txt"})));

    assert!(!res.ok);
    assert_eq!(res.tool_results.len(), 2);
    assert!(res.tool_results.iter().all(|r| !r.ok));
    assert_eq!(res.error.as_deref(), Some("tool failure"));

    let events = journal_events(&runtime);
    let plan_count = events.iter().filter(|e| e["type"] == json!("PlanProposed")).count();
    assert_eq!(plan_count, 4);
    let terminal: Vec<&Value> = events
        .iter()
        .filter(|e| e["type"] == json!("RunFailed") || e["type"] == json!("RunCompleted"))
        .collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0]["type"], json!("RunFailed"));
    assert_eq!(terminal[0]["payload"]["attempts"], json!(2));

    let log_path = runtime.join("logs").join("audit.jsonl");
    verify_audit_log(&log_path).unwrap();
    replay_audit_log(&log_path).unwrap();
}

#[test]
fn noop_observation_completes() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir(&repo).unwrap();
    let runtime = dir.path().join("runtime");

    let orch = make_orchestrator(&repo, &runtime, dir.path());
    let res = orch.run_once(&observation("run-3", "text", json!({"text": ""})));

    assert!(res.ok);
    assert!(res.tool_results.is_empty());
}

#[test]
fn replay_state_hash_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir(&repo).unwrap();
    std::fs::write(repo.join("hello.txt"), "hi").unwrap();
    let runtime = dir.path().join("runtime");

    let orch = make_orchestrator(&repo, &runtime, dir.path());
    orch.run_once(&observation("run-4", "file_read", json!({"path": "hello.txt"})));

    let log_path = runtime.join("logs").join("audit.jsonl");
    let first = replay_audit_log(&log_path).unwrap();
    let second = replay_audit_log(&log_path).unwrap();
    assert_eq!(first.replay_state_hash, second.replay_state_hash);
    assert_eq!(first.replay_state_hash.len(), 64);
}

#[test]
fn observation_secrets_never_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir(&repo).unwrap();
    let runtime = dir.path().join("runtime");

    let orch = make_orchestrator(&repo, &runtime, dir.path());
    orch.run_once(&observation(
        "run-5",
        "text",
        json!({"text": "api_key=\"SECRETVALUE123456\""}),
    ));

    let text = std::fs::read_to_string(runtime.join("logs").join("audit.jsonl")).unwrap();
    assert!(!text.contains("SECRETVALUE123456"));
    assert!(text.contains("[REDACTED]"));
}
