//! Git tools through the registry: read-only diffs, and apply_patch with
//! arming and approval, end to end against a real git repository.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde_json::{Value, json};

use piebot_audit::AuditJournal;
use piebot_policy::{PolicyEngine, SecurityConfig};
use piebot_tools::builtins::{git_apply_patch_spec, git_diff_spec};
use piebot_tools::{ApprovalGate, ToolRegistry};
use piebot_types::JsonMap;

fn git(args: &[&str], cwd: &Path) {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Repo with a.txt committed as "old\n".
fn init_repo(dir: &Path) -> PathBuf {
    let repo = dir.join("repo");
    std::fs::create_dir(&repo).unwrap();
    git(&["init"], &repo);
    std::fs::write(repo.join("a.txt"), "old\n").unwrap();
    git(&["add", "a.txt"], &repo);
    git(
        &[
            "-c",
            "user.email=x@y.z",
            "-c",
            "user.name=x",
            "commit",
            "-m",
            "init",
        ],
        &repo,
    );
    repo
}

/// Stage a patch file under runtime/artifacts/diffs and return the runtime root.
fn stage_patch(dir: &Path, name: &str, patch: &str) -> PathBuf {
    let runtime = dir.join("runtime");
    let diffs = runtime.join("artifacts").join("diffs");
    std::fs::create_dir_all(&diffs).unwrap();
    std::fs::write(diffs.join(name), patch).unwrap();
    runtime
}

fn registry(config: SecurityConfig, repo: &Path, runtime: &Path) -> ToolRegistry {
    let journal = Arc::new(AuditJournal::for_runtime(runtime).unwrap());
    let gate = ApprovalGate::new(config.approval_token.clone());
    let mut reg = ToolRegistry::new(
        PolicyEngine::new(config),
        gate,
        journal,
        repo.to_path_buf(),
        runtime.to_path_buf(),
    );
    reg.register(git_diff_spec()).unwrap();
    reg.register(git_apply_patch_spec()).unwrap();
    reg
}

fn args(value: Value) -> JsonMap {
    match value {
        Value::Object(m) => m,
        _ => unreachable!(),
    }
}

#[test]
fn diff_reports_working_tree_change() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    std::fs::write(repo.join("a.txt"), "new\n").unwrap();
    let runtime = dir.path().join("runtime");

    let reg = registry(SecurityConfig::default(), &repo, &runtime);
    let res = reg.invoke("r1", "git.diff", &JsonMap::new()).unwrap();

    assert!(res.ok, "diff failed: {:?}", res.error);
    let diff = res.result["diff"].as_str().unwrap();
    assert!(diff.contains("-old"));
    assert!(diff.contains("+new"));
}

#[test]
fn blocked_without_arm() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let runtime = stage_patch(dir.path(), "p.diff", "");

    let config = SecurityConfig {
        approval_token: Some("t".to_string()),
        ..SecurityConfig::default()
    };
    let reg = registry(config, &repo, &runtime);
    let res = reg
        .invoke(
            "r1",
            "git.apply_patch",
            &args(json!({"diff_file": "p.diff", "approval_token": "t"})),
        )
        .unwrap();

    assert!(!res.ok);
    assert!(res.error.as_deref().unwrap_or_default().starts_with("blocked by policy"));
}

#[test]
fn blocked_without_approval() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let runtime = stage_patch(dir.path(), "p.diff", "");

    let config = SecurityConfig {
        execution_arm: true,
        approval_token: Some("expected".to_string()),
        ..SecurityConfig::default()
    };
    let reg = registry(config, &repo, &runtime);
    let res = reg
        .invoke(
            "r1",
            "git.apply_patch",
            &args(json!({"diff_file": "p.diff", "approval_token": "wrong"})),
        )
        .unwrap();

    assert!(!res.ok);
    assert_eq!(res.error.as_deref(), Some("approval required"));
}

#[test]
fn applies_with_arm_and_approval() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());

    // Produce a patch changing a.txt from "old\n" to "new\n", then reset.
    std::fs::write(repo.join("a.txt"), "new\n").unwrap();
    let diff = Command::new("git")
        .args(["diff", "--no-color"])
        .current_dir(&repo)
        .output()
        .expect("git diff runs");
    assert!(diff.status.success());
    let patch_text = String::from_utf8_lossy(&diff.stdout).into_owned();
    assert!(patch_text.contains("new"));
    git(&["checkout", "--", "a.txt"], &repo);

    let runtime = stage_patch(dir.path(), "p.diff", &patch_text);

    let config = SecurityConfig {
        execution_arm: true,
        approval_token: Some("ok".to_string()),
        ..SecurityConfig::default()
    };
    let reg = registry(config, &repo, &runtime);
    let res = reg
        .invoke(
            "r1",
            "git.apply_patch",
            &args(json!({"diff_file": "p.diff", "approval_token": "ok"})),
        )
        .unwrap();

    assert!(res.ok, "apply failed: {:?}", res.error);
    assert_eq!(res.result["applied"], json!(true));
    assert_eq!(res.result["diff_file"], json!("p.diff"));
    assert_eq!(res.result["diff_hash"].as_str().map(str::len), Some(64));

    assert_eq!(
        std::fs::read_to_string(repo.join("a.txt")).unwrap(),
        "new\n"
    );
}
