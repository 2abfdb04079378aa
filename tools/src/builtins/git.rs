//! Git tools: read-only diffs and the approval-gated patch applier.

use std::process::Command;

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use piebot_types::{JsonMap, RiskClass};

use crate::{ToolContext, ToolError, ToolSpec};

#[must_use]
pub fn git_diff_spec() -> ToolSpec {
    ToolSpec {
        name: "git.diff",
        risk: RiskClass::Read,
        schema: json!({
            "type": "object",
            "properties": {
                "paths": {"type": "array", "items": {"type": "string"}},
            },
            "required": [],
        }),
        handler: git_diff,
    }
}

#[must_use]
pub fn git_apply_patch_spec() -> ToolSpec {
    ToolSpec {
        name: "git.apply_patch",
        risk: RiskClass::Write,
        schema: json!({
            "type": "object",
            "properties": {
                "diff_file": {"type": "string"},
                "approval_token": {"type": "string"},
            },
            "required": ["diff_file", "approval_token"],
        }),
        handler: apply_patch,
    }
}

fn git_diff(args: &JsonMap, ctx: &ToolContext) -> Result<JsonMap, ToolError> {
    let paths: Vec<String> = match args.get("paths") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(_) => return Err(ToolError::bad_args("paths must be a list")),
    };

    let mut cmd = Command::new("git");
    cmd.arg("diff").arg("--no-color").current_dir(&ctx.repo_root);
    if !paths.is_empty() {
        cmd.arg("--").args(&paths);
    }

    let output = cmd.output()?;
    if !output.status.success() {
        return Err(ToolError::Subprocess {
            message: subprocess_message(&output, "git diff failed"),
        });
    }

    let mut out = JsonMap::new();
    out.insert(
        "diff".to_string(),
        json!(String::from_utf8_lossy(&output.stdout).into_owned()),
    );
    Ok(out)
}

/// Apply a pre-staged patch from `runtime/artifacts/diffs/`.
///
/// The patch is referenced by bare filename only; its SHA-256 is embedded
/// in the result so the applied change is attributable from the audit
/// trail alone. The approval gate is re-checked here even though the
/// registry has already enforced it.
fn apply_patch(args: &JsonMap, ctx: &ToolContext) -> Result<JsonMap, ToolError> {
    let diff_file = args
        .get("diff_file")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ToolError::bad_args("missing diff_file"))?;
    if diff_file.contains('/') || diff_file.contains('\\') || diff_file.contains("..") {
        return Err(ToolError::bad_args("diff_file must be a filename only"));
    }

    let token = args.get("approval_token").and_then(Value::as_str);
    if !ctx.approvals.is_approved(token) {
        return Err(ToolError::ApprovalRequired);
    }

    let patch_path = ctx
        .runtime_root
        .join("artifacts")
        .join("diffs")
        .join(diff_file);
    if !patch_path.exists() {
        return Err(ToolError::NotFound {
            path: patch_path.display().to_string(),
        });
    }
    if !patch_path.is_file() {
        return Err(ToolError::bad_args("diff_file is not a file"));
    }

    let data = std::fs::read(&patch_path)?;
    let diff_hash = hex::encode(Sha256::digest(&data));

    let output = Command::new("git")
        .arg("apply")
        .arg("--whitespace=nowarn")
        .arg(&patch_path)
        .current_dir(&ctx.repo_root)
        .output()?;
    if !output.status.success() {
        return Err(ToolError::Subprocess {
            message: subprocess_message(&output, "git apply failed"),
        });
    }

    let mut out = JsonMap::new();
    out.insert("applied".to_string(), json!(true));
    out.insert("diff_file".to_string(), json!(diff_file));
    out.insert("diff_hash".to_string(), json!(diff_hash));
    Ok(out)
}

fn subprocess_message(output: &std::process::Output, fallback: &str) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    if detail.is_empty() {
        format!("{fallback}: {}", output.status)
    } else {
        format!("{fallback}: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{ApprovalGate, ToolContext};

    use super::apply_patch;

    fn args(value: Value) -> piebot_types::JsonMap {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn ctx(root: &std::path::Path, gate: ApprovalGate) -> ToolContext {
        ToolContext {
            repo_root: root.to_path_buf(),
            runtime_root: root.join("runtime"),
            approvals: gate,
        }
    }

    #[test]
    fn missing_diff_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ApprovalGate::new(Some("t".to_string()));
        let err = apply_patch(&args(json!({"approval_token": "t"})), &ctx(dir.path(), gate)).unwrap_err();
        assert_eq!(err.to_string(), "missing diff_file");
    }

    #[test]
    fn path_separators_in_diff_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ApprovalGate::new(Some("t".to_string()));
        for name in ["a/b.diff", "a\\b.diff", "..diff"] {
            let err = apply_patch(
                &args(json!({"diff_file": name, "approval_token": "t"})),
                &ctx(dir.path(), gate.clone()),
            )
            .unwrap_err();
            assert_eq!(err.to_string(), "diff_file must be a filename only");
        }
    }

    #[test]
    fn handler_rechecks_approval() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ApprovalGate::new(Some("expected".to_string()));
        let err = apply_patch(
            &args(json!({"diff_file": "p.diff", "approval_token": "wrong"})),
            &ctx(dir.path(), gate),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "approval required");
    }

    #[test]
    fn unstaged_patch_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let gate = ApprovalGate::new(Some("t".to_string()));
        let err = apply_patch(
            &args(json!({"diff_file": "p.diff", "approval_token": "t"})),
            &ctx(dir.path(), gate),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }
}
