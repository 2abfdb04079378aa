//! The tool registry: single choke point for all tool execution.
//!
//! Every invocation records a policy decision, optionally an approval
//! check, the execution itself, and the stored result. Event order within
//! one invocation is fixed: `PolicyDecision`, then `ApprovalRequested` (if
//! any), then `ToolExecuted`, then `ToolResultStored`. Denied paths skip
//! the approval event; the unknown-tool path skips both.
//!
//! The registry never bypasses the journal: if journaling or artifact
//! storage fails, the invocation fails with [`RegistryError`] instead of
//! executing unaudited.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use piebot_audit::{AuditJournal, JournalError};
use piebot_policy::PolicyEngine;
use piebot_types::{AuditEventType, JsonMap, ToolResult};

use crate::approval::ApprovalGate;
use crate::store::store_tool_result;
use crate::{ToolContext, ToolError, ToolSpec};

/// Frames kept when rendering a handler failure into `result.traceback`.
const TRACE_FRAMES: usize = 3;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool already registered: {name}")]
    DuplicateTool { name: String },
    #[error("audit journal failure: {0}")]
    Journal(#[from] JournalError),
    #[error("artifact store failure: {0}")]
    Artifact(#[from] io::Error),
    #[error("failed to encode tool result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Registry of tool specs plus the collaborators every invocation consults.
pub struct ToolRegistry {
    policy: PolicyEngine,
    gate: ApprovalGate,
    journal: Arc<AuditJournal>,
    ctx: ToolContext,
    tools: HashMap<&'static str, ToolSpec>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(
        policy: PolicyEngine,
        gate: ApprovalGate,
        journal: Arc<AuditJournal>,
        repo_root: PathBuf,
        runtime_root: PathBuf,
    ) -> Self {
        let ctx = ToolContext {
            repo_root,
            runtime_root,
            approvals: gate.clone(),
        };
        Self {
            policy,
            gate,
            journal,
            ctx,
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, spec: ToolSpec) -> Result<(), RegistryError> {
        if self.tools.contains_key(spec.name) {
            return Err(RegistryError::DuplicateTool {
                name: spec.name.to_string(),
            });
        }
        self.tools.insert(spec.name, spec);
        Ok(())
    }

    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Run one tool call through the full gate sequence.
    ///
    /// Handler failures come back as failed [`ToolResult`]s; only journal
    /// and artifact-store faults surface as `Err`.
    pub fn invoke(
        &self,
        run_id: &str,
        tool_name: &str,
        args: &JsonMap,
    ) -> Result<ToolResult, RegistryError> {
        let call_id = Uuid::new_v4().simple().to_string();

        let Some(spec) = self.tools.get(tool_name) else {
            self.journal.append(
                run_id,
                AuditEventType::ToolExecuted,
                obj(json!({"tool_name": tool_name, "call_id": &call_id, "args": args})),
            )?;
            let res = ToolResult::failure(run_id, call_id, JsonMap::new(), "unknown tool");
            return self.finish(run_id, tool_name, res, None);
        };

        let decision = self.policy.decide(tool_name, spec.risk, args);
        self.journal.append(
            run_id,
            AuditEventType::PolicyDecision,
            obj(json!({
                "tool_name": tool_name,
                "call_id": &call_id,
                "risk": spec.risk.as_str(),
                "allow": decision.allow,
                "requires_approval": decision.requires_approval,
                "reason": &decision.reason,
            })),
        )?;

        if !decision.allow {
            self.journal.append(
                run_id,
                AuditEventType::ToolExecuted,
                obj(json!({
                    "tool_name": tool_name,
                    "call_id": &call_id,
                    "args": args,
                    "blocked": true,
                })),
            )?;
            let res = ToolResult::failure(
                run_id,
                call_id,
                JsonMap::new(),
                format!("blocked by policy: {}", decision.reason),
            );
            return self.finish(run_id, tool_name, res, None);
        }

        if decision.requires_approval {
            let token = args.get("approval_token").and_then(Value::as_str);
            let approved = self.gate.is_approved(token);
            self.journal.append(
                run_id,
                AuditEventType::ApprovalRequested,
                obj(json!({"tool_name": tool_name, "call_id": &call_id, "approved": approved})),
            )?;
            if !approved {
                let res =
                    ToolResult::failure(run_id, call_id, JsonMap::new(), "approval required");
                return self.finish(run_id, tool_name, res, None);
            }
        }

        self.journal.append(
            run_id,
            AuditEventType::ToolExecuted,
            obj(json!({"tool_name": tool_name, "call_id": &call_id, "args": args})),
        )?;

        let res = match (spec.handler)(args, &self.ctx) {
            Ok(output) => ToolResult::success(run_id, call_id, output),
            Err(err) => {
                tracing::warn!(tool = tool_name, error = %err, "tool handler failed");
                let mut result = JsonMap::new();
                result.insert("traceback".to_string(), Value::String(error_trace(&err)));
                ToolResult::failure(
                    run_id,
                    call_id,
                    result,
                    format!("{}: {}", err.kind(), err),
                )
            }
        };

        let mut result_keys: Vec<String> = res.result.keys().cloned().collect();
        result_keys.sort_unstable();
        self.finish(run_id, tool_name, res, Some(result_keys))
    }

    /// Persist the result artifact and emit `ToolResultStored`. Every
    /// invocation path ends here.
    fn finish(
        &self,
        run_id: &str,
        tool_name: &str,
        res: ToolResult,
        result_keys: Option<Vec<String>>,
    ) -> Result<ToolResult, RegistryError> {
        let artifact = store_tool_result(
            &self.ctx.runtime_root,
            &res.call_id,
            &serde_json::to_value(&res)?,
        )?;
        tracing::debug!(
            tool = tool_name,
            call_id = %res.call_id,
            path = %artifact.artifact_path.display(),
            bytes = artifact.bytes,
            "tool result stored"
        );

        let mut payload = json!({
            "tool_name": tool_name,
            "call_id": &res.call_id,
            "ok": res.ok,
            "error": &res.error,
        });
        if let (Some(keys), Value::Object(map)) = (result_keys, &mut payload) {
            map.insert("result_keys".to_string(), json!(keys));
        }
        self.journal
            .append(run_id, AuditEventType::ToolResultStored, obj(payload))?;
        Ok(res)
    }
}

/// Truncated textual trace of a handler failure: the error itself plus up
/// to two sources from its chain.
fn error_trace(err: &ToolError) -> String {
    let mut frames = Vec::with_capacity(TRACE_FRAMES);
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if frames.len() == TRACE_FRAMES {
            break;
        }
        frames.push(e.to_string());
        current = e.source();
    }
    frames.join("\n")
}

fn obj(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}
