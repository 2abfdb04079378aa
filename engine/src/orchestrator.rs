//! The planner → executor → critic loop with bounded retries.
//!
//! `run_once` drives a single observation to a terminal verdict. Every
//! transition is a journal event; the registry alone enforces policy and
//! approval, and the journal alone performs redaction. No error escapes
//! `run_once`: backend, router, registry, and journal failures all land as
//! `RunFailed` plus a failed `RunResult`.

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;

use piebot_audit::{AuditJournal, JournalError};
use piebot_models::{ModelRouter, RouterError};
use piebot_tools::{RegistryError, ToolRegistry};
use piebot_types::{
    AuditEventType, CriticDecision, JsonMap, Observation, RunResult, ToolPlan, ToolResult,
};

const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Faults the orchestrator converts into `RunFailed`.
///
/// Display form is `"<ErrorKind>: <message>"`, which is what lands in the
/// terminal event payload and the returned `RunResult.error`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Router: {0}")]
    Router(#[from] RouterError),
    #[error("Backend: {0}")]
    Backend(#[from] piebot_models::BackendError),
    #[error("Registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("Journal: {0}")]
    Journal(#[from] JournalError),
}

enum Verdict {
    Passed,
    Retry(String),
    Failed(String),
}

/// Drives observations through the pipeline. Owns the registry and router;
/// shares the journal with the registry.
pub struct Orchestrator {
    tools: ToolRegistry,
    journal: Arc<AuditJournal>,
    router: ModelRouter,
    max_attempts: u32,
}

impl Orchestrator {
    #[must_use]
    pub fn new(tools: ToolRegistry, journal: Arc<AuditJournal>, router: ModelRouter) -> Self {
        Self {
            tools,
            journal,
            router,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Advance one observation to a terminal verdict.
    pub fn run_once(&self, observation: &Observation) -> RunResult {
        let run_id = observation.run_id.clone();
        let mut results: Vec<ToolResult> = Vec::new();

        if let Err(err) = self.capture_start(observation) {
            return self.fail_run(&run_id, results, 1, &err.to_string());
        }

        for attempt in 1..=self.max_attempts {
            match self.run_attempt(observation, attempt, &mut results) {
                Ok(Verdict::Passed) => {
                    if let Err(err) = self.journal.append(
                        &run_id,
                        AuditEventType::RunCompleted,
                        obj(json!({"attempts": attempt})),
                    ) {
                        return self.fail_run(&run_id, results, attempt, &EngineError::from(err).to_string());
                    }
                    return RunResult::completed(run_id, results);
                }
                Ok(Verdict::Retry(reason)) => {
                    if attempt < self.max_attempts {
                        tracing::info!(run_id = %run_id, attempt, reason = %reason, "critic requested retry");
                        continue;
                    }
                    // Final attempt exhausted: the retry becomes a failure.
                    return self.fail_run(&run_id, results, attempt, &reason);
                }
                Ok(Verdict::Failed(reason)) => {
                    return self.fail_run(&run_id, results, attempt, &reason);
                }
                Err(err) => {
                    return self.fail_run(&run_id, results, attempt, &err.to_string());
                }
            }
        }

        // Unreachable given the verdict branches above.
        self.fail_run(&run_id, results, self.max_attempts, "max attempts exceeded")
    }

    fn capture_start(&self, observation: &Observation) -> Result<(), EngineError> {
        let run_id = &observation.run_id;
        self.journal.append(
            run_id,
            AuditEventType::RunStarted,
            obj(json!({"run_id": run_id})),
        )?;
        self.journal.append(
            run_id,
            AuditEventType::ObservationCaptured,
            obj(json!({"kind": &observation.kind, "data": &observation.data})),
        )?;
        Ok(())
    }

    fn run_attempt(
        &self,
        observation: &Observation,
        attempt: u32,
        results: &mut Vec<ToolResult>,
    ) -> Result<Verdict, EngineError> {
        let run_id = &observation.run_id;

        let planner = self.router.backend_for_role("planner")?;
        let executor = self.router.backend_for_role("executor")?;
        let critic = self.router.backend_for_role("critic")?;

        let plan = planner.plan(observation)?;
        self.audit_plan(run_id, &plan, attempt)?;

        let exec_plan = executor.execute(plan)?;
        self.audit_plan(run_id, &exec_plan, attempt)?;

        let mut attempt_results: Vec<ToolResult> = Vec::new();
        for call in &exec_plan.tool_calls {
            let res = self.tools.invoke(run_id, &call.tool_name, &call.args)?;
            attempt_results.push(res.clone());
            results.push(res);
        }

        // The critic judges this attempt's results, not the cumulative history.
        let report = critic.critique(observation, &attempt_results)?;
        self.journal.append(
            run_id,
            AuditEventType::CriticReport,
            obj(json!({
                "attempt": attempt,
                "decision": report.decision.as_str(),
                "reason": &report.reason,
                "retry_hint": &report.retry_hint,
            })),
        )?;

        Ok(match report.decision {
            CriticDecision::Passed => Verdict::Passed,
            CriticDecision::Retry => Verdict::Retry(report.reason),
            CriticDecision::Failed => Verdict::Failed(report.reason),
        })
    }

    fn audit_plan(&self, run_id: &str, plan: &ToolPlan, attempt: u32) -> Result<(), EngineError> {
        let calls: Vec<Value> = plan
            .tool_calls
            .iter()
            .map(|c| json!({"tool_name": &c.tool_name, "args": &c.args, "call_id": &c.call_id}))
            .collect();
        self.journal.append(
            run_id,
            AuditEventType::PlanProposed,
            obj(json!({
                "attempt": attempt,
                "agent_type": plan.agent_type.as_str(),
                "tool_calls": calls,
                "note": &plan.note,
            })),
        )?;
        Ok(())
    }

    /// Emit `RunFailed` (best effort) and return the failed result. A
    /// journal fault here has nowhere left to go, so it is logged and the
    /// result still reports the original error.
    fn fail_run(
        &self,
        run_id: &str,
        results: Vec<ToolResult>,
        attempts: u32,
        error: &str,
    ) -> RunResult {
        if let Err(journal_err) = self.journal.append(
            run_id,
            AuditEventType::RunFailed,
            obj(json!({"error": error, "attempts": attempts})),
        ) {
            tracing::error!(run_id, %journal_err, "failed to journal RunFailed");
        }
        RunResult::failed(run_id, results, error)
    }
}

fn obj(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use piebot_audit::AuditJournal;
    use piebot_models::ModelRouter;
    use piebot_policy::{PolicyEngine, SecurityConfig};
    use piebot_tools::{ApprovalGate, ToolRegistry};
    use piebot_types::{JsonMap, Observation};

    use super::Orchestrator;

    fn orchestrator_without_routes(dir: &std::path::Path) -> (Orchestrator, std::path::PathBuf) {
        let runtime = dir.join("runtime");
        let journal = Arc::new(AuditJournal::for_runtime(&runtime).unwrap());
        let tools = ToolRegistry::new(
            PolicyEngine::new(SecurityConfig::default()),
            ApprovalGate::default(),
            Arc::clone(&journal),
            dir.to_path_buf(),
            runtime.clone(),
        );

        let config = dir.join("router.yaml");
        std::fs::write(&config, "models: {}\nrouting: {}\n").unwrap();
        let router = ModelRouter::load(&config).unwrap();

        (
            Orchestrator::new(tools, journal, router),
            runtime.join("logs").join("audit.jsonl"),
        )
    }

    #[test]
    fn router_failure_becomes_run_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, log_path) = orchestrator_without_routes(dir.path());

        let res = orch.run_once(&Observation::new("r1", "text", JsonMap::new()));

        assert!(!res.ok);
        assert_eq!(
            res.error.as_deref(),
            Some("Router: no model routed for role: planner")
        );

        let text = std::fs::read_to_string(&log_path).unwrap();
        let types: Vec<String> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(types, vec!["RunStarted", "ObservationCaptured", "RunFailed"]);
        piebot_audit::replay_audit_log(&log_path).unwrap();
    }

    #[test]
    fn run_failed_payload_records_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, log_path) = orchestrator_without_routes(dir.path());

        orch.run_once(&Observation::new("r1", "text", JsonMap::new()));

        let text = std::fs::read_to_string(&log_path).unwrap();
        let last: serde_json::Value =
            serde_json::from_str(text.lines().filter(|l| !l.trim().is_empty()).last().unwrap())
                .unwrap();
        assert_eq!(last["type"], json!("RunFailed"));
        assert_eq!(last["payload"]["attempts"], json!(1));
    }
}
