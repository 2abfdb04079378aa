//! Deterministic backend used for tests and dry runs.
//!
//! Planner: a `file_read` observation becomes one `fs.read_file` call;
//! anything else plans nothing. Executor: relabels the stage without
//! transforming. Critic: retry on any failed result, else passed. No
//! randomness beyond provisional call ids, so runs are replayable.

use serde_json::Value;
use uuid::Uuid;

use piebot_types::{
    AgentType, CriticDecision, CriticReport, JsonMap, Observation, ToolCall, ToolPlan, ToolResult,
};

use crate::backend::{Backend, BackendError};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn plan(&self, observation: &Observation) -> Result<ToolPlan, BackendError> {
        let run_id = observation.run_id.clone();

        if observation.kind == "file_read" {
            let path = observation
                .data
                .get("path")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if path.is_empty() {
                return Ok(ToolPlan::new(run_id, AgentType::Planner).with_note("missing path"));
            }

            let mut args = JsonMap::new();
            args.insert("path".to_string(), Value::String(path.to_string()));
            let call = ToolCall {
                run_id: run_id.clone(),
                tool_name: "fs.read_file".to_string(),
                args,
                call_id: Uuid::new_v4().simple().to_string(),
            };
            return Ok(ToolPlan::new(run_id, AgentType::Planner)
                .with_calls(vec![call])
                .with_note("read file"));
        }

        Ok(ToolPlan::new(run_id, AgentType::Planner).with_note("no-op"))
    }

    fn execute(&self, plan: ToolPlan) -> Result<ToolPlan, BackendError> {
        // The null executor does not transform the plan, only relabels the stage.
        Ok(ToolPlan {
            agent_type: AgentType::Executor,
            ..plan
        })
    }

    fn critique(
        &self,
        observation: &Observation,
        tool_results: &[ToolResult],
    ) -> Result<CriticReport, BackendError> {
        let run_id = observation.run_id.clone();

        if tool_results.iter().any(|r| !r.ok) {
            // Deterministic: any tool failure requests a retry; the
            // orchestrator caps attempts and converts the last retry to failed.
            return Ok(CriticReport::new(run_id, CriticDecision::Retry, "tool failure"));
        }

        Ok(CriticReport::new(run_id, CriticDecision::Passed, "all tool calls ok"))
    }
}
