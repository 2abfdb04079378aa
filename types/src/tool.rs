//! Tool invocation records and the plans that carry them.

use serde::{Deserialize, Serialize};

use crate::{JsonMap, run::RunId};

/// Which stage of the pipeline authored a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Planner,
    Executor,
    Critic,
}

impl AgentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Executor => "executor",
            Self::Critic => "critic",
        }
    }
}

/// One requested tool invocation.
///
/// The `call_id` a planner mints is provisional; the registry mints the
/// authoritative id when the call actually enters the choke point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub run_id: RunId,
    pub tool_name: String,
    #[serde(default)]
    pub args: JsonMap,
    pub call_id: String,
}

/// Outcome of one tool invocation. `ok` holds exactly when `error` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub run_id: RunId,
    pub call_id: String,
    pub ok: bool,
    #[serde(default)]
    pub result: JsonMap,
    pub error: Option<String>,
}

impl ToolResult {
    #[must_use]
    pub fn success(run_id: impl Into<RunId>, call_id: impl Into<String>, result: JsonMap) -> Self {
        Self {
            run_id: run_id.into(),
            call_id: call_id.into(),
            ok: true,
            result,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(
        run_id: impl Into<RunId>,
        call_id: impl Into<String>,
        result: JsonMap,
        error: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            call_id: call_id.into(),
            ok: false,
            result,
            error: Some(error.into()),
        }
    }
}

/// An ordered batch of tool calls proposed by one pipeline stage.
///
/// Every contained call shares the plan's `run_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPlan {
    pub run_id: RunId,
    pub agent_type: AgentType,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub note: Option<String>,
}

impl ToolPlan {
    #[must_use]
    pub fn new(run_id: impl Into<RunId>, agent_type: AgentType) -> Self {
        Self {
            run_id: run_id.into(),
            agent_type,
            tool_calls: Vec::new(),
            note: None,
        }
    }

    #[must_use]
    pub fn with_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
