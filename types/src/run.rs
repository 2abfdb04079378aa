//! Run-scoped records: observations in, run results and critic verdicts out.

use serde::{Deserialize, Serialize};

use crate::{JsonMap, tool::ToolResult};

/// Opaque identifier shared by every record of one orchestrator invocation.
pub type RunId = String;

/// The input a run advances to a terminal verdict.
///
/// `kind` is a free-form tag (`file_read`, `text`, ...); `data` carries the
/// kind-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub run_id: RunId,
    pub kind: String,
    #[serde(default)]
    pub data: JsonMap,
}

impl Observation {
    #[must_use]
    pub fn new(run_id: impl Into<RunId>, kind: impl Into<String>, data: JsonMap) -> Self {
        Self {
            run_id: run_id.into(),
            kind: kind.into(),
            data,
        }
    }
}

/// Verdict the critic returns for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticDecision {
    Passed,
    Retry,
    Failed,
}

impl CriticDecision {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Retry => "retry",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticReport {
    pub run_id: RunId,
    pub decision: CriticDecision,
    pub reason: String,
    pub retry_hint: Option<String>,
}

impl CriticReport {
    #[must_use]
    pub fn new(run_id: impl Into<RunId>, decision: CriticDecision, reason: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            decision,
            reason: reason.into(),
            retry_hint: None,
        }
    }
}

/// Aggregate outcome of `run_once`: every tool result across all attempts,
/// in invocation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub ok: bool,
    pub tool_results: Vec<ToolResult>,
    pub error: Option<String>,
}

impl RunResult {
    #[must_use]
    pub fn completed(run_id: impl Into<RunId>, tool_results: Vec<ToolResult>) -> Self {
        Self {
            run_id: run_id.into(),
            ok: true,
            tool_results,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(
        run_id: impl Into<RunId>,
        tool_results: Vec<ToolResult>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            ok: false,
            tool_results,
            error: Some(error.into()),
        }
    }
}

/// A batch of patches against the durable state, attributed to a run.
///
/// Patch vocabulary is deliberately minimal: `{op: "set", path, value}`
/// with dot-separated paths. Anything else is rejected whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDelta {
    pub run_id: RunId,
    pub patches: Vec<JsonMap>,
    pub reason: String,
}
