//! Core domain types for piebot.
//!
//! This crate contains pure value records with no IO and no async: the
//! entities that flow between the planner, the tool registry, and the audit
//! journal, plus the canonical codec they are hashed with. Everything here
//! can be used from any layer of the system.

pub mod codec;

mod event;
mod run;
mod tool;

pub use event::{AuditEvent, AuditEventType};
pub use run::{CriticDecision, CriticReport, Observation, RunId, RunResult, StateDelta};
pub use tool::{AgentType, ToolCall, ToolPlan, ToolResult};

use serde::{Deserialize, Serialize};

/// Heterogeneous string-keyed payload, as carried by observations, tool
/// arguments, tool results, and audit events.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Risk category by which the policy engine judges a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskClass {
    Read,
    Write,
    Exec,
    Network,
}

impl RiskClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Exec => "EXEC",
            Self::Network => "NETWORK",
        }
    }
}

impl std::fmt::Display for RiskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a policy consultation for one tool invocation.
///
/// For `READ` risk, `allow` is true and `requires_approval` is false. For
/// the mutating risk classes, `allow == true` always implies
/// `requires_approval == true`; a deny may still set `requires_approval` to
/// signal that the deny is configuration-driven and remediable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
    pub reason: String,
    pub requires_approval: bool,
}

impl PolicyDecision {
    #[must_use]
    pub fn new(allow: bool, reason: impl Into<String>, requires_approval: bool) -> Self {
        Self {
            allow,
            reason: reason.into(),
            requires_approval,
        }
    }
}
