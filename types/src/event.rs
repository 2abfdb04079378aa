//! Audit event records.
//!
//! Events are created only by the journal writer and never mutated. The
//! `hash` field is computed over the canonical encoding of the same record
//! with `hash` set to null; `prev_hash` links each record to its
//! predecessor, turning any line tampering into a verifier failure.

use serde::{Deserialize, Serialize};

use crate::{JsonMap, run::RunId};

/// Closed set of event types a journal writer may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventType {
    RunStarted,
    ObservationCaptured,
    PlanProposed,
    PolicyDecision,
    ApprovalRequested,
    ApprovalGranted,
    ApprovalDenied,
    ToolExecuted,
    ToolResultStored,
    CriticReport,
    StateDeltaApplied,
    RunCompleted,
    RunFailed,
}

impl AuditEventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "RunStarted",
            Self::ObservationCaptured => "ObservationCaptured",
            Self::PlanProposed => "PlanProposed",
            Self::PolicyDecision => "PolicyDecision",
            Self::ApprovalRequested => "ApprovalRequested",
            Self::ApprovalGranted => "ApprovalGranted",
            Self::ApprovalDenied => "ApprovalDenied",
            Self::ToolExecuted => "ToolExecuted",
            Self::ToolResultStored => "ToolResultStored",
            Self::CriticReport => "CriticReport",
            Self::StateDeltaApplied => "StateDeltaApplied",
            Self::RunCompleted => "RunCompleted",
            Self::RunFailed => "RunFailed",
        }
    }

    /// Whether this event ends a run. Exactly one terminal event may appear
    /// in a journal, and nothing may follow it.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::RunCompleted | Self::RunFailed)
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hash-chained journal record.
///
/// `prev_hash` is null on the first record of a file; `hash` is 64
/// lowercase hex characters once sealed. Both serialize as JSON null while
/// unset so the hashed form and the written form stay byte-compatible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub run_id: RunId,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub ts_utc: String,
    pub payload: JsonMap,
    pub prev_hash: Option<String>,
    pub hash: Option<String>,
}
