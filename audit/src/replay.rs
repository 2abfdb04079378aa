//! Journal replay: integrity plus run-level ordering, and a derived state
//! hash that depends only on the event sequence.

use std::fs;
use std::io;
use std::path::Path;

use serde_json::{Value, json};
use thiserror::Error;

use piebot_types::codec::content_hash;

use crate::verify::{VerifyError, verify_audit_log};

/// Seed of the derived-state fold.
const GENESIS_STATE: &str = "GENESIS";

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("audit verification failed: {0}")]
    Verification(#[from] VerifyError),
    #[error("failed to read audit log: {0}")]
    Io(#[from] io::Error),
    #[error("invalid json at line {line}")]
    InvalidLine { line: usize },
    #[error("empty audit log")]
    EmptyLog,
    #[error("missing run_id on first event")]
    MissingRunId,
    #[error("mixed run_id at line {line}")]
    MixedRunId { line: usize },
    #[error("missing type/hash at line {line}")]
    MissingTypeOrHash { line: usize },
    #[error("first event must be RunStarted")]
    FirstNotRunStarted,
    #[error("events after terminal event")]
    EventsAfterTerminal,
    #[error("missing terminal event (RunCompleted/RunFailed)")]
    MissingTerminal,
}

/// Outcome of a successful replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub run_id: String,
    pub replay_state_hash: String,
}

/// Replay the journal at `path`.
///
/// Verifies the hash chain, then enforces: non-empty log, `RunStarted`
/// first, one `run_id` throughout, `type` and `hash` on every record, and
/// exactly one terminal event with nothing after it. The derived state hash
/// folds `{prev, event_hash, type}` through the content hash, starting from
/// the genesis sentinel; identical logs produce identical hashes.
pub fn replay_audit_log(path: &Path) -> Result<ReplaySummary, ReplayError> {
    verify_audit_log(path)?;

    let text = fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return Err(ReplayError::EmptyLog);
    }

    let mut state_hash = GENESIS_STATE.to_string();
    let mut run_id: Option<String> = None;
    let mut seen_terminal = false;

    for (idx, line) in lines.iter().enumerate() {
        let ordinal = idx + 1;
        let event: Value =
            serde_json::from_str(line).map_err(|_| ReplayError::InvalidLine { line: ordinal })?;

        let event_run_id = event.get("run_id").and_then(Value::as_str);
        if let Some(expected) = &run_id {
            if event_run_id != Some(expected.as_str()) {
                return Err(ReplayError::MixedRunId { line: ordinal });
            }
        } else {
            match event_run_id {
                Some(id) if !id.is_empty() => run_id = Some(id.to_string()),
                _ => return Err(ReplayError::MissingRunId),
            }
        }

        let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");
        let event_hash = event.get("hash").and_then(Value::as_str).unwrap_or("");
        if event_type.is_empty() || event_hash.is_empty() {
            return Err(ReplayError::MissingTypeOrHash { line: ordinal });
        }

        if ordinal == 1 {
            if event_type != "RunStarted" {
                return Err(ReplayError::FirstNotRunStarted);
            }
        } else if seen_terminal {
            return Err(ReplayError::EventsAfterTerminal);
        }

        if event_type == "RunCompleted" || event_type == "RunFailed" {
            seen_terminal = true;
        }

        state_hash = content_hash(&json!({
            "prev": state_hash,
            "event_hash": event_hash,
            "type": event_type,
        }));
    }

    if !seen_terminal {
        return Err(ReplayError::MissingTerminal);
    }

    Ok(ReplaySummary {
        events: lines.len(),
        run_id: run_id.unwrap_or_default(),
        replay_state_hash: state_hash,
    })
}
