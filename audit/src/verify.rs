//! Chain verification: recompute every record hash and prev-hash link.

use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use piebot_types::codec::content_hash;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("audit log does not exist")]
    MissingLog,
    #[error("failed to read audit log: {0}")]
    Io(#[from] io::Error),
    #[error("invalid json at line {line}")]
    InvalidLine { line: usize },
    #[error("prev_hash mismatch at line {line}")]
    PrevHashMismatch { line: usize },
    #[error("hash mismatch at line {line}")]
    HashMismatch { line: usize },
}

/// Verify the hash chain of the journal at `path`.
///
/// Blank lines are tolerated and skipped. Returns the number of verified
/// records. Line numbers in errors are physical (1-based) file lines.
pub fn verify_audit_log(path: &Path) -> Result<usize, VerifyError> {
    if !path.exists() {
        return Err(VerifyError::MissingLog);
    }

    let text = fs::read_to_string(path)?;
    let mut prev: Option<String> = None;
    let mut records = 0usize;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: Value =
            serde_json::from_str(trimmed).map_err(|_| VerifyError::InvalidLine { line })?;

        if value.get("prev_hash").and_then(Value::as_str) != prev.as_deref() {
            return Err(VerifyError::PrevHashMismatch { line });
        }

        let recorded = value.get("hash").and_then(Value::as_str).map(str::to_owned);
        let mut unsealed = value;
        if let Value::Object(map) = &mut unsealed {
            map.insert("hash".to_string(), Value::Null);
        }
        let actual = content_hash(&unsealed);
        if recorded.as_deref() != Some(actual.as_str()) {
            return Err(VerifyError::HashMismatch { line });
        }

        prev = recorded;
        records += 1;
    }

    Ok(records)
}
