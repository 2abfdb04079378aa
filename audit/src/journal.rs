//! Journal writer: single owner of the append handle and the chain tip.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use piebot_types::codec::{canonical_bytes, content_hash};
use piebot_types::{AuditEvent, AuditEventType, JsonMap};
use piebot_utils::redact_text;

/// Tail window scanned on reopen to recover the chain tip. Records are
/// expected to fit inside it; an oversized final record makes recovery
/// report no tip and the next append starts a new chain.
const TAIL_WINDOW_BYTES: u64 = 8192;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to open audit journal {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to append audit event: {0}")]
    Write(#[from] io::Error),
    #[error("failed to encode audit event: {0}")]
    Encode(#[from] serde_json::Error),
}

struct JournalState {
    file: File,
    tip: Option<String>,
}

/// Append-only JSONL journal with hash chaining.
///
/// The write handle and the last-hash tip live behind one lock: a single
/// logical writer per file. Payloads are redacted before they are hashed,
/// so the chain covers exactly the bytes on disk.
pub struct AuditJournal {
    path: PathBuf,
    inner: Mutex<JournalState>,
}

impl AuditJournal {
    /// Open (or create) the journal at `path`, recovering the tip from any
    /// existing file by scanning its final tail window.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| JournalError::Open {
                path: path.clone(),
                source,
            })?;
        }

        let tip = if path.exists() { recover_tip(&path) } else { None };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| JournalError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            inner: Mutex::new(JournalState { file, tip }),
        })
    }

    /// Conventional journal location under a runtime root.
    pub fn for_runtime(runtime_root: &Path) -> Result<Self, JournalError> {
        Self::open(runtime_root.join("logs").join("audit.jsonl"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event: redact the payload, chain it to the tip, seal the
    /// hash over the canonical record with `hash` null, write the line.
    pub fn append(
        &self,
        run_id: &str,
        event_type: AuditEventType,
        payload: JsonMap,
    ) -> Result<AuditEvent, JournalError> {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let mut event = AuditEvent {
            run_id: run_id.to_string(),
            event_type,
            ts_utc: utc_timestamp(),
            payload: redact_map(&payload),
            prev_hash: state.tip.clone(),
            hash: None,
        };

        let mut record = serde_json::to_value(&event)?;
        let hash = content_hash(&record);
        if let Value::Object(map) = &mut record {
            map.insert("hash".to_string(), Value::String(hash.clone()));
        }
        event.hash = Some(hash.clone());

        let mut line = canonical_bytes(&record);
        line.push(b'\n');
        state.file.write_all(&line)?;
        state.file.flush()?;
        state.tip = Some(hash);

        Ok(event)
    }
}

fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Conservative recursive redaction: strings pass through the pattern
/// redactor, mappings and sequences are walked, other scalars are kept.
fn redact_map(payload: &JsonMap) -> JsonMap {
    payload
        .iter()
        .map(|(k, v)| (k.clone(), redact_value(v)))
        .collect()
}

fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_text(s)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_value(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

/// Best-effort tip recovery: parse the last non-empty line inside the tail
/// window and take its `hash`. Anything unparseable means no tip.
fn recover_tip(path: &Path) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let size = file.seek(SeekFrom::End(0)).ok()?;
    if size == 0 {
        return None;
    }

    let window = size.min(TAIL_WINDOW_BYTES);
    file.seek(SeekFrom::End(-(window as i64))).ok()?;
    let mut tail = Vec::with_capacity(window as usize);
    file.read_to_end(&mut tail).ok()?;

    let text = String::from_utf8_lossy(&tail);
    let last = text.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    let record: Value = serde_json::from_str(last).ok()?;
    let tip = record.get("hash").and_then(Value::as_str).map(str::to_owned);
    if tip.is_none() {
        tracing::warn!(path = %path.display(), "audit journal tail has no hash; starting a new chain");
    }
    tip
}

#[cfg(test)]
mod tests {
    use piebot_types::AuditEventType;
    use serde_json::{Value, json};

    use super::AuditJournal;

    fn map(value: Value) -> piebot_types::JsonMap {
        match value {
            Value::Object(m) => m,
            _ => unreachable!("test payloads are objects"),
        }
    }

    #[test]
    fn first_event_has_null_prev_hash() {
        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::open(dir.path().join("audit.jsonl")).unwrap();

        let ev = journal
            .append("r1", AuditEventType::RunStarted, map(json!({"x": "y"})))
            .unwrap();
        assert!(ev.prev_hash.is_none());
        assert_eq!(ev.hash.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn chain_links_consecutive_events() {
        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::open(dir.path().join("audit.jsonl")).unwrap();

        let first = journal
            .append("r1", AuditEventType::RunStarted, map(json!({})))
            .unwrap();
        let second = journal
            .append("r1", AuditEventType::RunCompleted, map(json!({"ok": true})))
            .unwrap();
        assert_eq!(second.prev_hash, first.hash);
    }

    #[test]
    fn reopen_recovers_tip_from_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let first_hash = {
            let journal = AuditJournal::open(&path).unwrap();
            journal
                .append("r1", AuditEventType::RunStarted, map(json!({})))
                .unwrap()
                .hash
        };

        let journal = AuditJournal::open(&path).unwrap();
        let second = journal
            .append("r1", AuditEventType::RunCompleted, map(json!({})))
            .unwrap();
        assert_eq!(second.prev_hash, first_hash);
    }

    #[test]
    fn payload_strings_are_redacted_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let journal = AuditJournal::open(&path).unwrap();

        journal
            .append(
                "r1",
                AuditEventType::ObservationCaptured,
                map(json!({"note": "api_key=\"SECRETVALUE123456\""})),
            )
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("SECRETVALUE123456"));
        assert!(text.contains("[REDACTED]"));
    }

    #[test]
    fn nested_payloads_are_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::open(dir.path().join("audit.jsonl")).unwrap();

        let ev = journal
            .append(
                "r1",
                AuditEventType::ToolExecuted,
                map(json!({"args": {"tokens": ["sk-abcdefghijklmnopqrstuvwx"]}})),
            )
            .unwrap();
        let rendered = serde_json::to_string(&ev.payload).unwrap();
        assert!(!rendered.contains("sk-abcdefghijklmnopqrstuvwx"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
