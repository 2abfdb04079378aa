//! Durable state adapter: sole writer of the canonical state file.
//!
//! Callers receive read-only snapshots by deep copy; the only mutation
//! path is [`StateAdapter::apply_delta`] with the minimal patch
//! vocabulary (`op = "set"`, dot-separated paths). A delta either applies
//! and persists whole, or leaves both memory and disk untouched.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use piebot_types::codec::canonical_bytes;
use piebot_types::{JsonMap, StateDelta};
use piebot_utils::atomic_write;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to persist state file {}: {source}", path.display())]
    Persist { path: PathBuf, source: io::Error },
    #[error("state file is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported patch: {detail}")]
    UnsupportedPatch { detail: String },
}

/// Owned handle to one state file.
#[derive(Debug)]
pub struct StateAdapter {
    state_path: PathBuf,
    state: JsonMap,
}

impl StateAdapter {
    /// Load the state at `path`, or seed and persist the default skeleton.
    pub fn load_or_init(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let state_path = path.into();

        let state = if state_path.exists() {
            let raw = std::fs::read_to_string(&state_path).map_err(|source| StateError::Read {
                path: state_path.clone(),
                source,
            })?;
            if raw.trim().is_empty() {
                JsonMap::new()
            } else {
                let parsed: Value = serde_json::from_str(&raw)?;
                match parsed {
                    Value::Object(map) => map,
                    _ => JsonMap::new(),
                }
            }
        } else {
            let mut skeleton = JsonMap::new();
            skeleton.insert("version".to_string(), Value::from(1));
            skeleton.insert("store".to_string(), Value::Object(JsonMap::new()));
            let adapter = Self {
                state_path: state_path.clone(),
                state: skeleton,
            };
            adapter.persist()?;
            tracing::info!(path = %state_path.display(), "state file initialized");
            adapter.state
        };

        Ok(Self { state_path, state })
    }

    /// Deep copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        Value::Object(self.state.clone())
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        canonical_bytes(&Value::Object(self.state.clone()))
    }

    /// Apply a delta and rewrite the whole state file canonically.
    ///
    /// Every patch is validated before any is applied: a bad patch fails
    /// the call with no partial state and no persistence.
    pub fn apply_delta(&mut self, delta: &StateDelta) -> Result<(), StateError> {
        let mut validated: Vec<(&str, Option<&Value>)> = Vec::with_capacity(delta.patches.len());
        for patch in &delta.patches {
            let op = patch.get("op").and_then(Value::as_str);
            let path = patch.get("path").and_then(Value::as_str).unwrap_or("");
            if op != Some("set") || path.is_empty() {
                return Err(StateError::UnsupportedPatch {
                    detail: Value::Object(patch.clone()).to_string(),
                });
            }
            validated.push((path, patch.get("value")));
        }

        for (path, value) in validated {
            set_dot_path(&mut self.state, path, value.cloned().unwrap_or(Value::Null));
        }
        self.persist()?;
        tracing::debug!(run_id = %delta.run_id, patches = delta.patches.len(), "state delta applied");
        Ok(())
    }

    fn persist(&self) -> Result<(), StateError> {
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StateError::Persist {
                path: self.state_path.clone(),
                source,
            })?;
        }
        atomic_write(&self.state_path, &self.serialize()).map_err(|source| StateError::Persist {
            path: self.state_path.clone(),
            source,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.state_path
    }
}

/// Assign `value` at a dot-separated path, creating intermediate mappings
/// on demand. Non-mapping intermediates are replaced.
fn set_dot_path(state: &mut JsonMap, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let leaf = parts.pop().unwrap_or(path);

    let mut current = state;
    for part in parts {
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(JsonMap::new()));
        if !slot.is_object() {
            *slot = Value::Object(JsonMap::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => unreachable!("intermediate was coerced to a mapping"),
        };
    }
    current.insert(leaf.to_string(), value);
}
