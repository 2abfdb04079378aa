//! In-process working memory with TTL and hard size caps.
//!
//! Fail-closed by construction: inserts that would exceed the entry or
//! byte cap are refused rather than evicting live entries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

const DEFAULT_MAX_ENTRIES: usize = 256;
const DEFAULT_MAX_BYTES: usize = 256_000;

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
    run_id: Option<String>,
    approx_bytes: usize,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub entries: usize,
    pub bytes_used: usize,
    pub max_entries: usize,
    pub max_bytes: usize,
}

/// Short-term key/value store, optionally scoped to a run.
#[derive(Debug)]
pub struct WorkingMemory {
    max_entries: usize,
    max_bytes: usize,
    items: HashMap<String, Entry>,
    bytes_used: usize,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_BYTES)
    }
}

impl WorkingMemory {
    #[must_use]
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
            items: HashMap::new(),
            bytes_used: 0,
        }
    }

    /// Insert a value with a TTL.
    ///
    /// Returns false without mutating when the TTL is non-positive or
    /// when either cap would be exceeded. Overwrites release the prior
    /// entry's cost before the cap check.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: Value,
        ttl: Duration,
        run_id: Option<&str>,
    ) -> bool {
        if ttl.is_zero() {
            return false;
        }

        self.evict_expired();

        let key = key.into();
        let approx = approx_size(&value);
        if self.items.contains_key(&key) {
            self.drop_key(&key);
        }

        if self.items.len() + 1 > self.max_entries {
            return false;
        }
        if self.bytes_used + approx > self.max_bytes {
            return false;
        }

        self.items.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
                run_id: run_id.map(str::to_owned),
                approx_bytes: approx,
            },
        );
        self.bytes_used += approx;
        true
    }

    pub fn get(&mut self, key: &str) -> Option<&Value> {
        self.evict_expired();
        self.items.get(key).map(|e| &e.value)
    }

    /// Drop every entry attributed to `run_id`.
    pub fn clear_run(&mut self, run_id: &str) {
        self.evict_expired();
        let doomed: Vec<String> = self
            .items
            .iter()
            .filter(|(_, e)| e.run_id.as_deref() == Some(run_id))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            self.drop_key(&key);
        }
    }

    pub fn clear_all(&mut self) {
        self.items.clear();
        self.bytes_used = 0;
    }

    pub fn stats(&mut self) -> MemoryStats {
        self.evict_expired();
        MemoryStats {
            entries: self.items.len(),
            bytes_used: self.bytes_used,
            max_entries: self.max_entries,
            max_bytes: self.max_bytes,
        }
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .items
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.drop_key(&key);
        }
    }

    fn drop_key(&mut self, key: &str) {
        if let Some(entry) = self.items.remove(key) {
            self.bytes_used = self.bytes_used.saturating_sub(entry.approx_bytes);
        }
    }
}

/// Cheap, deterministic cost estimate: the UTF-8 length of the value's
/// compact rendering. Enough to enforce a cap and fail closed.
fn approx_size(value: &Value) -> usize {
    value.to_string().len()
}
