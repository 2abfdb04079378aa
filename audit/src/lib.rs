//! Append-only, hash-chained audit journal.
//!
//! One canonical JSON object per line; each record's `prev_hash` is the
//! `hash` of the record before it, so reordering or editing any line breaks
//! either the chain or the per-record hash. The verifier recomputes both;
//! the replayer additionally enforces run-level ordering invariants and
//! derives a deterministic state hash from the event sequence alone.

mod journal;
mod replay;
mod verify;

pub use journal::{AuditJournal, JournalError};
pub use replay::{ReplayError, ReplaySummary, replay_audit_log};
pub use verify::{VerifyError, verify_audit_log};
