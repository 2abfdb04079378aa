//! Shared utilities for piebot: secret redaction and atomic file writes.

mod atomic_write;
mod redaction;

pub use atomic_write::atomic_write;
pub use redaction::{REDACTION_MARKER, redact_text};
