//! Out-of-band approval gate.
//!
//! Compares a per-invocation token against the process-scoped expected
//! value. The gate is oblivious to which tool is being approved; the
//! registry ties the check to a specific call.

/// Token comparator. Fails closed when no expected token is configured.
#[derive(Debug, Clone, Default)]
pub struct ApprovalGate {
    expected: Option<String>,
}

impl ApprovalGate {
    /// Build from the configured token; empty or whitespace-only values
    /// disable approvals entirely.
    #[must_use]
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }

    #[must_use]
    pub fn is_approved(&self, token: Option<&str>) -> bool {
        match (&self.expected, token) {
            (Some(expected), Some(token)) => token.trim() == expected,
            _ => false,
        }
    }
}
