//! The closed backend interface and the kind table that constructs it.

use thiserror::Error;

use piebot_types::{CriticReport, Observation, ToolPlan, ToolResult};

use crate::null::NullBackend;

/// Failure inside a backend operation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One model backend: the three pipeline operations every kind must expose.
pub trait Backend: std::fmt::Debug {
    /// Propose a tool plan for an observation.
    fn plan(&self, observation: &Observation) -> Result<ToolPlan, BackendError>;

    /// Transform (or pass through) a proposed plan.
    fn execute(&self, plan: ToolPlan) -> Result<ToolPlan, BackendError>;

    /// Judge the current attempt's results.
    fn critique(
        &self,
        observation: &Observation,
        tool_results: &[ToolResult],
    ) -> Result<CriticReport, BackendError>;
}

/// Closed set of constructible backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Null,
}

impl BackendKind {
    /// Look up a kind by its configuration string.
    #[must_use]
    pub fn from_kind_str(kind: &str) -> Option<Self> {
        match kind {
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    #[must_use]
    pub fn instantiate(self) -> Box<dyn Backend> {
        match self {
            Self::Null => Box::new(NullBackend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BackendKind;

    #[test]
    fn null_kind_resolves() {
        assert_eq!(BackendKind::from_kind_str("null"), Some(BackendKind::Null));
        assert_eq!(BackendKind::from_kind_str("openai_compat"), None);
    }
}
