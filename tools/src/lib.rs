//! Tool execution framework for piebot.
//!
//! [`registry::ToolRegistry`] is the single choke point: the only path by
//! which a tool handler runs, and the sole emitter of tool-related audit
//! events. Handlers are synchronous functions over JSON arguments and an
//! immutable [`ToolContext`].

pub mod approval;
pub mod builtins;
pub mod registry;
pub mod store;

pub use approval::ApprovalGate;
pub use registry::{RegistryError, ToolRegistry};

use std::path::PathBuf;

use piebot_types::{JsonMap, RiskClass};
use thiserror::Error;

/// Error types for tool handler execution.
///
/// The registry renders these as `"<ErrorKind>: <message>"` in the failed
/// `ToolResult`; [`ToolError::kind`] supplies the kind label.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{message}")]
    BadArgs { message: String },
    #[error("{path}")]
    NotFound { path: String },
    #[error("{path}")]
    IsADirectory { path: String },
    #[error("{path}")]
    NotADirectory { path: String },
    #[error("path escapes repo root")]
    PathEscape,
    #[error("file too large: {size} > {max}")]
    TooLarge { size: u64, max: u64 },
    #[error("approval required")]
    ApprovalRequired,
    #[error("{message}")]
    Subprocess { message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToolError {
    #[must_use]
    pub fn bad_args(message: impl Into<String>) -> Self {
        Self::BadArgs {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadArgs { .. } => "BadArgs",
            Self::NotFound { .. } => "NotFound",
            Self::IsADirectory { .. } => "IsADirectory",
            Self::NotADirectory { .. } => "NotADirectory",
            Self::PathEscape => "PathEscape",
            Self::TooLarge { .. } => "TooLarge",
            Self::ApprovalRequired => "ApprovalRequired",
            Self::Subprocess { .. } => "Subprocess",
            Self::Io(_) => "Io",
        }
    }
}

/// Immutable context handed to every handler: where the repository lives,
/// where runtime artifacts go, and the process approval gate for handlers
/// that re-check it as defense in depth.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub repo_root: PathBuf,
    pub runtime_root: PathBuf,
    pub approvals: ApprovalGate,
}

/// Synchronous tool handler: JSON arguments in, JSON result out.
pub type ToolHandler = fn(&JsonMap, &ToolContext) -> Result<JsonMap, ToolError>;

/// A registered tool: name, risk class, descriptive schema, handler.
///
/// The schema documents the argument shape for operators and planners; the
/// core does not enforce it.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub risk: RiskClass,
    pub schema: serde_json::Value,
    pub handler: ToolHandler,
}
