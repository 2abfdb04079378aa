//! Policy engine for piebot tool invocations.
//!
//! Maps (tool name, risk class, arguments) to a ternary decision: allow,
//! deny, or allow-with-approval. Defaults are fail-closed:
//!
//! - `READ` is always allowed, no approval.
//! - `EXEC` is denied unless `ALLOW_EXEC` is set.
//! - `NETWORK` is denied unless `ALLOW_NETWORK` is set.
//! - `WRITE` is denied unless `EXECUTION_ARM` is set, and even then every
//!   write requires an approval token.
//!
//! The engine never fails; every input yields a decision.

mod config;

pub use config::SecurityConfig;

use piebot_types::{JsonMap, PolicyDecision, RiskClass};

/// Decides whether a tool invocation is permitted.
///
/// Holds an immutable [`SecurityConfig`] captured at construction; tests
/// build the config directly instead of touching process state.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    config: SecurityConfig,
}

impl PolicyEngine {
    #[must_use]
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Judge one invocation. Infallible by design.
    #[must_use]
    pub fn decide(&self, tool_name: &str, risk: RiskClass, _args: &JsonMap) -> PolicyDecision {
        let decision = match risk {
            RiskClass::Read => PolicyDecision::new(true, "READ allowed by default", false),
            RiskClass::Exec if !self.config.allow_exec => {
                PolicyDecision::new(false, "EXEC denied by default (ALLOW_EXEC=false)", false)
            }
            RiskClass::Network if !self.config.allow_network => {
                PolicyDecision::new(false, "NETWORK denied by default (ALLOW_NETWORK=false)", false)
            }
            // Remediable deny: requires_approval signals the caller that
            // arming the config (plus approval) would permit the write.
            RiskClass::Write if !self.config.execution_arm => {
                PolicyDecision::new(false, "WRITE denied (EXECUTION_ARM=false)", true)
            }
            RiskClass::Write | RiskClass::Exec | RiskClass::Network => PolicyDecision::new(
                true,
                format!("{risk} allowed by config; approval required"),
                true,
            ),
        };
        tracing::debug!(
            tool = tool_name,
            risk = risk.as_str(),
            allow = decision.allow,
            requires_approval = decision.requires_approval,
            "policy decision"
        );
        decision
    }

    /// Replace sensitive substrings with the redaction marker.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        piebot_utils::redact_text(text)
    }
}
