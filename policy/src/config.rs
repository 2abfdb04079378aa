//! Process-scoped security configuration.
//!
//! The arming flags and approval token are read from the environment once,
//! at startup, and carried as an explicit value from then on. Nothing else
//! in the system consults the environment for security state.

/// Security switches for one process.
///
/// Everything defaults to off; denial is the resting state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Arms WRITE-risk tools. Unarmed writes are denied.
    pub execution_arm: bool,
    /// Permits EXEC-risk tools (still approval-gated).
    pub allow_exec: bool,
    /// Permits NETWORK-risk tools (still approval-gated).
    pub allow_network: bool,
    /// Expected out-of-band approval token. `None` (or an empty variable)
    /// means approvals always fail closed.
    pub approval_token: Option<String>,
}

impl SecurityConfig {
    pub const EXECUTION_ARM_VAR: &'static str = "EXECUTION_ARM";
    pub const ALLOW_EXEC_VAR: &'static str = "ALLOW_EXEC";
    pub const ALLOW_NETWORK_VAR: &'static str = "ALLOW_NETWORK";
    pub const APPROVAL_TOKEN_VAR: &'static str = "PIEBOT_APPROVAL_TOKEN";

    /// Capture the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            execution_arm: env_flag(Self::EXECUTION_ARM_VAR),
            allow_exec: env_flag(Self::ALLOW_EXEC_VAR),
            allow_network: env_flag(Self::ALLOW_NETWORK_VAR),
            approval_token: std::env::var(Self::APPROVAL_TOKEN_VAR)
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }
}

/// Boolean environment flag: truthy is {1, true, yes, y, on}, case
/// insensitive; anything else (including absence) is false.
fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "yes" | "y" | "on")
        })
        .unwrap_or(false)
}
