use thiserror::Error;

#[derive(Debug, Error)]
pub enum TandemError {
    // Model gateway errors
    #[error("gateway credentials missing: {0}")]
    AuthMissing(String),

    #[error("gateway rate limited: {0}")]
    RateLimited(String),

    #[error("gateway call timed out after {0}s")]
    GatewayTimeout(u64),

    #[error("gateway provider error: {0}")]
    Provider(String),

    // Capability errors
    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("capability '{name}' is not enabled for agent '{agent}'")]
    CapabilityDisabled { agent: String, name: String },

    #[error("capability timed out after {timeout_secs}s: {name}")]
    CapabilityTimeout { name: String, timeout_secs: u64 },

    #[error("capability execution failed: {name}: {message}")]
    CapabilityExecution { name: String, message: String },

    // Engine errors
    #[error("sub-agent depth limit exceeded ({0})")]
    DepthExceeded(usize),

    #[error("run cancelled")]
    Cancelled,

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TandemError {
    /// Whether this error can be folded back into the reasoning loop as an
    /// observation, letting the agent recover or explain, instead of ending
    /// the agent's run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CapabilityNotFound(_)
                | Self::CapabilityDisabled { .. }
                | Self::CapabilityTimeout { .. }
                | Self::CapabilityExecution { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TandemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_errors_are_recoverable() {
        assert!(TandemError::CapabilityNotFound("calc".into()).is_recoverable());
        assert!(TandemError::CapabilityDisabled {
            agent: "a".into(),
            name: "calc".into()
        }
        .is_recoverable());
        assert!(!TandemError::Provider("boom".into()).is_recoverable());
        assert!(!TandemError::Cancelled.is_recoverable());
    }
}
