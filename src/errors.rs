// Error categories for the agent core
//
// Most tool failures are reported back to the model as error-status tool
// results rather than bubbling up as Rust errors; AgentError covers the
// cases where the loop itself has to stop or reroute.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The model emitted a tool tag we could not turn into a typed call.
    #[error("malformed tool call: {0}")]
    Parse(String),

    /// The active permission mode forbids this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A tool ran and failed in a way the loop cannot recover from.
    #[error("tool execution failed: {0}")]
    Execution(String),

    /// The chat provider could not produce a reply.
    #[error("reply unavailable: {0}")]
    Provider(String),

    /// The user interrupted the current request.
    #[error("cancelled by user")]
    Cancelled,
}

impl AgentError {
    /// True when the loop may retry the current step once before giving up.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AgentError::Provider(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_are_recoverable() {
        assert!(AgentError::Provider("timeout".into()).is_recoverable());
        assert!(!AgentError::Cancelled.is_recoverable());
        assert!(!AgentError::Execution("boom".into()).is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let e = AgentError::PermissionDenied("write_file in read-only mode".into());
        assert_eq!(
            e.to_string(),
            "permission denied: write_file in read-only mode"
        );
        assert_eq!(AgentError::Cancelled.to_string(), "cancelled by user");
    }
}
