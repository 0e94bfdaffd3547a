use thiserror::Error;

/// Lifecycle violations. Returned synchronously; the agent is left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("agent {0} is not awaiting approval")]
    NotAwaitingApproval(String),
    #[error("agent {0} is not awaiting clarification")]
    NotAwaitingClarification(String),
    #[error("agent {0} has already been started")]
    AlreadyStarted(String),
    #[error("agent {0} has finished and no longer accepts requests")]
    TerminalState(String),
}

impl LifecycleError {
    /// True when the id did not resolve, as opposed to a state conflict
    pub fn is_not_found(&self) -> bool {
        matches!(self, LifecycleError::AgentNotFound(_))
    }
}
