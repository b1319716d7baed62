//! Error taxonomy for the orchestrator core.
//!
//! Every variant maps to one RPC error code (see [`OrchestratorError::error_code`])
//! and carries a `retryable` flag. Scope-control refusals (`blocked`,
//! `duplicate_blocked`) are intentionally *not* modeled here: they are
//! structured successes, not errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("handoff not found: {0}")]
    HandoffNotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("git repository invalid: {0}")]
    GitRepositoryInvalid(String),

    #[error("subprocess error: {0}")]
    Subprocess(String),

    #[error("memory store error: {0}")]
    MemoryStore(String),

    #[error("memory retrieve error: {0}")]
    MemoryRetrieve(String),

    #[error("circuit breaker open for {0}")]
    CircuitBreakerOpen(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// The RPC error code this variant surfaces as, per the external
    /// interface contract.
    pub fn error_code(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(_) => "VALIDATION_ERROR",
            OrchestratorError::WorkflowNotFound(_) | OrchestratorError::HandoffNotFound(_) => {
                "NOT_FOUND"
            }
            OrchestratorError::Database(_) => "TOOL_EXECUTION_ERROR",
            OrchestratorError::Workspace(_) => "TOOL_EXECUTION_ERROR",
            OrchestratorError::GitRepositoryInvalid(_) => "GIT_REPOSITORY_INVALID",
            OrchestratorError::Subprocess(_) => "TOOL_EXECUTION_ERROR",
            OrchestratorError::MemoryStore(_) => "MEMORY_STORE_ERROR",
            OrchestratorError::MemoryRetrieve(_) => "MEMORY_RETRIEVE_ERROR",
            OrchestratorError::CircuitBreakerOpen(_) => "CIRCUIT_BREAKER_OPEN",
            OrchestratorError::Invariant(_) => "UNEXPECTED_ERROR",
            OrchestratorError::Configuration(_) => "UNEXPECTED_ERROR",
            OrchestratorError::Internal(_) => "UNEXPECTED_ERROR",
        }
    }

    /// Whether a caller may usefully retry the operation that produced
    /// this error, per the error-handling design's taxonomy.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Database(_)
                | OrchestratorError::Workspace(_)
                | OrchestratorError::Subprocess(_)
                | OrchestratorError::MemoryStore(_)
                | OrchestratorError::MemoryRetrieve(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OrchestratorError::WorkflowNotFound(_) | OrchestratorError::HandoffNotFound(_)
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        OrchestratorError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        OrchestratorError::Internal(msg.into())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        OrchestratorError::Internal(format!("serialization error: {e}"))
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        OrchestratorError::Subprocess(format!("io error: {e}"))
    }
}
