//! Domain errors for the knowledge sync controller.

use thiserror::Error;

/// Domain-level errors that can occur while reconciling knowledge sources.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Knowledge source not found: {0}")]
    SourceNotFound(String),

    #[error("Knowledge source already exists: {0}")]
    SourceAlreadyExists(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Timed out waiting for thread {0} to be assigned a workspace")]
    ThreadNotReady(String),

    #[error("Task launch failed: {0}")]
    TaskLaunchFailed(String),

    #[error("Task result unavailable: {0}")]
    TaskResultUnavailable(String),

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
