//! Error type for collaborator lookups.

use thiserror::Error;

/// Result type alias for collaborator operations.
pub type Result<T> = std::result::Result<T, CollaboratorError>;

/// Errors raised by repository and document collaborators.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A repository reference could not be understood.
    #[error("Invalid repository reference: {0}")]
    InvalidRepo(String),

    /// The collaborator could not be reached or failed.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollaboratorError {
    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Returns true if this error means the entity simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
