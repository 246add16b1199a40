//! Error types for document generation.

use thiserror::Error;

/// Result type alias using the generation error type.
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Failures that reach the caller of a generation job.
///
/// Planning failures and individual section or round failures are absorbed
/// by the strategies; only these two outcomes escape.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The repository context could not be loaded at all.
    #[error("repository context unavailable: {0}")]
    RepositoryUnavailable(#[from] quill_types::CollaboratorError),

    /// Every generation call came back empty or failed.
    #[error("generation produced no usable output ({strategy})")]
    NoOutput { strategy: &'static str },
}
