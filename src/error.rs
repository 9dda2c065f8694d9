use thiserror::Error;

/// Errors surfaced by the store layer and the pipelines built on it.
///
/// A duplicate release date is deliberately not represented here: the
/// versioning contract treats it as a logged no-op, not a failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input, rejected before any side effect.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Another open commit holds the branch. Surfaced to the caller as a
    /// retryable condition, never retried internally.
    #[error("branch '{0}' is locked by another open commit")]
    BranchLocked(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Mid-stream storage failure. For commit-scoped work nothing durable
    /// changes; for non-atomic bulk jobs already-flushed batches remain.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The semantic index holds data that violates its own schema. Fatal,
    /// never silently skipped.
    #[error("semantic index corrupt: {0}")]
    CorruptIndex(String),
}

pub type Result<T> = std::result::Result<T, Error>;
