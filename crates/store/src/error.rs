//! Error taxonomy for the stores. Callers can always match on the kind;
//! genuinely unanticipated I/O failures keep the underlying error as
//! source.

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(u64),

    #[error("malformed record: {0}")]
    Format(String),

    #[error("operation not permitted: {0}")]
    InvalidOperation(String),

    #[error("turn index {index} out of bounds (length {len})")]
    OutOfBounds { index: usize, len: usize },

    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
