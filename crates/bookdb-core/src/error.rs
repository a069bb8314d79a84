use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid engine '{0}', expected 'text' or 'vector'")]
    InvalidEngine(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Chunk inconsistent with its record: {0}")]
    InconsistentChunk(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Transient store failures are the only ones worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
