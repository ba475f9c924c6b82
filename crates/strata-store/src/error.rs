use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("malformed object: {0}")]
    MalformedObject(String),

    #[error("object too large ({size} > {max})")]
    ObjectTooLarge { size: usize, max: usize },

    #[error("id mismatch: declared {declared}, computed {computed}")]
    IdMismatch { declared: String, computed: String },

    #[error(transparent)]
    Id(#[from] strata_types::TypeError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
