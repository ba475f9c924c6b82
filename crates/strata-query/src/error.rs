use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid operator: {0:?}")]
    InvalidOperator(String),

    #[error("invalid verb: {0:?}")]
    InvalidVerb(String),

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error(transparent)]
    Store(#[from] strata_store::StoreError),
}

pub type QueryResult<T> = Result<T, QueryError>;
