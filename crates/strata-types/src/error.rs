use thiserror::Error;

/// Errors produced by identifier parsing and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid stream id: {0}")]
    InvalidStreamId(String),
}
