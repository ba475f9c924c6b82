use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// One batch failed validation or its storage write. Earlier batches
    /// of the same upload remain committed.
    #[error("batch {index}: {source}")]
    Batch {
        index: usize,
        #[source]
        source: strata_store::StoreError,
    },

    #[error("batch {index} timed out after {seconds}s")]
    Timeout { index: usize, seconds: u64 },

    #[error("batch task failed: {0}")]
    Join(String),
}

pub type IngestResult<T> = Result<T, IngestError>;
