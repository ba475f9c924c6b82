use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error(transparent)]
    Store(#[from] strata_store::StoreError),
}

pub type DiffResult<T> = Result<T, DiffError>;
