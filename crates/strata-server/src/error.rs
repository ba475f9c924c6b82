use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use strata_ingest::IngestError;
use strata_query::QueryError;
use strata_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Client sent something we refuse to process. Always answered 400
    /// with the message in the body.
    #[error("{0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Permission seam said no; the status comes from the policy.
    #[error("denied: {reason}")]
    Denied { status: StatusCode, reason: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Denied { status, .. } => *status,
            Self::Store(err) => store_status(err),
            Self::Ingest(err) => match err {
                IngestError::Batch { source, .. } => store_status(source),
                IngestError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
                IngestError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Query(err) => match err {
                QueryError::Store(inner) => store_status(inner),
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Malformed input surfaces as the client's fault; backend trouble does not.
fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::MalformedObject(_)
        | StoreError::ObjectTooLarge { .. }
        | StoreError::IdMismatch { .. }
        | StoreError::Id(_) => StatusCode::BAD_REQUEST,
        StoreError::Serialization(_) | StoreError::Backend(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<strata_diff::DiffError> for ServerError {
    fn from(err: strata_diff::DiffError) -> Self {
        match err {
            strata_diff::DiffError::Store(inner) => Self::Store(inner),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
