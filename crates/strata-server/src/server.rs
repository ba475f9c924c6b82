use tokio::net::TcpListener;

use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Strata object server.
pub struct StrataServer {
    state: AppState,
}

impl StrataServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.state.config.bind_addr;
        let app = self.router();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("strata server listening on {addr}");
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
