use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Strata endpoints.
pub fn build_router(state: AppState) -> Router {
    // The transport-level limit backstops the per-part cap; the handler
    // enforces the precise limit with a useful error message.
    let body_limit = state.config.max_part_size.saturating_mul(2);
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/objects/:stream_id", post(handler::upload_objects))
        .route(
            "/objects/:stream_id/:object_id",
            get(handler::download_object),
        )
        .route(
            "/objects/:stream_id/:object_id/single",
            get(handler::download_single),
        )
        .route(
            "/api/getobjects/:stream_id",
            post(handler::download_object_list),
        )
        .route("/api/diff/:stream_id", post(handler::diff_objects))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
