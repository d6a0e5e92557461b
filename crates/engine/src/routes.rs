use crate::api;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Minimal operator-facing surface: health and fallback queue stats. The
/// full user-facing notification API (list/mark-read/preferences) is
/// exposed as plain async functions in [`crate::api`] for callers that
/// embed this crate directly — no HTTP/JWT/ORM layer is built for it.
pub fn create_route(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/stats/fallback-queue", get(fallback_queue_stats))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn fallback_queue_stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    let stats = api::get_fallback_queue_stats(&state).await.map_err(|e| {
        tracing::error!("failed to load fallback queue stats: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(serde_json::json!({
        "pending_count": stats.pending_count,
        "poisoned_count": stats.poisoned_count,
        "oldest_pending_age_seconds": stats.oldest_pending_age.map(|d| d.num_seconds()),
    })))
}
