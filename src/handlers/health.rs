use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Liveness plus a database ping.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.ping().await.is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
        "realtime_connections": state.publisher.registry().total_connections(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
