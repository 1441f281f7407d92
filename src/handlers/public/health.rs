use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - service description
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "ohmnyom-api",
            "version": version,
            "endpoints": {
                "public": ["/health", "/sign/up", "/sign/in", "/sign/refresh"],
                "account": "/account[/photo] (protected)",
                "pets": "/pets[/:pet_id[/photo|/feeders]] (protected)",
                "feeds": "/pets/:pet_id/feeds[/:feed_id] (protected)",
                "sign_out": "/sign/out (protected)",
            }
        }
    }))
}

/// GET /health - liveness including the persistence backend
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
