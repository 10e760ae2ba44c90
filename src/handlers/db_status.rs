use crate::app_state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

/// GET /api/db-status
///
/// Reports the database server version and how many users are mirrored.
///
/// # Responses
/// - `200 OK` with `{status:"connected", version, users, timestamp}`
/// - `503 SERVICE UNAVAILABLE` with `{status:"disconnected", error}`
#[tracing::instrument(skip(state))]
pub async fn db_status(State(state): State<AppState>) -> Response {
    // ---
    match state.repository().status().await {
        Ok(status) => Json(json!({
            "status": "connected",
            "version": status.version,
            "users": status.users,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(err) => {
            tracing::error!("Database status query failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "disconnected",
                    "error": "Database unavailable",
                })),
            )
                .into_response()
        }
    }
}
