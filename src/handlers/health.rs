use crate::app_state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    database: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    services: ServiceStatus,
}

/// Responds with the health status of the server and its database.
///
/// # Responses
/// - `200 OK` with `{"status":"ok","services":{"database":"connected"}}`
/// - `503 SERVICE UNAVAILABLE` with `{"status":"error","services":{"database":"disconnected"}}`
///   if the database ping fails.
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // ---
    match state.repository().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                services: ServiceStatus {
                    database: "connected",
                },
            }),
        ),
        Err(err) => {
            tracing::error!("Health check database ping failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "error",
                    services: ServiceStatus {
                        database: "disconnected",
                    },
                }),
            )
        }
    }
}
