//! Profile endpoints for the signed-in user.
//!
//! All handlers here sit behind the auth gate and read the caller from the
//! `Principal` extension it attaches.

use super::shared_types::ApiError;
use crate::app_state::AppState;
use crate::domain::{Principal, UserRecord};
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

const MAX_DISPLAY_NAME_LEN: usize = 255;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    // ---
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    // ---
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AuthTestResponse {
    // ---
    pub message: &'static str,
    pub user: Principal,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/user/profile
///
/// Returns the caller's mirrored record, or 404 `{"error":"User not found"}`
/// when the directory has no row for them (for example after a failed sync).
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserRecord>, ApiError> {
    // ---
    let record = state
        .repository()
        .get_user(&principal.id)
        .await
        .map_err(|e| {
            // ---
            tracing::error!("Failed to load profile: {}", e);
            ApiError::internal()
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(record))
}

/// Trim and bound a requested display name.
fn validate_display_name(raw: &str) -> Result<&str, ApiError> {
    // ---
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("display_name must not be empty"));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ApiError::bad_request(
            "display_name must be at most 255 characters",
        ));
    }
    Ok(name)
}

/// PUT /api/user/profile
///
/// # Request Body
/// ```json
/// { "display_name": "Ada" }
/// ```
#[tracing::instrument(skip(state, principal, body), fields(user_id = %principal.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    // ---
    let Json(body) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let display_name = validate_display_name(&body.display_name)?;

    let updated = state
        .repository()
        .update_display_name(&principal.id, display_name)
        .await
        .map_err(|e| {
            // ---
            tracing::error!("Failed to update profile: {}", e);
            ApiError::internal()
        })?;

    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!("Profile updated");
    Ok(Json(MessageResponse {
        message: "Profile updated successfully",
    }))
}

/// GET /api/auth/test
///
/// Echoes the verified principal; handy for checking a token end to end.
pub async fn auth_test(Extension(principal): Extension<Principal>) -> Json<AuthTestResponse> {
    // ---
    Json(AuthTestResponse {
        message: "Auth successful",
        user: principal,
    })
}
