//! Authentication gate for the protected API routes.
//!
//! Every request is verified from scratch; nothing is cached between calls.
//! After verification the principal is mirrored into the user directory. A
//! failed mirror is logged and counted but never blocks the request.

use crate::app_state::AppState;
use crate::domain::AuthError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Extracts the raw token from an `Authorization: Bearer <token>` header.
///
/// # Errors
///
/// Returns `Unauthenticated` if:
/// - Authorization header is missing or not valid UTF-8
/// - Header format is invalid (not "Bearer <token>")
/// - The token after the prefix is empty
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    // ---
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .ok_or(AuthError::Unauthenticated)?;

    if token.is_empty() {
        return Err(AuthError::Unauthenticated);
    }

    Ok(token)
}

/// Middleware guarding the protected router.
///
/// Verifies the bearer token, upserts the principal, then attaches it to the
/// request extensions so handlers can take `Extension<Principal>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // ---
    let token = bearer_token(request.headers())?;

    let principal = state.verifier().verify(token).await.map_err(|err| {
        // ---
        match &err {
            AuthError::ServiceUnavailable(detail) => {
                tracing::error!("Identity keys unavailable: {}", detail)
            }
            _ => tracing::debug!("Rejected credential: {}", err),
        }
        err
    })?;

    if let Err(err) = state.repository().upsert_user(&principal).await {
        tracing::warn!(user_id = %principal.id, "User directory sync failed: {}", err);
        state.metrics().record_directory_sync_failure();
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
