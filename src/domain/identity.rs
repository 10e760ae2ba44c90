use super::principal::Principal;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;

/// Why a request could not be authenticated.
#[derive(Debug, Error)]
pub enum AuthError {
    // ---
    /// No `Authorization: Bearer <token>` header on the request.
    #[error("no token provided")]
    Unauthenticated,

    /// The token failed verification (signature, expiry, audience, issuer...).
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The verifier cannot reach or parse the identity provider's keys.
    #[error("identity service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = match self {
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "No token provided"),
            AuthError::InvalidCredential(_) => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::ServiceUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication service unavailable",
            ),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Verifies bearer credentials issued by the identity provider.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    // ---
    /// Verify a raw token (without the `Bearer ` prefix).
    ///
    /// Never returns a principal for a token that failed any check.
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Type alias for any backend that implements IdentityVerifier.
pub type VerifierPtr = Arc<dyn IdentityVerifier>;
