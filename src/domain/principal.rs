use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The verified identity behind a bearer credential.
///
/// Built by an [`IdentityVerifier`](super::IdentityVerifier) and attached to the
/// request by the auth gate. Lives for one request only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    // ---
    /// Identity provider's user id (`sub` claim). Stable for one account.
    pub id: String,

    /// Absent for phone and anonymous sign-in.
    pub email: Option<String>,

    pub display_name: Option<String>,

    pub avatar_url: Option<String>,

    pub email_verified: bool,
}

/// Row of the `users` table mirrored from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    // ---
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    pub is_email_verified: bool,
}
