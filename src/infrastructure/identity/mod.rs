//! Identity provider integration.
//!
//! The verifier is built once at startup and handed to the application
//! state; nothing here is global.

mod firebase;
mod keys;

use crate::config::IdentityConfig;
use crate::domain::VerifierPtr;
use std::sync::Arc;

pub use firebase::FirebaseVerifier;
pub use keys::{KeyError, KeySource};

/// Creates a verifier for Firebase ID tokens backed by the provider's
/// published JWK set.
pub fn create_firebase_verifier(config: &IdentityConfig, http: reqwest::Client) -> VerifierPtr {
    // ---
    tracing::debug!("Creating identity verifier with config:{:?}", config);

    let keys = KeySource::remote(http, config.jwks_url.clone());
    Arc::new(FirebaseVerifier::new(config, keys))
}
