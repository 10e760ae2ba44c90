//! Application state management.
//!
//! This module defines the shared state structure that gets passed to all
//! Axum handlers and middleware via the `State` extractor. The `AppState`
//! holds the metrics backend, the user directory, the identity verifier and
//! the try-on gateway.
//!
//! Every field is an `Arc`, so cloning the state per request is cheap.

use crate::domain::{MetricsPtr, TryOnGatewayPtr, UserRepositoryPtr, VerifierPtr};

/// Shared application state passed to all Axum handlers.
///
/// This struct serves as the Dependency Injection container for the application.
/// Handlers depend on the domain traits only, never on the Postgres, Firebase
/// or upstream implementations behind them.
///
/// # Lifecycle
///
/// 1. Built once in `create_app()` during startup (or by a test harness)
/// 2. Attached to the Axum router via `.with_state(app_state)`
/// 3. Cloned automatically by Axum for each incoming HTTP request
/// 4. Handlers extract via `State(state): State<AppState>`
#[derive(Clone)]
pub struct AppState {
    /// Metrics implementation for recording application events.
    ///
    /// Either Prometheus-backed (production) or no-op (testing/development).
    metrics: MetricsPtr,

    /// User directory mirrored from verified identities.
    repository: UserRepositoryPtr,

    /// Verifies bearer tokens on every protected request.
    verifier: VerifierPtr,

    /// Remote image generation.
    try_on: TryOnGatewayPtr,
}

impl AppState {
    // ---

    pub fn new(
        metrics: MetricsPtr,
        repository: UserRepositoryPtr,
        verifier: VerifierPtr,
        try_on: TryOnGatewayPtr,
    ) -> Self {
        // ---
        AppState {
            metrics,
            repository,
            verifier,
            try_on,
        }
    }

    /// Get a reference to the metrics implementation.
    pub(crate) fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the user directory.
    pub(crate) fn repository(&self) -> &UserRepositoryPtr {
        // ---
        &self.repository
    }

    /// Get a reference to the identity verifier.
    pub(crate) fn verifier(&self) -> &VerifierPtr {
        // ---
        &self.verifier
    }

    /// Get a reference to the try-on gateway.
    pub(crate) fn try_on(&self) -> &TryOnGatewayPtr {
        // ---
        &self.try_on
    }
}
