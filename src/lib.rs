// src/lib.rs
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use handlers::{
    auth_test, db_status, get_profile, health_check, metrics_handler, root_handler,
    track_http_metrics, try_on, update_profile,
};

// Public exports (visible outside this module)
pub mod domain;
pub mod storage;

// Internal-only exports (sibling access within this module)
mod app_state;
mod auth;
mod config;
mod handlers;
mod infrastructure;

pub use app_state::AppState;
pub use config::*;

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    create_firebase_verifier, // ---
    create_noop_metrics,
    create_postgres_repository,
    create_prom_metrics,
    create_segmind_gateway,
    init_database_with_retry,
    FirebaseVerifier,
    KeyError,
    KeySource,
};

/// Select the metrics backend named by `TRYON_METRICS_TYPE`.
pub fn create_metrics(metrics_type: &str) -> Result<domain::MetricsPtr> {
    // ---
    if metrics_type == "prom" {
        create_prom_metrics()
    } else {
        create_noop_metrics()
    }
}

fn cors_layer(config: &ServerConfig) -> Result<CorsLayer> {
    // ---
    let origins = config
        .allowed_origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin {o:?}")))
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
        .allow_credentials(true)
        .expose_headers([
            HeaderName::from_static(domain::REMAINING_CREDITS_HEADER),
            HeaderName::from_static(domain::RATE_LIMIT_RESET_HEADER),
            HeaderName::from_static(domain::RATE_LIMIT_REMAINING_HEADER),
        ]))
}

/// Build the HTTP router around an already assembled state.
///
/// Public routes sit at the top level; everything under `/api` except the
/// status probe passes through the auth gate first.
pub fn build_router(app_state: AppState, config: &ServerConfig) -> Result<Router> {
    // ---
    let protected = Router::new()
        .route("/auth/test", get(auth_test))
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/try-on", post(try_on))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_auth,
        ));

    let api = Router::new()
        .route("/db-status", get(db_status))
        .merge(protected);

    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            track_http_metrics,
        ))
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(cors_layer(config)?)
        .with_state(app_state);

    Ok(router)
}

/// Assemble every dependency from configuration and build the router.
///
/// Connects (and migrates) the database, wires the identity verifier and the
/// upstream client, then hands the state to [`build_router`].
pub async fn create_app(config: &AppConfig) -> Result<Router> {
    // ---
    tracing_subscriber::fmt::try_init().ok(); // Ignores if already initialized

    let metrics = create_metrics(&config.server.metrics_type)?;

    let pool = init_database_with_retry(&config.database).await?;
    let repository: domain::UserRepositoryPtr = Arc::new(create_postgres_repository(pool));

    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build identity HTTP client")?;
    let verifier = create_firebase_verifier(&config.identity, http);

    let gateway = create_segmind_gateway(&config.upstream)?;

    let app_state = AppState::new(metrics, repository, verifier, gateway);
    build_router(app_state, &config.server)
}
