// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing or empty
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

/// Reads an optional string environment variable with a default.
macro_rules! optional_env {
    // ---
    ($key:literal, $default:expr) => {
        std::env::var($key).unwrap_or_else(|_| $default.to_string())
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: database::DatabaseConfig,
    pub identity: identity::IdentityConfig,
    pub upstream: upstream::UpstreamConfig,
    pub server: server::ServerConfig,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    /// This function is intended to be called exactly once at startup.
    pub fn from_env() -> Result<Self> {
        // ---
        Ok(Self {
            database: database::DatabaseConfig::from_env()?,
            identity: identity::IdentityConfig::from_env()?,
            upstream: upstream::UpstreamConfig::from_env()?,
            server: server::ServerConfig::from_env()?,
        })
    }
}

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Connection settings for the Postgres user directory.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// PostgreSQL connection string.
        pub database_url: String,

        /// Number of connection attempts at startup. Defaults to 50.
        pub retry_count: u32,

        /// Pause between connection attempts. Defaults to 200 ms.
        pub retry_delay: Duration,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 2.
        pub min_connections: u32,

        /// Maximum number of connections open concurrently. Defaults to 10.
        pub max_connections: u32,
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let database_url = required_env!("DATABASE_URL");
            let retry_count = optional_env_parse!("TRYON_DB_RETRY_COUNT", u32, 50);
            let retry_delay_ms = optional_env_parse!("TRYON_DB_RETRY_DELAY_MS", u64, 200);
            let acquire_timeout_secs = optional_env_parse!("TRYON_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("TRYON_DB_MIN_CONNECTIONS", u32, 2);
            let max_connections = optional_env_parse!("TRYON_DB_MAX_CONNECTIONS", u32, 10);

            Ok(Self {
                database_url,
                retry_count,
                retry_delay: Duration::from_millis(retry_delay_ms),
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
            })
        }
    }
}
pub use database::DatabaseConfig;

// ============================================================
// Identity provider configuration
// ============================================================

mod identity {
    // ---
    use super::*;

    /// Public JWK set used to sign Firebase ID tokens.
    pub const DEFAULT_JWKS_URL: &str =
        "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

    /// Identity provider settings used to verify bearer tokens.
    #[derive(Debug, Clone)]
    pub struct IdentityConfig {
        /// Firebase project id; the expected audience of every token.
        pub project_id: String,

        /// Where the provider publishes its signing keys.
        pub jwks_url: String,
    }

    impl IdentityConfig {
        /// Builds an [`IdentityConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if the project id is missing. Without it no
        /// token can be verified, so startup is refused.
        pub fn from_env() -> Result<Self> {
            // ---
            let project_id = required_env!("FIREBASE_PROJECT_ID");
            let jwks_url = optional_env!("TRYON_IDENTITY_JWKS_URL", DEFAULT_JWKS_URL);

            Ok(Self {
                project_id,
                jwks_url,
            })
        }

        /// Expected `iss` claim for this project.
        pub fn issuer(&self) -> String {
            // ---
            format!("https://securetoken.google.com/{}", self.project_id)
        }
    }
}
pub use identity::{IdentityConfig, DEFAULT_JWKS_URL};

// ============================================================
// Upstream image-generation API configuration
// ============================================================

mod upstream {
    // ---
    use super::*;

    pub const DEFAULT_UPSTREAM_URL: &str = "https://api.segmind.com/v1/idm-vton";

    /// Settings for the remote virtual try-on API.
    #[derive(Clone)]
    pub struct UpstreamConfig {
        /// Endpoint receiving the try-on POST.
        pub url: String,

        /// Static key sent as `x-api-key`.
        pub api_key: String,

        /// Whole-request timeout for one upstream call. Defaults to 120 seconds.
        pub timeout: Duration,
    }

    // Keeps the API key out of logs.
    impl std::fmt::Debug for UpstreamConfig {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            // ---
            f.debug_struct("UpstreamConfig")
                .field("url", &self.url)
                .field("api_key", &"<redacted>")
                .field("timeout", &self.timeout)
                .finish()
        }
    }

    impl UpstreamConfig {
        /// Builds an [`UpstreamConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if the API key is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let api_key = required_env!("SEGMIND_API_KEY");
            let url = optional_env!("TRYON_UPSTREAM_URL", DEFAULT_UPSTREAM_URL);
            let timeout_secs = optional_env_parse!("TRYON_UPSTREAM_TIMEOUT_SEC", u64, 120);

            Ok(Self {
                url,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            })
        }
    }
}
pub use upstream::{UpstreamConfig, DEFAULT_UPSTREAM_URL};

// ============================================================
// HTTP server configuration
// ============================================================

mod server {
    // ---
    use super::*;

    /// Listener, browser-facing and transport settings.
    #[derive(Debug, Clone)]
    pub struct ServerConfig {
        /// Socket the HTTP listener binds to.
        pub bind_addr: SocketAddr,

        /// Browser origins allowed by CORS.
        pub allowed_origins: Vec<String>,

        /// Largest accepted request body. Defaults to 50 MiB.
        pub body_limit: usize,

        /// `prom` enables Prometheus metrics; anything else is no-op.
        pub metrics_type: String,
    }

    impl ServerConfig {
        /// Builds a [`ServerConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if the host/port pair is not a valid socket address.
        pub fn from_env() -> Result<Self> {
            // ---
            let host = optional_env!("TRYON_BIND_HOST", "127.0.0.1");
            let port = optional_env_parse!("PORT", u16, 3001);
            let bind_addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid bind address {host}:{port}: {e}"))?;

            let allowed_origins = optional_env!("TRYON_ALLOWED_ORIGINS", "http://localhost:3000")
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();

            let body_limit = optional_env_parse!("TRYON_BODY_LIMIT_BYTES", usize, 50 * 1024 * 1024);
            let metrics_type = optional_env!("TRYON_METRICS_TYPE", "noop");

            Ok(Self {
                bind_addr,
                allowed_origins,
                body_limit,
                metrics_type,
            })
        }
    }
}
pub use server::ServerConfig;

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use anyhow::Result;
    use serial_test::serial;

    fn set_required() {
        // ---
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("FIREBASE_PROJECT_ID", "tryon-test");
        std::env::set_var("SEGMIND_API_KEY", "sk-test");
    }

    #[test]
    #[serial]
    fn missing_database_url_fails() -> Result<()> {
        // ---
        std::env::remove_var("DATABASE_URL");

        assert_missing_config!(database::DatabaseConfig::from_env(), "DATABASE_URL");

        Ok(())
    }

    #[test]
    #[serial]
    fn database_defaults_applied() -> Result<()> {
        // ---
        let db_url = "postgres://test";
        std::env::set_var("DATABASE_URL", db_url);

        std::env::remove_var("TRYON_DB_RETRY_COUNT");
        std::env::remove_var("TRYON_DB_RETRY_DELAY_MS");
        std::env::remove_var("TRYON_DB_ACQUIRE_TIMEOUT_SEC");
        std::env::remove_var("TRYON_DB_MIN_CONNECTIONS");
        std::env::remove_var("TRYON_DB_MAX_CONNECTIONS");

        let cfg = database::DatabaseConfig::from_env()?;
        assert_eq!(cfg.database_url, db_url);
        assert_eq!(cfg.retry_count, 50);
        assert_eq!(cfg.retry_delay.as_millis(), 200);
        assert_eq!(cfg.acquire_timeout.as_secs(), 30);
        assert_eq!(cfg.min_connections, 2);
        assert_eq!(cfg.max_connections, 10);

        Ok(())
    }

    #[test]
    #[serial]
    fn database_overrides_defaults() -> Result<()> {
        // ---
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("TRYON_DB_RETRY_COUNT", "3");
        std::env::set_var("TRYON_DB_ACQUIRE_TIMEOUT_SEC", "5");
        std::env::set_var("TRYON_DB_MIN_CONNECTIONS", "1");
        std::env::set_var("TRYON_DB_MAX_CONNECTIONS", "40");

        let cfg = database::DatabaseConfig::from_env()?;
        assert_eq!(cfg.retry_count, 3);
        assert_eq!(cfg.acquire_timeout.as_secs(), 5);
        assert_eq!(cfg.min_connections, 1);
        assert_eq!(cfg.max_connections, 40);

        std::env::remove_var("TRYON_DB_RETRY_COUNT");
        std::env::remove_var("TRYON_DB_ACQUIRE_TIMEOUT_SEC");
        std::env::remove_var("TRYON_DB_MIN_CONNECTIONS");
        std::env::remove_var("TRYON_DB_MAX_CONNECTIONS");

        Ok(())
    }

    #[test]
    #[serial]
    fn missing_project_id_fails() -> Result<()> {
        // ---
        std::env::remove_var("FIREBASE_PROJECT_ID");

        assert_missing_config!(identity::IdentityConfig::from_env(), "FIREBASE_PROJECT_ID");

        Ok(())
    }

    #[test]
    #[serial]
    fn blank_api_key_counts_as_missing() -> Result<()> {
        // ---
        std::env::set_var("SEGMIND_API_KEY", "   ");

        assert_missing_config!(upstream::UpstreamConfig::from_env(), "SEGMIND_API_KEY");

        std::env::remove_var("SEGMIND_API_KEY");

        Ok(())
    }

    #[test]
    #[serial]
    fn upstream_debug_redacts_api_key() -> Result<()> {
        // ---
        std::env::set_var("SEGMIND_API_KEY", "sk-very-secret");

        let cfg = upstream::UpstreamConfig::from_env()?;
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert_eq!(cfg.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(cfg.timeout.as_secs(), 120);

        Ok(())
    }

    #[test]
    #[serial]
    fn server_origins_split_on_commas() -> Result<()> {
        // ---
        std::env::set_var(
            "TRYON_ALLOWED_ORIGINS",
            "http://localhost:3000, https://tryon.example.com,",
        );
        std::env::set_var("PORT", "8088");

        let cfg = server::ServerConfig::from_env()?;
        assert_eq!(
            cfg.allowed_origins,
            vec!["http://localhost:3000", "https://tryon.example.com"]
        );
        assert_eq!(cfg.bind_addr.port(), 8088);
        assert_eq!(cfg.body_limit, 50 * 1024 * 1024);

        std::env::remove_var("TRYON_ALLOWED_ORIGINS");
        std::env::remove_var("PORT");

        Ok(())
    }

    #[test]
    #[serial]
    fn app_config_from_env_success() -> Result<()> {
        // ---
        set_required();
        std::env::remove_var("TRYON_IDENTITY_JWKS_URL");

        let cfg = AppConfig::from_env()?;
        assert_eq!(cfg.identity.jwks_url, DEFAULT_JWKS_URL);
        assert_eq!(
            cfg.identity.issuer(),
            "https://securetoken.google.com/tryon-test"
        );
        assert_eq!(cfg.server.metrics_type, "noop");

        Ok(())
    }
}
