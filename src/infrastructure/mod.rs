mod database;
mod identity;
pub mod metrics;
mod try_on;

// Re-export the factory functions for easy access
pub use database::{create_postgres_repository, init_database_with_retry};
pub use identity::{create_firebase_verifier, FirebaseVerifier, KeyError, KeySource};
pub use metrics::{create_noop_metrics, create_prom_metrics};
pub use try_on::create_segmind_gateway;
