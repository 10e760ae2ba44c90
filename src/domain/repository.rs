use super::principal::{Principal, UserRecord};
use std::sync::Arc;
use thiserror::Error;

/// Failure talking to the user directory datastore.
#[derive(Debug, Error)]
pub enum PersistenceError {
    // ---
    /// Datastore unreachable, pool exhausted, or query failed.
    #[error("datastore error: {0}")]
    Datastore(String),

    /// A uniqueness or other integrity constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        // ---
        match &err {
            sqlx::Error::Database(db_err) if db_err.constraint().is_some() => {
                PersistenceError::Constraint(db_err.message().to_string())
            }
            _ => PersistenceError::Datastore(err.to_string()),
        }
    }
}

/// Summary returned by the database status endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseStatus {
    // ---
    pub version: String,
    pub users: i64,
}

/// Abstraction for the relational user directory.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    // ---
    /// Insert the principal on first sight, otherwise refresh the mirrored
    /// profile fields and bump `last_login`. Idempotent.
    async fn upsert_user(&self, principal: &Principal) -> Result<(), PersistenceError>;

    /// Get a user record by identity provider id.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, PersistenceError>;

    /// Set the display name. Returns `false` when no such user exists.
    async fn update_display_name(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<bool, PersistenceError>;

    /// Round-trip to the datastore.
    async fn ping(&self) -> Result<(), PersistenceError>;

    /// Server version and row count, for the status endpoint.
    async fn status(&self) -> Result<DatabaseStatus, PersistenceError>;
}

/// Type alias for any backend that implements UserRepository.
pub type UserRepositoryPtr = Arc<dyn UserRepository>;
