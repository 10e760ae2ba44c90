use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{DatabaseStatus, PersistenceError, Principal, UserRecord, UserRepository};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    created_at: DateTime<Utc>,
    last_login: DateTime<Utc>,
    is_email_verified: bool,
}

impl From<UserRow> for UserRecord {
    fn from(r: UserRow) -> Self {
        // ---
        UserRecord {
            id: r.id,
            email: r.email,
            display_name: r.display_name,
            photo_url: r.photo_url,
            created_at: r.created_at,
            last_login: r.last_login,
            is_email_verified: r.is_email_verified,
        }
    }
}

pub fn create_postgres_repository(pool: PgPool) -> impl UserRepository {
    // ---
    PostgresRepository::new(pool)
}

pub struct PostgresRepository {
    // ---
    pool: PgPool,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for PostgresRepository {
    // ---
    async fn upsert_user(&self, principal: &Principal) -> Result<(), PersistenceError> {
        // ---
        // Single statement, so concurrent logins for one id always converge on one row.
        sqlx::query(
            "INSERT INTO users (id, email, display_name, photo_url, is_email_verified)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                 email = EXCLUDED.email,
                 display_name = EXCLUDED.display_name,
                 photo_url = EXCLUDED.photo_url,
                 is_email_verified = EXCLUDED.is_email_verified,
                 last_login = GREATEST(users.last_login, NOW())",
        )
        .bind(&principal.id)
        .bind(&principal.email)
        .bind(&principal.display_name)
        .bind(&principal.avatar_url)
        .bind(principal.email_verified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, PersistenceError> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, display_name, photo_url, created_at, last_login, is_email_verified
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn update_display_name(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<bool, PersistenceError> {
        // ---
        let result = sqlx::query("UPDATE users SET display_name = $1 WHERE id = $2")
            .bind(display_name)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        // ---
        sqlx::query("SELECT 1").execute(&self.pool).await?;

        Ok(())
    }

    async fn status(&self) -> Result<DatabaseStatus, PersistenceError> {
        // ---
        let version: String = sqlx::query_scalar("SELECT version()")
            .fetch_one(&self.pool)
            .await?;

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStatus { version, users })
    }
}
