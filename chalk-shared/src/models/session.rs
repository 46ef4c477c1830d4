/// Sessions
///
/// A session pairs a short-lived access token with a longer-lived refresh
/// token. Refreshing overwrites both tokens in place, so a refresh token
/// works once.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sessions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     access_token VARCHAR(128) NOT NULL UNIQUE,
///     refresh_token VARCHAR(128) NOT NULL UNIQUE,
///     access_expires_at TIMESTAMPTZ NOT NULL,
///     refresh_expires_at TIMESTAMPTZ NOT NULL,
///     issued_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use crate::error::{Entity, StoreError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

/// Freshly minted token pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_access_expired(&self, now: DateTime<Utc>) -> bool {
        self.access_expires_at <= now
    }

    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        tokens: &TokenPair,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions
                (user_id, access_token, refresh_token, access_expires_at, refresh_expires_at, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, access_token, refresh_token,
                      access_expires_at, refresh_expires_at, issued_at
            "#,
        )
        .bind(user_id)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.access_expires_at)
        .bind(tokens.refresh_expires_at)
        .bind(issued_at)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn find_by_access_token(pool: &PgPool, token: &str) -> Result<Option<Self>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, access_token, refresh_token,
                   access_expires_at, refresh_expires_at, issued_at
              FROM sessions
             WHERE access_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// Swaps in a new token pair if `refresh_token` is current and unexpired
    ///
    /// The check and the write are one statement, so of several concurrent
    /// rotations with the same token exactly one gets `Some`.
    pub async fn rotate(
        pool: &PgPool,
        refresh_token: &str,
        tokens: &TokenPair,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
               SET access_token = $1,
                   refresh_token = $2,
                   access_expires_at = $3,
                   refresh_expires_at = $4
             WHERE refresh_token = $5
               AND refresh_expires_at > $6
            RETURNING id, user_id, access_token, refresh_token,
                      access_expires_at, refresh_expires_at, issued_at
            "#,
        )
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.access_expires_at)
        .bind(tokens.refresh_expires_at)
        .bind(refresh_token)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// Ends the session owning `access_token`
    pub async fn delete_by_access_token(pool: &PgPool, access_token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE access_token = $1")
            .bind(access_token)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Session));
        }

        Ok(())
    }

    /// Purges sessions that can no longer be refreshed
    pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE refresh_expires_at <= $1")
            .bind(now)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
