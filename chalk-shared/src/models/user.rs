/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(320) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT users_email_key UNIQUE (email)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use chalk_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), chalk_shared::error::StoreError> {
/// let user = User::create(&pool, CreateUser {
///     name: "Ada".to_string(),
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ada@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use crate::error::{violation, Entity, StoreError, Violation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

const EMAIL_CONSTRAINT: &str = "users_email_key";

/// A registered user
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

/// Input for [`User::create`]
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,

    /// Already normalised (trimmed, lower-cased)
    pub email: String,

    /// Argon2id hash, never the plaintext password
    pub password_hash: String,
}

impl User {
    /// Inserts a user
    ///
    /// # Errors
    ///
    /// - [`StoreError::EmailTaken`] if the email is registered
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(data.name)
        .bind(data.email)
        .bind(data.password_hash)
        .fetch_one(pool)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique(Some(EMAIL_CONSTRAINT))) => StoreError::EmailTaken,
            _ => StoreError::Database(e),
        })
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Looks a user up by exact (normalised) email
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Like [`User::find_by_id`] but a missing user is an error
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Self, StoreError> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound(Entity::User))
    }
}
