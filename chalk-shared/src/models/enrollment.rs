/// Course participants
///
/// A user can only be enrolled in a course if they are a member of the
/// account owning the course. The composite foreign key to
/// `account_members` enforces that, and removing the membership removes
/// the enrollments with it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE course_participants (
///     course_id UUID NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL,
///     account_id UUID NOT NULL,
///     enrolled_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (user_id, course_id),
///     FOREIGN KEY (account_id, user_id)
///         REFERENCES account_members(account_id, user_id) ON DELETE CASCADE
/// );
/// ```

use crate::error::{violation, Entity, StoreError, Violation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

const PKEY: &str = "course_participants_pkey";
const COURSE_FKEY: &str = "course_participants_course_id_fkey";
const MEMBER_FKEY: &str = "course_participants_member_fkey";

/// An enrolled user with their profile
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Participant {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub enrolled_at: DateTime<Utc>,
}

/// Enrollment operations, keyed by (user, course)
pub struct Enrollment;

impl Enrollment {
    /// Enrolls `user_id` in `course_id`
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::Course`] if the course does not exist
    /// - [`StoreError::UserNotInAccount`] if the user is not a member of the course's account
    /// - [`StoreError::AlreadyEnrolled`] if the user is already enrolled; the
    ///   existing enrollment is left untouched
    pub async fn enroll(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<(), StoreError> {
        // The course's account is resolved inside the statement so a missing
        // course inserts nothing instead of violating a constraint.
        let result = sqlx::query(
            r#"
            INSERT INTO course_participants (course_id, user_id, account_id)
            SELECT c.id, $1, c.account_id
              FROM courses c
             WHERE c.id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await
        .map_err(|e| {
            let mapped = match violation(&e) {
                Some(Violation::Unique(Some(PKEY))) => Some(StoreError::AlreadyEnrolled),
                Some(Violation::ForeignKey(Some(MEMBER_FKEY))) => Some(StoreError::UserNotInAccount),
                Some(Violation::ForeignKey(Some(COURSE_FKEY))) => {
                    Some(StoreError::NotFound(Entity::Course))
                }
                _ => None,
            };
            mapped.unwrap_or_else(|| StoreError::Database(e))
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Course));
        }

        info!(%user_id, %course_id, "User enrolled");
        Ok(())
    }

    /// Removes an enrollment
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotEnrolled`] if there was no enrollment
    pub async fn unenroll(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM course_participants WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotEnrolled);
        }

        info!(%user_id, %course_id, "User unenrolled");
        Ok(())
    }

    pub async fn is_enrolled(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<bool, StoreError> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM course_participants WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(pool)
        .await?;

        Ok(enrolled)
    }

    /// Participants of a course in enrollment order
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::Course`] if the course does not exist
    pub async fn participants(pool: &PgPool, course_id: Uuid) -> Result<Vec<Participant>, StoreError> {
        let course_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)")
                .bind(course_id)
                .fetch_one(pool)
                .await?;
        if !course_exists {
            return Err(StoreError::NotFound(Entity::Course));
        }

        let participants = sqlx::query_as::<_, Participant>(
            r#"
            SELECT u.id AS user_id, u.name, u.email, cp.enrolled_at
              FROM course_participants cp
              JOIN users u ON u.id = cp.user_id
             WHERE cp.course_id = $1
             ORDER BY cp.enrolled_at, u.id
            "#,
        )
        .bind(course_id)
        .fetch_all(pool)
        .await?;

        Ok(participants)
    }
}
