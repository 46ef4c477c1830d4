/// Course model and database operations
///
/// A course belongs to an account and owns an ordered list of modules.
/// Deleting a course cascades to its modules, lessons, blocks and
/// enrollments.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE courses (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use crate::error::{violation, Entity, StoreError, Violation};
use crate::models::lesson::Lesson;
use crate::models::module::Module;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

const ACCOUNT_FKEY: &str = "courses_account_id_fkey";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Course {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A course with its ordered modules and each module's ordered lessons
#[derive(Debug, Clone, Serialize)]
pub struct Outline {
    pub course: Course,
    pub modules: Vec<ModuleOutline>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleOutline {
    #[serde(flatten)]
    pub module: Module,
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Creates a course in an account
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::Account`] if the account does not exist
    pub async fn create(pool: &PgPool, account_id: Uuid, name: &str) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (account_id, name)
            VALUES ($1, $2)
            RETURNING id, account_id, name, created_at
            "#,
        )
        .bind(account_id)
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::ForeignKey(Some(ACCOUNT_FKEY))) => StoreError::NotFound(Entity::Account),
            _ => StoreError::Database(e),
        })
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, account_id, name, created_at FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(course)
    }

    /// Like [`Course::find_by_id`] but a missing course is an error
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Self, StoreError> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Course))
    }

    /// Courses of an account, oldest first
    ///
    /// A missing account is reported as not found rather than an empty list.
    pub async fn list_by_account(pool: &PgPool, account_id: Uuid) -> Result<Vec<Self>, StoreError> {
        let account_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
                .bind(account_id)
                .fetch_one(pool)
                .await?;
        if !account_exists {
            return Err(StoreError::NotFound(Entity::Account));
        }

        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, account_id, name, created_at
              FROM courses
             WHERE account_id = $1
             ORDER BY created_at, id
            "#,
        )
        .bind(account_id)
        .fetch_all(pool)
        .await?;

        Ok(courses)
    }

    pub async fn rename(pool: &PgPool, id: Uuid, name: &str) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Course>(
            r#"
            UPDATE courses SET name = $1
             WHERE id = $2
            RETURNING id, account_id, name, created_at
            "#,
        )
        .bind(name)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound(Entity::Course))
    }

    /// Deletes a course and, by cascade, everything under it
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Course));
        }

        Ok(())
    }

    /// Loads the course tree down to lessons
    ///
    /// Reads run in one repeatable-read transaction so modules and lessons
    /// come from the same snapshot.
    pub async fn outline(pool: &PgPool, id: Uuid) -> Result<Outline, StoreError> {
        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let course = sqlx::query_as::<_, Course>(
            "SELECT id, account_id, name, created_at FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(Entity::Course))?;

        let modules = sqlx::query_as::<_, Module>(
            r#"
            SELECT id, course_id, name, order_idx
              FROM modules
             WHERE course_id = $1
             ORDER BY order_idx
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let lessons = sqlx::query_as::<_, Lesson>(
            r#"
            SELECT l.id, l.module_id, l.name, l.order_idx
              FROM lessons l
              JOIN modules m ON m.id = l.module_id
             WHERE m.course_id = $1
             ORDER BY l.module_id, l.order_idx
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(assemble_outline(course, modules, lessons))
    }
}

/// Attaches lessons to their modules, keeping both orderings
fn assemble_outline(course: Course, modules: Vec<Module>, lessons: Vec<Lesson>) -> Outline {
    let mut by_module: HashMap<Uuid, Vec<Lesson>> = HashMap::new();
    for lesson in lessons {
        by_module.entry(lesson.module_id).or_default().push(lesson);
    }

    let modules = modules
        .into_iter()
        .map(|module| {
            let mut lessons = by_module.remove(&module.id).unwrap_or_default();
            lessons.sort_by_key(|l| l.order_idx);
            ModuleOutline { module, lessons }
        })
        .collect();

    Outline { course, modules }
}
