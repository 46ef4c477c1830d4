/// Course modules
///
/// Modules are ordered within their course through [`crate::db::ordering`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE modules (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     course_id UUID NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     order_idx INTEGER NOT NULL CHECK (order_idx >= 1),
///     UNIQUE (course_id, order_idx) DEFERRABLE INITIALLY IMMEDIATE
/// );
/// ```

use crate::db::ordering::{self, Placement, Sibling};
use crate::error::{Entity, StoreError};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub order_idx: i32,
}

impl Sibling for Module {
    const TABLE: &'static str = "modules";
    const PARENT_COLUMN: &'static str = "course_id";
    const PARENT_TABLE: &'static str = "courses";
    const ORDER_CONSTRAINT: &'static str = "modules_course_id_order_idx_key";
    const PARENT_CONSTRAINT: &'static str = "modules_course_id_fkey";
    const ENTITY: Entity = Entity::Module;
    const PARENT_ENTITY: Entity = Entity::Course;
}

impl Module {
    /// Inserts a module at `order_idx`, or appends it when `None`
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::Course`] if the course does not exist
    /// - [`StoreError::OrderConflict`] on a concurrent reorder collision
    pub async fn create(
        pool: &PgPool,
        course_id: Uuid,
        name: &str,
        order_idx: Option<i32>,
    ) -> Result<Self, StoreError> {
        let mut tx = pool.begin().await?;

        let index = ordering::reserve_slot::<Self>(&mut tx, course_id, order_idx).await?;

        let module = sqlx::query_as::<_, Module>(
            r#"
            INSERT INTO modules (course_id, name, order_idx)
            VALUES ($1, $2, $3)
            RETURNING id, course_id, name, order_idx
            "#,
        )
        .bind(course_id)
        .bind(name)
        .bind(index)
        .fetch_one(&mut *tx)
        .await
        .map_err(ordering::translate::<Self>)?;

        tx.commit().await?;

        info!(module_id = %module.id, %course_id, order_idx = index, "Module created");
        Ok(module)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let module = sqlx::query_as::<_, Module>(
            "SELECT id, course_id, name, order_idx FROM modules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(module)
    }

    /// Modules of a course in order
    pub async fn list_by_course(pool: &PgPool, course_id: Uuid) -> Result<Vec<Self>, StoreError> {
        ordering::ensure_parent::<Self>(pool, course_id).await?;

        let modules = sqlx::query_as::<_, Module>(
            r#"
            SELECT id, course_id, name, order_idx
              FROM modules
             WHERE course_id = $1
             ORDER BY order_idx
            "#,
        )
        .bind(course_id)
        .fetch_all(pool)
        .await?;

        Ok(modules)
    }

    pub async fn rename(pool: &PgPool, id: Uuid, name: &str) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Module>(
            r#"
            UPDATE modules SET name = $1
             WHERE id = $2
            RETURNING id, course_id, name, order_idx
            "#,
        )
        .bind(name)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound(Entity::Module))
    }

    /// Repositions a module within its course
    pub async fn move_to(pool: &PgPool, id: Uuid, order_idx: i32) -> Result<Placement, StoreError> {
        ordering::move_to::<Self>(pool, id, order_idx).await
    }

    /// Deletes a module and its lessons; siblings keep their indices
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
        ordering::remove::<Self>(pool, id).await
    }

    /// Deletes and renumbers the remaining siblings in the same transaction
    pub async fn delete_compacted(pool: &PgPool, id: Uuid) -> Result<u64, StoreError> {
        ordering::remove_and_compact::<Self>(pool, id).await
    }

    /// Closes gaps left by deletions in a course
    pub async fn compact(pool: &PgPool, course_id: Uuid) -> Result<u64, StoreError> {
        ordering::compact::<Self>(pool, course_id).await
    }
}
