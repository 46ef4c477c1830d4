/// Lessons, ordered within their module
///
/// # Schema
///
/// ```sql
/// CREATE TABLE lessons (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     module_id UUID NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     order_idx INTEGER NOT NULL CHECK (order_idx >= 1),
///     UNIQUE (module_id, order_idx) DEFERRABLE INITIALLY IMMEDIATE
/// );
/// ```

use crate::db::ordering::{self, Placement, Sibling};
use crate::error::{Entity, StoreError};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub name: String,
    pub order_idx: i32,
}

impl Sibling for Lesson {
    const TABLE: &'static str = "lessons";
    const PARENT_COLUMN: &'static str = "module_id";
    const PARENT_TABLE: &'static str = "modules";
    const ORDER_CONSTRAINT: &'static str = "lessons_module_id_order_idx_key";
    const PARENT_CONSTRAINT: &'static str = "lessons_module_id_fkey";
    const ENTITY: Entity = Entity::Lesson;
    const PARENT_ENTITY: Entity = Entity::Module;
}

impl Lesson {
    /// Inserts a lesson at `order_idx`, or appends it when `None`
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::Module`] if the module does not exist
    pub async fn create(
        pool: &PgPool,
        module_id: Uuid,
        name: &str,
        order_idx: Option<i32>,
    ) -> Result<Self, StoreError> {
        let mut tx = pool.begin().await?;

        let index = ordering::reserve_slot::<Self>(&mut tx, module_id, order_idx).await?;

        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            INSERT INTO lessons (module_id, name, order_idx)
            VALUES ($1, $2, $3)
            RETURNING id, module_id, name, order_idx
            "#,
        )
        .bind(module_id)
        .bind(name)
        .bind(index)
        .fetch_one(&mut *tx)
        .await
        .map_err(ordering::translate::<Self>)?;

        tx.commit().await?;

        info!(lesson_id = %lesson.id, %module_id, order_idx = index, "Lesson created");
        Ok(lesson)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let lesson = sqlx::query_as::<_, Lesson>(
            "SELECT id, module_id, name, order_idx FROM lessons WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(lesson)
    }

    pub async fn list_by_module(pool: &PgPool, module_id: Uuid) -> Result<Vec<Self>, StoreError> {
        ordering::ensure_parent::<Self>(pool, module_id).await?;

        let lessons = sqlx::query_as::<_, Lesson>(
            r#"
            SELECT id, module_id, name, order_idx
              FROM lessons
             WHERE module_id = $1
             ORDER BY order_idx
            "#,
        )
        .bind(module_id)
        .fetch_all(pool)
        .await?;

        Ok(lessons)
    }

    pub async fn rename(pool: &PgPool, id: Uuid, name: &str) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Lesson>(
            r#"
            UPDATE lessons SET name = $1
             WHERE id = $2
            RETURNING id, module_id, name, order_idx
            "#,
        )
        .bind(name)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound(Entity::Lesson))
    }

    pub async fn move_to(pool: &PgPool, id: Uuid, order_idx: i32) -> Result<Placement, StoreError> {
        ordering::move_to::<Self>(pool, id, order_idx).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
        ordering::remove::<Self>(pool, id).await
    }

    /// Deletes and renumbers the remaining siblings in the same transaction
    pub async fn delete_compacted(pool: &PgPool, id: Uuid) -> Result<u64, StoreError> {
        ordering::remove_and_compact::<Self>(pool, id).await
    }

    pub async fn compact(pool: &PgPool, module_id: Uuid) -> Result<u64, StoreError> {
        ordering::compact::<Self>(pool, module_id).await
    }
}
