/// Ordered sibling collections
///
/// Modules within a course, lessons within a module and blocks within a
/// lesson all keep a dense, unique, 1-based `order_idx` per parent. This
/// module holds the single implementation of that ordering; the entity
/// models only describe their table through [`Sibling`].
///
/// # Guarantees
///
/// - Every operation runs in one transaction. Dropping the future before it
///   completes drops the transaction, which rolls back.
/// - The parent row is locked `FOR NO KEY UPDATE` before the scope is
///   renumbered, so concurrent reorders of one scope serialize.
/// - The `(parent, order_idx)` unique constraints are `DEFERRABLE INITIALLY
///   IMMEDIATE`: they are checked at statement end, so a bulk shift never
///   collides with itself. A residual violation surfaces as
///   [`StoreError::OrderConflict`], which callers may retry.
/// - Deleting an item does not renumber its siblings. Call [`compact`] when
///   strict density is needed after deletions.
///
/// # Example
///
/// ```no_run
/// use chalk_shared::db::ordering;
/// use chalk_shared::models::module::Module;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, module_id: Uuid) -> Result<(), chalk_shared::error::StoreError> {
/// // Move a module to the front of its course
/// let placement = ordering::move_to::<Module>(&pool, module_id, 1).await?;
/// println!("moved from {} to {}", placement.from, placement.to);
/// # Ok(())
/// # }
/// ```

use crate::error::{violation, Entity, StoreError, Violation};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

/// Index of the first item in every scope
pub const ORDER_BASE: i32 = 1;

/// Describes an ordered table and the parent table that scopes it
///
/// Identifiers are interpolated into SQL, so they must be compile-time
/// constants.
pub trait Sibling {
    /// Table holding the ordered rows
    const TABLE: &'static str;

    /// Column referencing the parent
    const PARENT_COLUMN: &'static str;

    /// Table the parent column references
    const PARENT_TABLE: &'static str;

    /// Unique constraint over `(PARENT_COLUMN, order_idx)`
    const ORDER_CONSTRAINT: &'static str;

    /// Foreign key constraint over `PARENT_COLUMN`
    const PARENT_CONSTRAINT: &'static str;

    /// Reported when an item is missing
    const ENTITY: Entity;

    /// Reported when the parent is missing
    const PARENT_ENTITY: Entity;
}

/// Where a newly inserted item lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPlan {
    /// After the current last item
    Append { index: i32 },

    /// At `index`, pushing items at or after it down by one
    Shift { index: i32 },
}

impl InsertPlan {
    /// The index the new item receives
    pub fn index(&self) -> i32 {
        match *self {
            InsertPlan::Append { index } | InsertPlan::Shift { index } => index,
        }
    }
}

/// How a move renumbers the scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlan {
    /// Target equals the current position
    Stay,

    /// Towards the end: items in `(from, to]` move up by one
    Forward { from: i32, to: i32 },

    /// Towards the front: items in `[to, from)` move down by one
    Backward { from: i32, to: i32 },
}

impl MovePlan {
    /// Final index of the moved item given its current index
    pub fn target(&self, current: i32) -> i32 {
        match *self {
            MovePlan::Stay => current,
            MovePlan::Forward { to, .. } | MovePlan::Backward { to, .. } => to,
        }
    }
}

/// Result of a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// Scope the item lives in
    pub parent_id: Uuid,

    /// Index before the move
    pub from: i32,

    /// Index after the move
    pub to: i32,
}

/// Computes where an inserted item goes
///
/// A missing request, or one past the current maximum, appends. Anything
/// else is clamped to [`ORDER_BASE`] and shifts the tail.
pub fn plan_insert(max_index: i32, requested: Option<i32>) -> InsertPlan {
    match requested {
        Some(index) if index <= max_index => InsertPlan::Shift {
            index: index.max(ORDER_BASE),
        },
        _ => InsertPlan::Append {
            index: max_index + 1,
        },
    }
}

/// Computes how moving an item from `current` renumbers its scope
///
/// The request is clamped into `[ORDER_BASE, max_index]`.
pub fn plan_move(current: i32, max_index: i32, requested: i32) -> MovePlan {
    let target = requested.clamp(ORDER_BASE, max_index.max(ORDER_BASE));

    if target == current {
        MovePlan::Stay
    } else if current < target {
        MovePlan::Forward {
            from: current,
            to: target,
        }
    } else {
        MovePlan::Backward {
            from: current,
            to: target,
        }
    }
}

/// Maps ordering-related constraint violations for `S`
pub(crate) fn translate<S: Sibling>(err: sqlx::Error) -> StoreError {
    let mapped = match violation(&err) {
        Some(Violation::Unique(Some(name))) if name == S::ORDER_CONSTRAINT => {
            Some(StoreError::OrderConflict)
        }
        Some(Violation::ForeignKey(Some(name))) if name == S::PARENT_CONSTRAINT => {
            Some(StoreError::NotFound(S::PARENT_ENTITY))
        }
        _ => None,
    };

    mapped.unwrap_or_else(|| StoreError::Database(err))
}

/// Fails with the parent's not-found error unless the parent exists
pub async fn ensure_parent<S: Sibling>(pool: &PgPool, parent_id: Uuid) -> Result<(), StoreError> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        S::PARENT_TABLE
    );
    let exists: bool = sqlx::query_scalar(&sql)
        .bind(parent_id)
        .fetch_one(pool)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(StoreError::NotFound(S::PARENT_ENTITY))
    }
}

/// Locks the parent row for the rest of the transaction
async fn lock_parent<S: Sibling>(conn: &mut PgConnection, parent_id: Uuid) -> Result<(), StoreError> {
    let sql = format!(
        "SELECT id FROM {} WHERE id = $1 FOR NO KEY UPDATE",
        S::PARENT_TABLE
    );
    let locked: Option<Uuid> = sqlx::query_scalar(&sql)
        .bind(parent_id)
        .fetch_optional(&mut *conn)
        .await?;

    locked
        .map(|_| ())
        .ok_or(StoreError::NotFound(S::PARENT_ENTITY))
}

/// Current maximum index in a scope, 0 when empty
pub async fn max_index<S: Sibling>(conn: &mut PgConnection, parent_id: Uuid) -> Result<i32, StoreError> {
    let sql = format!(
        "SELECT COALESCE(MAX(order_idx), 0) FROM {} WHERE {} = $1",
        S::TABLE,
        S::PARENT_COLUMN
    );
    let max: i32 = sqlx::query_scalar(&sql)
        .bind(parent_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(max)
}

/// Reserves an index for a new item inside the caller's transaction
///
/// Locks the parent, shifts the tail when inserting in the middle and
/// returns the index the caller must insert its row with. The caller owns
/// the transaction; an error leaves it for the caller to roll back.
pub async fn reserve_slot<S: Sibling>(
    conn: &mut PgConnection,
    parent_id: Uuid,
    requested: Option<i32>,
) -> Result<i32, StoreError> {
    lock_parent::<S>(conn, parent_id).await?;

    let max = max_index::<S>(conn, parent_id).await?;
    let plan = plan_insert(max, requested);

    if let InsertPlan::Shift { index } = plan {
        let sql = format!(
            "UPDATE {} SET order_idx = order_idx + 1 WHERE {} = $1 AND order_idx >= $2",
            S::TABLE,
            S::PARENT_COLUMN
        );
        let shifted = sqlx::query(&sql)
            .bind(parent_id)
            .bind(index)
            .execute(&mut *conn)
            .await
            .map_err(translate::<S>)?;

        debug!(
            table = S::TABLE,
            %parent_id,
            index,
            shifted = shifted.rows_affected(),
            "Opened slot"
        );
    }

    Ok(plan.index())
}

/// Moves an item to `requested` within its scope
///
/// The request is clamped to the scope. Moving to the current index is a
/// successful no-op. Items between the old and new position shift by one
/// toward the vacated slot in a single statement.
///
/// # Errors
///
/// - [`StoreError::NotFound`] with `S::ENTITY` if the item does not exist
/// - [`StoreError::OrderConflict`] if a concurrent reorder collided
pub async fn move_to<S: Sibling>(
    pool: &PgPool,
    item_id: Uuid,
    requested: i32,
) -> Result<Placement, StoreError> {
    let mut tx = pool.begin().await?;

    let parent_sql = format!("SELECT {} FROM {} WHERE id = $1", S::PARENT_COLUMN, S::TABLE);
    let parent_id: Uuid = sqlx::query_scalar(&parent_sql)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(S::ENTITY))?;

    lock_parent::<S>(&mut tx, parent_id).await?;

    // Re-read under the lock; a concurrent move may have run in between
    let index_sql = format!("SELECT order_idx FROM {} WHERE id = $1 FOR UPDATE", S::TABLE);
    let current: i32 = sqlx::query_scalar(&index_sql)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(S::ENTITY))?;

    let max = max_index::<S>(&mut tx, parent_id).await?;
    let plan = plan_move(current, max, requested);

    if plan != MovePlan::Stay {
        let target = plan.target(current);
        let sql = format!(
            r#"
            UPDATE {table}
               SET order_idx = CASE
                   WHEN id = $1 THEN $3
                   WHEN $2 < $3 THEN order_idx - 1
                   ELSE order_idx + 1
               END
             WHERE {parent} = $4
               AND order_idx BETWEEN LEAST($2, $3) AND GREATEST($2, $3)
            "#,
            table = S::TABLE,
            parent = S::PARENT_COLUMN
        );
        sqlx::query(&sql)
            .bind(item_id)
            .bind(current)
            .bind(target)
            .bind(parent_id)
            .execute(&mut *tx)
            .await
            .map_err(translate::<S>)?;
    }

    tx.commit().await?;

    let placement = Placement {
        parent_id,
        from: current,
        to: plan.target(current),
    };
    debug!(table = S::TABLE, %item_id, from = placement.from, to = placement.to, "Moved item");

    Ok(placement)
}

/// Deletes an item without renumbering its siblings
pub async fn remove<S: Sibling>(pool: &PgPool, item_id: Uuid) -> Result<(), StoreError> {
    let sql = format!("DELETE FROM {} WHERE id = $1", S::TABLE);
    let result = sqlx::query(&sql).bind(item_id).execute(pool).await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(S::ENTITY));
    }

    Ok(())
}

/// Deletes an item and renumbers its remaining siblings in one transaction
///
/// Only the base row's parent column is read, so items whose payload is
/// damaged can still be removed. Returns the number of siblings whose
/// index changed.
pub async fn remove_and_compact<S: Sibling>(pool: &PgPool, item_id: Uuid) -> Result<u64, StoreError> {
    let mut tx = pool.begin().await?;

    let parent_sql = format!("SELECT {} FROM {} WHERE id = $1", S::PARENT_COLUMN, S::TABLE);
    let parent_id: Uuid = sqlx::query_scalar(&parent_sql)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(S::ENTITY))?;

    lock_parent::<S>(&mut tx, parent_id).await?;

    let delete_sql = format!("DELETE FROM {} WHERE id = $1", S::TABLE);
    let deleted = sqlx::query(&delete_sql).bind(item_id).execute(&mut *tx).await?;
    if deleted.rows_affected() == 0 {
        return Err(StoreError::NotFound(S::ENTITY));
    }

    let renumbered = renumber::<S>(&mut tx, parent_id).await?;
    tx.commit().await?;

    debug!(table = S::TABLE, %item_id, %parent_id, renumbered, "Removed item and compacted scope");
    Ok(renumbered)
}

/// Renumbers a scope to `ORDER_BASE..` keeping the relative order
///
/// Returns the number of items whose index changed.
pub async fn compact<S: Sibling>(pool: &PgPool, parent_id: Uuid) -> Result<u64, StoreError> {
    let mut tx = pool.begin().await?;

    lock_parent::<S>(&mut tx, parent_id).await?;
    let renumbered = renumber::<S>(&mut tx, parent_id).await?;

    tx.commit().await?;

    debug!(table = S::TABLE, %parent_id, renumbered, "Compacted scope");
    Ok(renumbered)
}

/// Closes gaps in a scope whose parent the caller has locked
async fn renumber<S: Sibling>(conn: &mut PgConnection, parent_id: Uuid) -> Result<u64, StoreError> {
    let sql = format!(
        r#"
        UPDATE {table} AS item
           SET order_idx = ranked.position
          FROM (
                SELECT id, (ROW_NUMBER() OVER (ORDER BY order_idx) + $2 - 1)::int AS position
                  FROM {table}
                 WHERE {parent} = $1
               ) AS ranked
         WHERE item.id = ranked.id
           AND item.order_idx <> ranked.position
        "#,
        table = S::TABLE,
        parent = S::PARENT_COLUMN
    );
    let result = sqlx::query(&sql)
        .bind(parent_id)
        .bind(ORDER_BASE)
        .execute(&mut *conn)
        .await
        .map_err(translate::<S>)?;

    Ok(result.rows_affected())
}
