/// Lesson content blocks
///
/// A block is a base row in `blocks` carrying the lesson, position and a
/// type tag, plus exactly one payload row in the table matching the tag.
/// In Rust the pair is a [`Block`] holding a [`BlockContent`] enum, so a
/// block with the wrong payload cannot be constructed.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE block_type AS ENUM ('video', 'text');
///
/// CREATE TABLE blocks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     lesson_id UUID NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
///     order_idx INTEGER NOT NULL CHECK (order_idx >= 1),
///     type block_type NOT NULL,
///     UNIQUE (lesson_id, order_idx) DEFERRABLE INITIALLY IMMEDIATE
/// );
///
/// CREATE TABLE video_blocks (
///     id UUID PRIMARY KEY REFERENCES blocks(id) ON DELETE CASCADE,
///     file_id UUID NOT NULL REFERENCES files(id)
/// );
///
/// CREATE TABLE text_blocks (
///     id UUID PRIMARY KEY REFERENCES blocks(id) ON DELETE CASCADE,
///     content TEXT NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use chalk_shared::models::block::{Block, BlockContent};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, lesson_id: Uuid) -> Result<(), chalk_shared::error::StoreError> {
/// let block = Block::create(
///     &pool,
///     lesson_id,
///     BlockContent::Text { content: "Welcome!".to_string() },
///     Some(1),
/// ).await?;
///
/// for block in Block::list_by_lesson(&pool, lesson_id).await? {
///     println!("{} {:?}", block.order_idx, block.content);
/// }
/// # Ok(())
/// # }
/// ```

use crate::db::ordering::{self, Placement, Sibling};
use crate::error::{violation, Entity, StoreError, Violation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

const VIDEO_FILE_FKEY: &str = "video_blocks_file_id_fkey";

/// Discriminator stored in `blocks.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "block_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Video,
    Text,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Video => "video",
            BlockKind::Text => "text",
        }
    }
}

/// Type-specific payload of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockContent {
    /// Plays an uploaded file
    Video { file_id: Uuid },

    /// Rich text
    Text { content: String },
}

impl BlockContent {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Video { .. } => BlockKind::Video,
            BlockContent::Text { .. } => BlockKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub order_idx: i32,

    #[serde(flatten)]
    pub content: BlockContent,
}

/// Base row left-joined with both payload tables
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlockRow {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub order_idx: i32,
    #[sqlx(rename = "type")]
    pub kind: BlockKind,
    pub file_id: Option<Uuid>,
    pub content: Option<String>,
}

impl TryFrom<BlockRow> for Block {
    type Error = StoreError;

    /// Fails with [`StoreError::Integrity`] when the payload for the tag is missing
    fn try_from(row: BlockRow) -> Result<Self, Self::Error> {
        let content = match (row.kind, row.file_id, row.content) {
            (BlockKind::Video, Some(file_id), _) => BlockContent::Video { file_id },
            (BlockKind::Text, _, Some(content)) => BlockContent::Text { content },
            (kind, _, _) => {
                error!(block_id = %row.id, kind = kind.as_str(), "Block payload missing");
                return Err(StoreError::Integrity(format!(
                    "{} block {} has no {} payload",
                    kind.as_str(),
                    row.id,
                    kind.as_str()
                )));
            }
        };

        Ok(Block {
            id: row.id,
            lesson_id: row.lesson_id,
            order_idx: row.order_idx,
            content,
        })
    }
}

impl Sibling for Block {
    const TABLE: &'static str = "blocks";
    const PARENT_COLUMN: &'static str = "lesson_id";
    const PARENT_TABLE: &'static str = "lessons";
    const ORDER_CONSTRAINT: &'static str = "blocks_lesson_id_order_idx_key";
    const PARENT_CONSTRAINT: &'static str = "blocks_lesson_id_fkey";
    const ENTITY: Entity = Entity::Block;
    const PARENT_ENTITY: Entity = Entity::Lesson;
}

const SELECT_BLOCKS: &str = r#"
    SELECT b.id, b.lesson_id, b.order_idx, b.type, v.file_id, t.content
      FROM blocks b
      LEFT JOIN video_blocks v ON v.id = b.id
      LEFT JOIN text_blocks t ON t.id = b.id
"#;

impl Block {
    /// Creates a block and its payload in one transaction
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::Lesson`] if the lesson does not exist
    /// - [`StoreError::NotFound`] with [`Entity::File`] if a video references an unknown file;
    ///   nothing is written in that case
    pub async fn create(
        pool: &PgPool,
        lesson_id: Uuid,
        content: BlockContent,
        order_idx: Option<i32>,
    ) -> Result<Self, StoreError> {
        let mut tx = pool.begin().await?;

        let index = ordering::reserve_slot::<Self>(&mut tx, lesson_id, order_idx).await?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO blocks (lesson_id, order_idx, type) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(lesson_id)
        .bind(index)
        .bind(content.kind())
        .fetch_one(&mut *tx)
        .await
        .map_err(ordering::translate::<Self>)?;

        match &content {
            BlockContent::Video { file_id } => {
                sqlx::query("INSERT INTO video_blocks (id, file_id) VALUES ($1, $2)")
                    .bind(id)
                    .bind(file_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| match violation(&e) {
                        Some(Violation::ForeignKey(Some(VIDEO_FILE_FKEY))) => {
                            StoreError::NotFound(Entity::File)
                        }
                        _ => StoreError::Database(e),
                    })?;
            }
            BlockContent::Text { content } => {
                sqlx::query("INSERT INTO text_blocks (id, content) VALUES ($1, $2)")
                    .bind(id)
                    .bind(content)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        info!(block_id = %id, %lesson_id, kind = content.kind().as_str(), order_idx = index, "Block created");
        Ok(Block {
            id,
            lesson_id,
            order_idx: index,
            content,
        })
    }

    /// Loads one block with its payload
    ///
    /// # Errors
    ///
    /// - [`StoreError::Integrity`] if the payload row is missing
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let sql = format!("{SELECT_BLOCKS} WHERE b.id = $1");
        let row = sqlx::query_as::<_, BlockRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.map(Block::try_from).transpose()
    }

    /// Blocks of a lesson in order
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::Lesson`] if the lesson does not exist
    /// - [`StoreError::Integrity`] if any block lacks its payload
    pub async fn list_by_lesson(pool: &PgPool, lesson_id: Uuid) -> Result<Vec<Self>, StoreError> {
        ordering::ensure_parent::<Self>(pool, lesson_id).await?;

        let sql = format!("{SELECT_BLOCKS} WHERE b.lesson_id = $1 ORDER BY b.order_idx");
        let rows = sqlx::query_as::<_, BlockRow>(&sql)
            .bind(lesson_id)
            .fetch_all(pool)
            .await?;

        rows.into_iter().map(Block::try_from).collect()
    }

    /// Replaces the content of a text block
    ///
    /// Blocks that are not text blocks are reported as not found.
    pub async fn update_text(pool: &PgPool, id: Uuid, content: &str) -> Result<Self, StoreError> {
        let updated: Option<(Uuid, i32)> = sqlx::query_as(
            r#"
            UPDATE text_blocks t
               SET content = $2
              FROM blocks b
             WHERE t.id = b.id
               AND b.id = $1
            RETURNING b.lesson_id, b.order_idx
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(pool)
        .await?;

        let (lesson_id, order_idx) = updated.ok_or(StoreError::NotFound(Entity::Block))?;

        Ok(Block {
            id,
            lesson_id,
            order_idx,
            content: BlockContent::Text {
                content: content.to_string(),
            },
        })
    }

    pub async fn move_to(pool: &PgPool, id: Uuid, order_idx: i32) -> Result<Placement, StoreError> {
        ordering::move_to::<Self>(pool, id, order_idx).await
    }

    /// Deletes a block and its payload; siblings keep their indices
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
        ordering::remove::<Self>(pool, id).await
    }

    /// Deletes and renumbers the remaining siblings in the same transaction
    pub async fn delete_compacted(pool: &PgPool, id: Uuid) -> Result<u64, StoreError> {
        ordering::remove_and_compact::<Self>(pool, id).await
    }

    pub async fn compact(pool: &PgPool, lesson_id: Uuid) -> Result<u64, StoreError> {
        ordering::compact::<Self>(pool, lesson_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: BlockKind, file_id: Option<Uuid>, content: Option<&str>) -> BlockRow {
        BlockRow {
            id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            order_idx: 3,
            kind,
            file_id,
            content: content.map(str::to_string),
        }
    }

    #[test]
    fn test_video_row_converts() {
        let file_id = Uuid::new_v4();
        let block = Block::try_from(row(BlockKind::Video, Some(file_id), None)).unwrap();

        assert_eq!(block.order_idx, 3);
        assert_eq!(block.content, BlockContent::Video { file_id });
    }

    #[test]
    fn test_text_row_converts() {
        let block = Block::try_from(row(BlockKind::Text, None, Some("hello"))).unwrap();
        assert_eq!(
            block.content,
            BlockContent::Text {
                content: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_missing_payload_is_integrity_error() {
        let video = Block::try_from(row(BlockKind::Video, None, None));
        assert!(matches!(video, Err(StoreError::Integrity(_))));

        // A payload from the other table does not count
        let text = Block::try_from(row(BlockKind::Text, Some(Uuid::new_v4()), None));
        assert!(matches!(text, Err(StoreError::Integrity(_))));
        assert!(!text.unwrap_err().is_not_found());
    }

    #[test]
    fn test_block_serializes_with_type_tag() {
        let block = Block {
            id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            order_idx: 1,
            content: BlockContent::Text {
                content: "hi".to_string(),
            },
        };

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["order_idx"], 1);
    }

    #[test]
    fn test_content_deserializes_from_tag() {
        let content: BlockContent =
            serde_json::from_str(r#"{"type": "text", "content": "x"}"#).unwrap();
        assert_eq!(content.kind(), BlockKind::Text);
        assert!(serde_json::from_str::<BlockContent>(r#"{"type": "quiz"}"#).is_err());
    }
}
