/// Uploaded files
///
/// Metadata lives in `files`; the bytes live in an [`ObjectStore`] under a
/// generated key. Video blocks reference files by id.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE files (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     uploader_user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     content_type VARCHAR(255) NOT NULL,
///     key VARCHAR(255) NOT NULL UNIQUE,
///     size BIGINT NOT NULL CHECK (size >= 0),
///     uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use crate::error::{violation, Entity, StoreError, Violation};
use crate::storage::{ObjectStore, StorageError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

const UPLOADER_FKEY: &str = "files_uploader_user_id_fkey";

#[derive(Error, Debug)]
pub enum FileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for FileError {
    fn from(err: sqlx::Error) -> Self {
        FileError::Store(StoreError::Database(err))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct File {
    pub id: Uuid,
    pub uploader_user_id: Uuid,
    pub name: String,
    pub content_type: String,

    /// Object store key
    #[serde(skip_serializing)]
    pub key: String,

    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Input for [`File::upload`]
#[derive(Debug, Clone)]
pub struct Upload {
    pub uploader_user_id: Uuid,
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl File {
    /// Stores the bytes, then records the metadata
    ///
    /// If the metadata insert fails the stored object is removed again; a
    /// failure to remove it is logged and the insert error is returned.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::User`] if the uploader does not exist
    /// - [`FileError::Storage`] if the object store rejects the bytes
    pub async fn upload(
        pool: &PgPool,
        objects: &dyn ObjectStore,
        upload: Upload,
    ) -> Result<Self, FileError> {
        let user_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(upload.uploader_user_id)
                .fetch_one(pool)
                .await?;
        if !user_exists {
            return Err(StoreError::NotFound(Entity::User).into());
        }

        let key = Uuid::new_v4().simple().to_string();
        let size = upload.data.len() as i64;
        objects
            .put(&key, &upload.content_type, upload.data)
            .await?;

        let inserted = sqlx::query_as::<_, File>(
            r#"
            INSERT INTO files (uploader_user_id, name, content_type, key, size)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, uploader_user_id, name, content_type, key, size, uploaded_at
            "#,
        )
        .bind(upload.uploader_user_id)
        .bind(&upload.name)
        .bind(&upload.content_type)
        .bind(&key)
        .bind(size)
        .fetch_one(pool)
        .await;

        match inserted {
            Ok(file) => {
                info!(file_id = %file.id, size, content_type = %file.content_type, "File uploaded");
                Ok(file)
            }
            Err(e) => {
                if let Err(remove_err) = objects.remove(&key).await {
                    error!(%key, error = %remove_err, "Failed to remove orphaned object");
                }

                let mapped = match violation(&e) {
                    Some(Violation::ForeignKey(Some(UPLOADER_FKEY))) => {
                        Some(StoreError::NotFound(Entity::User))
                    }
                    _ => None,
                };
                Err(mapped.unwrap_or_else(|| StoreError::Database(e)).into())
            }
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let file = sqlx::query_as::<_, File>(
            r#"
            SELECT id, uploader_user_id, name, content_type, key, size, uploaded_at
              FROM files
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(file)
    }

    /// Metadata and bytes of a file
    pub async fn download(
        pool: &PgPool,
        objects: &dyn ObjectStore,
        id: Uuid,
    ) -> Result<(Self, Bytes), FileError> {
        let file = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound(Entity::File))?;
        let data = objects.get(&file.key).await?;

        Ok((file, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_serialized() {
        let file = File {
            id: Uuid::new_v4(),
            uploader_user_id: Uuid::new_v4(),
            name: "intro.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            key: "abc".to_string(),
            size: 42,
            uploaded_at: Utc::now(),
        };

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["name"], "intro.mp4");
        assert_eq!(json["size"], 42);
        assert!(json.get("key").is_none());
    }

    #[test]
    fn test_file_error_from_sqlx() {
        let err = FileError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, FileError::Store(StoreError::Database(_))));
    }
}
