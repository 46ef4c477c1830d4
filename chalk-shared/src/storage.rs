/// Opaque object storage
///
/// Uploaded file bytes live outside the database, addressed by a key the
/// file store generates. Anything that can put, get and remove bytes by
/// key can back it; [`FsObjectStore`] keeps objects in a local directory.
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use chalk_shared::storage::{FsObjectStore, ObjectStore};
///
/// # async fn example() -> Result<(), chalk_shared::storage::StorageError> {
/// let store = FsObjectStore::new("./data/objects");
/// store.put("0b6d3f4c", "video/mp4", Bytes::from_static(b"...")).await?;
/// let bytes = store.get("0b6d3f4c").await?;
/// store.remove("0b6d3f4c").await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-addressed blob storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key`, replacing any previous object
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> Result<(), StorageError>;

    /// Reads the object stored under `key`
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Deletes the object under `key`; missing objects are not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Objects as files in a single directory
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).await?;

        // Readers never observe a partially written object
        let partial = path.with_extension("partial");
        fs::write(&partial, &data).await?;
        fs::rename(&partial, &path).await?;

        debug!(key, content_type, size = data.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.path_for(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
