/// Short-lived verification code storage
///
/// Codes are stored as JSON `{"email": .., "code": ..}` under
/// `authcode:<code_id>` and expire on their own. Nothing here is durable.
///
/// [`RedisCodeStore`] is the production store. [`MemoryCodeStore`] keeps
/// codes in process and serves development setups and tests.

use crate::redis::client::{RedisClient, RedisClientError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Key prefix for stored codes
pub const KEY_PREFIX: &str = "authcode";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCode {
    /// Normalised address the code was sent to
    pub email: String,

    /// Six decimal digits
    pub code: String,
}

#[derive(Error, Debug)]
pub enum CodeStoreError {
    #[error(transparent)]
    Redis(#[from] RedisClientError),

    #[error("malformed stored code: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// TTL key-value store for verification codes
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Stores `code` under `code_id` for `ttl`
    async fn set(&self, code_id: &str, code: &VerificationCode, ttl: Duration) -> Result<(), CodeStoreError>;

    /// The code under `code_id`, `None` once expired or deleted
    async fn get(&self, code_id: &str) -> Result<Option<VerificationCode>, CodeStoreError>;

    /// Deletes `code_id`; `true` if something was removed
    async fn delete(&self, code_id: &str) -> Result<bool, CodeStoreError>;
}

fn key(code_id: &str) -> String {
    format!("{KEY_PREFIX}:{code_id}")
}

/// Codes in Redis, expired by `SET .. EX`
#[derive(Clone)]
pub struct RedisCodeStore {
    client: RedisClient,
}

impl RedisCodeStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CodeStore for RedisCodeStore {
    async fn set(&self, code_id: &str, code: &VerificationCode, ttl: Duration) -> Result<(), CodeStoreError> {
        let value = serde_json::to_string(code)?;
        let mut conn = self.client.connection();

        // EX takes whole seconds and rejects 0
        let secs = ttl.as_secs().max(1);
        let _: () = self
            .client
            .timed(
                redis::cmd("SET")
                    .arg(key(code_id))
                    .arg(value)
                    .arg("EX")
                    .arg(secs)
                    .query_async(&mut conn),
            )
            .await?;

        Ok(())
    }

    async fn get(&self, code_id: &str) -> Result<Option<VerificationCode>, CodeStoreError> {
        let mut conn = self.client.connection();
        let value: Option<String> = self
            .client
            .timed(redis::cmd("GET").arg(key(code_id)).query_async(&mut conn))
            .await?;

        value
            .map(|v| serde_json::from_str(&v))
            .transpose()
            .map_err(CodeStoreError::from)
    }

    async fn delete(&self, code_id: &str) -> Result<bool, CodeStoreError> {
        let mut conn = self.client.connection();
        let removed: i64 = self
            .client
            .timed(redis::cmd("DEL").arg(key(code_id)).query_async(&mut conn))
            .await?;

        Ok(removed > 0)
    }
}

/// Codes in process memory
///
/// Expired entries are dropped on access and whenever a code is stored.
#[derive(Default)]
pub struct MemoryCodeStore {
    entries: Mutex<HashMap<String, (VerificationCode, Instant)>>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live codes
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, expires)| *expires > now);
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn set(&self, code_id: &str, code: &VerificationCode, ttl: Duration) -> Result<(), CodeStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        // Codes that were never redeemed are swept here
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key(code_id), (code.clone(), now + ttl));
        Ok(())
    }

    async fn get(&self, code_id: &str) -> Result<Option<VerificationCode>, CodeStoreError> {
        let mut entries = self.entries.lock().await;
        let key = key(code_id);

        let live = match entries.get(&key) {
            Some((code, expires)) => (*expires > Instant::now()).then(|| code.clone()),
            None => return Ok(None),
        };
        if live.is_none() {
            entries.remove(&key);
        }

        Ok(live)
    }

    async fn delete(&self, code_id: &str) -> Result<bool, CodeStoreError> {
        let removed = self.entries.lock().await.remove(&key(code_id));
        Ok(matches!(removed, Some((_, expires)) if expires > Instant::now()))
    }
}
