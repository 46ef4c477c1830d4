/// Redis connection handle
///
/// Wraps `redis::aio::ConnectionManager`, which multiplexes one connection
/// and reconnects on failure. Clones share the connection.
///
/// # Example
///
/// ```no_run
/// use chalk_shared::redis::client::{RedisClient, RedisSettings};
///
/// # async fn example() -> Result<(), chalk_shared::redis::client::RedisClientError> {
/// let client = RedisClient::connect(&RedisSettings {
///     url: "redis://localhost:6379".to_string(),
///     ..Default::default()
/// }).await?;
///
/// assert!(client.ping().await?);
/// # Ok(())
/// # }
/// ```

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("Redis command timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid Redis URL: {0}")]
    Config(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            RedisClientError::Connection(err.to_string())
        } else {
            RedisClientError::Command(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// `redis://[user:password@]host:port[/db]`
    pub url: String,

    /// Upper bound on a single command round trip (seconds)
    pub command_timeout_secs: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            command_timeout_secs: 5,
        }
    }
}

#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    command_timeout: Duration,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Fails if the URL is malformed or the server is unreachable.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, RedisClientError> {
        let client = Client::open(settings.url.as_str())
            .map_err(|e| RedisClientError::Config(e.to_string()))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| RedisClientError::Connection(e.to_string()))?;

        info!(url = %redact(&settings.url), "Connected to Redis");

        Ok(Self {
            manager,
            command_timeout: Duration::from_secs(settings.command_timeout_secs),
        })
    }

    /// A handle for issuing commands
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Runs a command future under the configured timeout
    pub async fn timed<T, F>(&self, command: F) -> Result<T, RedisClientError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        tokio::time::timeout(self.command_timeout, command)
            .await
            .map_err(|_| RedisClientError::Timeout(self.command_timeout))?
            .map_err(RedisClientError::from)
    }

    /// `true` if the server answered PONG
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.connection();
        let reply: String = self
            .timed(redis::cmd("PING").query_async(&mut conn))
            .await?;

        if reply == "PONG" {
            debug!("Redis health check passed");
            Ok(true)
        } else {
            warn!(%reply, "Unexpected PING reply");
            Ok(false)
        }
    }
}

/// Hides credentials in a Redis URL for logging
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***@{}", &url[..scheme_end + 3], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
