/// Redis connection wrapper
///
/// Wraps `redis::aio::ConnectionManager`, which reconnects on its own after a
/// dropped connection. Every command runs under a timeout so a stalled Redis
/// cannot hold a request hostage.

use redis::aio::ConnectionManager;
use redis::{Client, RedisError, RedisResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("Redis configuration error: {0}")]
    Config(String),

    #[error("Redis command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

/// Redis connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// `redis://host:port/db`
    pub url: String,

    /// Time allowed for the initial connection
    pub connection_timeout_secs: u64,

    /// Time allowed for each command
    pub command_timeout_secs: u64,

    /// Expiry applied by `save` (`CACHE_TTL`)
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            connection_timeout_secs: 5,
            command_timeout_secs: 2,
            ttl_secs: 86_400,
        }
    }
}

impl CacheConfig {
    /// Builds the URL from host, port and database index
    pub fn redis_url(host: &str, port: u16, db: i64) -> String {
        format!("redis://{}:{}/{}", host, port, db)
    }
}

/// Cloneable Redis handle
#[derive(Clone)]
pub struct CacheClient {
    manager: ConnectionManager,
    config: Arc<CacheConfig>,
}

impl CacheClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server cannot be reached
    /// within `connection_timeout_secs`.
    pub async fn connect(config: CacheConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::Config(format!("Invalid Redis URL: {}", e)))?;

        let timeout = Duration::from_secs(config.connection_timeout_secs);
        let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(timeout))?
            .map_err(|e| CacheError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis cache connected");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Runs `op` on a connection handle under the command timeout
    ///
    /// ```no_run
    /// # use keystone_shared::cache::{CacheClient, CacheError};
    /// use redis::AsyncCommands;
    ///
    /// # async fn example(client: &CacheClient) -> Result<(), CacheError> {
    /// let value = client
    ///     .run(|mut conn| async move {
    ///         let value: Option<String> = conn.get("keystone:example").await?;
    ///         Ok(value)
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let timeout = Duration::from_secs(self.config.command_timeout_secs);

        let result = tokio::time::timeout(timeout, op(self.manager.clone()))
            .await
            .map_err(|_| CacheError::Timeout(timeout))?;

        Ok(result?)
    }

    /// Sends `PING`; true on `PONG`
    pub async fn ping(&self) -> Result<bool, CacheError> {
        let pong: String = self
            .run(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(pong == "PONG")
    }
}

/// Replaces credentials in a Redis URL with `***:***` for logging
pub fn sanitize_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > scheme_end {
            return format!("{}***:***@{}", &url[..scheme_end + 3], &url[at_pos + 1..]);
        }
    }
    url.to_string()
}
