/// JSON cache over Redis
///
/// The public operations never fail: Redis or (de)serialization errors are
/// logged at `warn` and reported as a miss or `false`.
///
/// # Versioned entries
///
/// Entries that are rebuilt from the database on a miss are stamped with the
/// value of a generation counter read *before* the database read. Invalidation
/// bumps the counter, so an entry computed from pre-invalidation data is never
/// served again even if its write lands after the invalidation.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::client::{CacheClient, CacheConfig, CacheError};

/// A cached value and the counter guarding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedKey {
    pub key: String,
    pub generation_key: String,
}

/// Result of a versioned lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Generation to stamp on a value rebuilt after a miss
    pub generation: u64,
    pub value: Option<T>,
}

#[derive(Serialize, Deserialize)]
struct Stamped<V> {
    generation: u64,
    value: V,
}

#[derive(Clone)]
pub struct CacheManager {
    client: CacheClient,
    ttl_secs: u64,
}

impl CacheManager {
    pub fn new(client: CacheClient) -> Self {
        let ttl_secs = client.config().ttl_secs;
        Self { client, ttl_secs }
    }

    /// Connects a client and wraps it
    pub async fn connect(config: CacheConfig) -> Result<Self, CacheError> {
        Ok(Self::new(CacheClient::connect(config).await?))
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Stores `value` as JSON with the default expiry
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.save_with_ttl(key, value, self.ttl_secs).await
    }

    pub async fn save_with_ttl<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        let result = match serde_json::to_string(value) {
            Ok(payload) => self.set_ex(key, payload, ttl_secs).await,
            Err(e) => Err(e.into()),
        };

        degrade(result, "save", key).is_some()
    }

    /// Loads and decodes a value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let result = async {
            let raw: Option<String> = self
                .client
                .run(|mut conn| async move { conn.get(key).await })
                .await?;
            decode(raw)
        }
        .await;

        let value = degrade(result, "get", key).flatten();
        tracing::debug!(key, hit = value.is_some(), "Cache lookup");
        value
    }

    /// Reads the generation counter and the entry in one round trip
    ///
    /// Returns `None` when Redis cannot be reached; callers should then skip
    /// [`save_versioned`](Self::save_versioned). An entry stamped with an
    /// older generation is reported as a miss.
    pub async fn get_versioned<T: DeserializeOwned>(&self, entry: &VersionedKey) -> Option<Snapshot<T>> {
        let keys = [entry.generation_key.as_str(), entry.key.as_str()];
        let result = async {
            let (generation, raw): (Option<u64>, Option<String>) = self
                .client
                .run(|mut conn| async move { conn.mget(&keys).await })
                .await?;
            let generation = generation.unwrap_or(0);

            let value = decode::<Stamped<T>>(raw)?
                .filter(|stamped| stamped.generation == generation)
                .map(|stamped| stamped.value);
            Ok::<_, CacheError>(Snapshot { generation, value })
        }
        .await;

        let snapshot = degrade(result, "get_versioned", &entry.key)?;
        tracing::debug!(
            key = %entry.key,
            generation = snapshot.generation,
            hit = snapshot.value.is_some(),
            "Versioned cache lookup"
        );
        Some(snapshot)
    }

    /// Stores `value` stamped with the generation returned by
    /// [`get_versioned`](Self::get_versioned)
    pub async fn save_versioned<T: Serialize>(&self, entry: &VersionedKey, generation: u64, value: &T) -> bool {
        let stamped = Stamped { generation, value };
        self.save(&entry.key, &stamped).await
    }

    /// Bumps each generation counter and drops the entries
    ///
    /// Runs as one `MULTI` transaction. Counters outlive the entries they
    /// guard so an expired counter cannot revalidate a stale entry.
    pub async fn invalidate(&self, entries: &[VersionedKey]) -> bool {
        if entries.is_empty() {
            return true;
        }

        let counter_ttl = i64::try_from(self.ttl_secs.saturating_mul(2)).unwrap_or(i64::MAX);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for entry in entries {
            pipe.incr(&entry.generation_key, 1u64)
                .ignore()
                .expire(&entry.generation_key, counter_ttl)
                .ignore()
                .del(&entry.key)
                .ignore();
        }

        let result = self
            .client
            .run(|mut conn| async move { pipe.query_async::<_, ()>(&mut conn).await })
            .await;

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        degrade(result, "invalidate", &keys.join(",")).is_some()
    }

    /// Deletes a key; true if it existed
    pub async fn clear(&self, key: &str) -> bool {
        self.clear_many(&[key.to_string()]).await > 0
    }

    /// Deletes several keys in one round trip; returns how many existed
    pub async fn clear_many(&self, keys: &[String]) -> u64 {
        if keys.is_empty() {
            return 0;
        }

        let result = self
            .client
            .run(|mut conn| async move { conn.del(keys).await })
            .await;

        degrade(result, "clear", &keys.join(",")).unwrap_or(0)
    }

    pub async fn exists(&self, key: &str) -> bool {
        let result = self
            .client
            .run(|mut conn| async move { conn.exists(key).await })
            .await;

        degrade(result, "exists", key).unwrap_or(false)
    }

    /// Resets the expiry of an existing key; false if the key is missing
    pub async fn set_ttl(&self, key: &str, ttl_secs: u64) -> bool {
        let seconds = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let result = self
            .client
            .run(|mut conn| async move { conn.expire(key, seconds).await })
            .await;

        degrade(result, "set_ttl", key).unwrap_or(false)
    }

    /// Keys matching a glob pattern
    ///
    /// Uses `SCAN`, so large keyspaces are walked incrementally.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        let result = self
            .client
            .run(|mut conn| async move {
                let mut keys = Vec::new();
                let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await?;
                while let Some(key) = iter.next_item().await {
                    keys.push(key);
                }
                keys.sort_unstable();
                keys.dedup();
                Ok(keys)
            })
            .await;

        degrade(result, "keys", pattern).unwrap_or_default()
    }

    pub async fn ping(&self) -> bool {
        degrade(self.client.ping().await, "ping", "").unwrap_or(false)
    }

    async fn set_ex(&self, key: &str, payload: String, ttl_secs: u64) -> Result<(), CacheError> {
        self.client
            .run(|mut conn| async move { conn.set_ex(key, payload, ttl_secs.max(1)).await })
            .await
    }
}

fn decode<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>, CacheError> {
    raw.map(|raw| serde_json::from_str::<T>(&raw))
        .transpose()
        .map_err(CacheError::from)
}

fn degrade<T>(result: Result<T, CacheError>, operation: &'static str, key: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(operation, key, error = %e, "Cache operation failed");
            None
        }
    }
}
