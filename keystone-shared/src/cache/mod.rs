/// Optional Redis-backed JSON cache
///
/// The server runs without a cache when Redis is disabled or unreachable, so
/// callers hold an `Option<CacheManager>`.
///
/// # Example
///
/// ```no_run
/// use keystone_shared::cache::{user_profile_entry, CacheConfig, CacheManager};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = CacheManager::connect(CacheConfig::default()).await?;
/// let entry = user_profile_entry(Uuid::new_v4());
///
/// if let Some(snapshot) = cache.get_versioned::<serde_json::Value>(&entry).await {
///     if snapshot.value.is_none() {
///         let profile = serde_json::json!({"email": "a@example.com"});
///         cache.save_versioned(&entry, snapshot.generation, &profile).await;
///     }
/// }
///
/// // After the profile's data changes
/// cache.invalidate(&[entry]).await;
/// # Ok(())
/// # }
/// ```

pub mod client;
pub mod manager;

pub use client::{CacheClient, CacheConfig, CacheError};
pub use manager::{CacheManager, Snapshot, VersionedKey};

use uuid::Uuid;

/// Key under which a user's profile payload is cached
pub fn user_profile_key(user_id: Uuid) -> String {
    format!("keystone:user:{}:profile", user_id)
}

/// Profile key plus the counter bumped whenever the profile goes stale
pub fn user_profile_entry(user_id: Uuid) -> VersionedKey {
    VersionedKey {
        key: user_profile_key(user_id),
        generation_key: format!("keystone:user:{}:generation", user_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_profile_key() {
        let id = Uuid::parse_str("6f1c2a4e-8d3b-4f6a-9e2d-1b7c5a9e0f42").unwrap();
        assert_eq!(
            user_profile_key(id),
            "keystone:user:6f1c2a4e-8d3b-4f6a-9e2d-1b7c5a9e0f42:profile"
        );

        let entry = user_profile_entry(id);
        assert_eq!(entry.key, user_profile_key(id));
        assert_eq!(
            entry.generation_key,
            "keystone:user:6f1c2a4e-8d3b-4f6a-9e2d-1b7c5a9e0f42:generation"
        );
    }
}
