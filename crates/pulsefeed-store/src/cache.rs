// Response cache interface and in-memory implementation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Delete many keys in one round trip; returns how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError>;
}

/// In-memory cache honoring per-entry TTLs lazily on read.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock();
        let mut deleted = 0;
        for key in keys {
            if entries.remove(key).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let cache = MemoryCacheStore::new();
        cache
            .set("k1", "v1".into(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some("v1"));

        let deleted = cache
            .delete_many(&["k1".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(cache.get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_read_as_missing() {
        let cache = MemoryCacheStore::new();
        cache
            .set("k1", "v1".into(), Duration::from_millis(5))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k1").await.unwrap().is_none());
    }
}
