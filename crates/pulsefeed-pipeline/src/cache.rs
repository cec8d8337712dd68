// Response cache and invalidator.
//
// Both directions derive keys through `pulsefeed_core::api_cache_key`; the
// invalidator never builds a key the read path could not have built. When
// the cache is disabled by configuration, every operation is a no-op, not
// an error.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use pulsefeed_core::{api_cache_key, CacheKeySpec};
use pulsefeed_store::{CacheStore, StoreError};

#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    environment: String,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        environment: impl Into<String>,
        enabled: bool,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            enabled,
            environment: environment.into(),
            ttl,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Read-path lookup. Infra failures degrade to a miss.
    pub async fn get_api(&self, spec: &CacheKeySpec) -> Option<serde_json::Value> {
        if !self.enabled {
            return None;
        }

        let key = api_cache_key(&self.environment, spec);
        match self.store.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Read-path store. Infra failures are logged and swallowed.
    pub async fn set_api(&self, spec: &CacheKeySpec, value: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let key = api_cache_key(&self.environment, spec);
        let raw = value.to_string();
        if let Err(err) = self.store.set(&key, raw, self.ttl).await {
            warn!(error = %err, "cache write failed");
        }
    }

    /// Bulk-delete the entries for `specs` after a successful flush.
    /// Errors propagate so the applier can record them as soft failures.
    pub async fn invalidate(&self, specs: &[CacheKeySpec]) -> Result<u64, StoreError> {
        if !self.enabled || specs.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = specs
            .iter()
            .map(|spec| api_cache_key(&self.environment, spec))
            .collect();
        let deleted = self.store.delete_many(&keys).await?;
        counter!("pulsefeed.cache.invalidated", deleted);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefeed_store::MemoryCacheStore;

    fn cache(enabled: bool) -> (ResponseCache, Arc<MemoryCacheStore>) {
        let store = Arc::new(MemoryCacheStore::new());
        let cache = ResponseCache::new(
            store.clone(),
            "test",
            enabled,
            Duration::from_secs(60),
        );
        (cache, store)
    }

    #[tokio::test]
    async fn read_and_invalidation_paths_agree_on_keys() {
        let (cache, _store) = cache(true);
        let spec = CacheKeySpec::new("/v1/like").param("postId", "p1");

        cache.set_api(&spec, &serde_json::json!({"likesCount": 3})).await;
        assert!(cache.get_api(&spec).await.is_some());

        // The invalidation path must delete exactly what the read path wrote.
        let deleted = cache.invalidate(std::slice::from_ref(&spec)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(cache.get_api(&spec).await.is_none());
    }

    #[tokio::test]
    async fn disabled_cache_is_a_noop_everywhere() {
        let (cache, store) = cache(false);
        let spec = CacheKeySpec::new("/v1/like").param("postId", "p1");

        cache.set_api(&spec, &serde_json::json!({"x": 1})).await;
        assert!(store.is_empty());
        assert!(cache.get_api(&spec).await.is_none());
        assert_eq!(cache.invalidate(&[spec]).await.unwrap(), 0);
    }
}
