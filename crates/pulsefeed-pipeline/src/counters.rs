// Read-path counter composition.

use tracing::warn;

use pulsefeed_core::{CounterSnapshot, EntityKind};
use pulsefeed_store::CounterStore;

/// Fetch counters for N entities in one multi-get and zip them positionally
/// with the ids. A failed read degrades every entry to zero rather than
/// failing the response.
pub async fn snapshots_for(
    store: &dyn CounterStore,
    entity: EntityKind,
    ids: &[String],
) -> Vec<CounterSnapshot> {
    match store.get_many(entity, ids).await {
        Ok(hashes) => hashes.iter().map(CounterSnapshot::from_fields).collect(),
        Err(err) => {
            warn!(error = %err, %entity, "counter read failed, degrading to zero");
            vec![CounterSnapshot::default(); ids.len()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefeed_core::CounterKind;
    use pulsefeed_store::{MemoryCounterStore, StoreError};

    struct BrokenCounterStore;

    #[async_trait::async_trait]
    impl CounterStore for BrokenCounterStore {
        async fn increment_many(
            &self,
            _entity: EntityKind,
            _counter: CounterKind,
            _ids: &[String],
            _delta: i64,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn get_many(
            &self,
            _entity: EntityKind,
            _ids: &[String],
        ) -> Result<Vec<std::collections::HashMap<String, String>>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn zips_results_positionally() {
        let store = MemoryCounterStore::new();
        store
            .increment_many(EntityKind::Post, CounterKind::Likes, &["p2".into()], 5)
            .await
            .unwrap();

        let snapshots =
            snapshots_for(&store, EntityKind::Post, &["p1".into(), "p2".into()]).await;
        assert_eq!(snapshots[0].likes_count, 0);
        assert_eq!(snapshots[1].likes_count, 5);
    }

    #[tokio::test]
    async fn failed_read_degrades_to_zero() {
        let snapshots =
            snapshots_for(&BrokenCounterStore, EntityKind::Post, &["p1".into(), "p2".into()])
                .await;
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0], CounterSnapshot::default());
    }
}
