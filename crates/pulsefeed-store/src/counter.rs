// Counter store interface and in-memory implementation.
//
// Counters are mutated only via atomic increments, so concurrent flushes
// commute: any interleaving of the same increments yields the same counts.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use pulsefeed_core::{counter_hash_key, CounterKind, EntityKind};

use crate::error::StoreError;

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// One pipelined round trip of atomic increments. `ids` may repeat; each
    /// occurrence applies `delta` once.
    async fn increment_many(
        &self,
        entity: EntityKind,
        counter: CounterKind,
        ids: &[String],
        delta: i64,
    ) -> Result<(), StoreError>;

    /// One multi-get of counter hashes. The result corresponds positionally
    /// to `ids`; a missing key yields an empty field map.
    async fn get_many(
        &self,
        entity: EntityKind,
        ids: &[String],
    ) -> Result<Vec<HashMap<String, String>>, StoreError>;
}

/// In-memory hash store mirroring the field layout of the real key-value
/// backend (stringly-typed hash fields).
#[derive(Default)]
pub struct MemoryCounterStore {
    hashes: Mutex<HashMap<String, HashMap<String, i64>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_many(
        &self,
        entity: EntityKind,
        counter: CounterKind,
        ids: &[String],
        delta: i64,
    ) -> Result<(), StoreError> {
        let mut hashes = self.hashes.lock();
        for id in ids {
            let fields = hashes.entry(counter_hash_key(entity, id)).or_default();
            *fields.entry(counter.field().to_string()).or_insert(0) += delta;
        }
        Ok(())
    }

    async fn get_many(
        &self,
        entity: EntityKind,
        ids: &[String],
    ) -> Result<Vec<HashMap<String, String>>, StoreError> {
        let hashes = self.hashes.lock();
        Ok(ids
            .iter()
            .map(|id| {
                hashes
                    .get(&counter_hash_key(entity, id))
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|(field, value)| (field.clone(), value.to_string()))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefeed_core::CounterSnapshot;

    #[tokio::test]
    async fn repeated_ids_accumulate() {
        let store = MemoryCounterStore::new();
        store
            .increment_many(
                EntityKind::Post,
                CounterKind::Likes,
                &["p1".into(), "p1".into(), "p2".into()],
                1,
            )
            .await
            .unwrap();

        let counts = store
            .get_many(EntityKind::Post, &["p1".into(), "p2".into(), "p3".into()])
            .await
            .unwrap();
        assert_eq!(CounterSnapshot::from_fields(&counts[0]).likes_count, 2);
        assert_eq!(CounterSnapshot::from_fields(&counts[1]).likes_count, 1);
        assert_eq!(CounterSnapshot::from_fields(&counts[2]), CounterSnapshot::default());
    }

    #[tokio::test]
    async fn increments_commute() {
        let forward = MemoryCounterStore::new();
        let reverse = MemoryCounterStore::new();
        let increments = [
            (CounterKind::Likes, "p1", 1),
            (CounterKind::Likes, "p1", 1),
            (CounterKind::Comments, "p1", 1),
            (CounterKind::Likes, "p1", -1),
            (CounterKind::Comments, "p2", 1),
        ];

        for (counter, id, delta) in increments {
            forward
                .increment_many(EntityKind::Post, counter, &[id.to_string()], delta)
                .await
                .unwrap();
        }
        for (counter, id, delta) in increments.iter().rev() {
            reverse
                .increment_many(EntityKind::Post, *counter, &[id.to_string()], *delta)
                .await
                .unwrap();
        }

        let ids = ["p1".to_string(), "p2".to_string()];
        assert_eq!(
            forward.get_many(EntityKind::Post, &ids).await.unwrap(),
            reverse.get_many(EntityKind::Post, &ids).await.unwrap()
        );
    }
}
