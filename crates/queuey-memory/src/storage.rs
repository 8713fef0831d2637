//! Process-local, per-partition column store. Each `(application, queue,
//! partition)` triple owns a `BTreeMap<TimeUuid, Entry>`; `TimeUuid`'s
//! own `Ord` gives the map its wire order for free, so range scans and
//! limit/order handling are plain `BTreeMap` iteration.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use queuey_core::model::{MessageRecord, Order};
use queuey_core::ports::{
    BatchPushItem, ConsistencyLevel, PartitionKey, PushResult, PushSpec, PushTimestamp, Result,
    Since, StorageBackend,
};
use queuey_core::timeuuid::TimeUuid;

#[derive(Debug, Clone)]
struct Entry {
    body: Vec<u8>,
    metadata: BTreeMap<String, String>,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) < self.ttl
    }
}

type PartitionMap = BTreeMap<TimeUuid, Entry>;

/// In-memory `StorageBackend`. Consistency levels are accepted but
/// ignored: a single process has nothing to replicate to.
#[derive(Default)]
pub struct MemoryStorage {
    partitions: RwLock<BTreeMap<(String, String, u32), PartitionMap>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_one(
        &self,
        application: &str,
        queue: &str,
        partition: u32,
        spec: PushSpec,
    ) -> PushResult {
        let id = match spec.timestamp {
            Some(PushTimestamp::Id(id)) => id,
            Some(PushTimestamp::Seconds(t)) => TimeUuid::randomized_at(t),
            None => TimeUuid::now(),
        };
        let entry = Entry {
            body: spec.body,
            metadata: spec.metadata,
            inserted_at: Instant::now(),
            ttl: Duration::from_secs(spec.ttl as u64),
        };
        let timestamp = id.timestamp_of();
        let mut partitions = self.partitions.write().unwrap();
        partitions
            .entry((application.to_string(), queue.to_string(), partition))
            .or_default()
            .insert(id, entry);
        PushResult {
            message_id: id,
            timestamp,
        }
    }

    fn to_record(queue: &str, partition: u32, id: TimeUuid, entry: &Entry, include_metadata: bool) -> MessageRecord {
        MessageRecord {
            message_id: id,
            timestamp: id.timestamp_of(),
            body: entry.body.clone(),
            metadata: if include_metadata {
                entry.metadata.clone()
            } else {
                BTreeMap::new()
            },
            queue_name: format!("{queue}:{partition}"),
            partition,
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn push(
        &self,
        _cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        spec: PushSpec,
    ) -> Result<PushResult> {
        Ok(self.insert_one(application, queue, partition, spec))
    }

    async fn push_batch(
        &self,
        _cl: ConsistencyLevel,
        application: &str,
        items: Vec<BatchPushItem>,
    ) -> Result<Vec<PushResult>> {
        Ok(items
            .into_iter()
            .map(|item| self.insert_one(application, &item.queue, item.partition, item.spec))
            .collect())
    }

    async fn retrieve_batch(
        &self,
        _cl: ConsistencyLevel,
        application: &str,
        keys: &[PartitionKey],
        limit: Option<u32>,
        since: Option<Since>,
        order: Order,
        include_metadata: bool,
        _delay_seconds: f64,
    ) -> Result<Vec<MessageRecord>> {
        // Visibility delay is a multi-datacenter replication concern: a
        // single process has nothing to wait on for its own writes to
        // become visible, so unlike `ScyllaStorage` this backend ignores
        // `delay_seconds` entirely, matching the Python original's
        // in-memory backend.
        let now = Instant::now();
        let lower_bound = since.as_ref().map(|s| match s {
            Since::Id(id) => *id,
            Since::Seconds(t) => TimeUuid::lowest_at(*t),
        });

        let partitions = self.partitions.read().unwrap();
        let mut out = Vec::new();
        for key in keys {
            let map = match partitions.get(&(application.to_string(), key.queue.clone(), key.partition)) {
                Some(m) => m,
                None => continue,
            };
            let mut ids: Vec<&TimeUuid> = map
                .keys()
                .filter(|id| map[*id].is_live(now))
                .filter(|id| lower_bound.map(|lb| **id >= lb).unwrap_or(true))
                .collect();
            match order {
                Order::Ascending => {}
                Order::Descending => ids.reverse(),
            }
            if let Some(limit) = limit {
                ids.truncate(limit as usize);
            }
            for id in ids {
                out.push(Self::to_record(&key.queue, key.partition, *id, &map[id], include_metadata));
            }
        }
        Ok(out)
    }

    async fn retrieve(
        &self,
        _cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        id: TimeUuid,
        include_metadata: bool,
        _delay_seconds: f64,
    ) -> Result<Option<MessageRecord>> {
        let now = Instant::now();
        let partitions = self.partitions.read().unwrap();
        let record = partitions
            .get(&(application.to_string(), queue.to_string(), partition))
            .and_then(|map| map.get(&id).filter(|e| e.is_live(now)))
            .map(|entry| Self::to_record(queue, partition, id, entry, include_metadata));
        Ok(record)
    }

    async fn delete(
        &self,
        _cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        ids: &[TimeUuid],
    ) -> Result<()> {
        let mut partitions = self.partitions.write().unwrap();
        if let Some(map) = partitions.get_mut(&(application.to_string(), queue.to_string(), partition)) {
            for id in ids {
                map.remove(id);
            }
        }
        Ok(())
    }

    async fn truncate(
        &self,
        _cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
    ) -> Result<()> {
        self.partitions
            .write()
            .unwrap()
            .remove(&(application.to_string(), queue.to_string(), partition));
        Ok(())
    }

    async fn count(
        &self,
        _cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
    ) -> Result<u64> {
        let now = Instant::now();
        let n = self
            .partitions
            .read()
            .unwrap()
            .get(&(application.to_string(), queue.to_string(), partition))
            .map(|map| map.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0);
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn spec(body: &str) -> PushSpec {
        PushSpec {
            body: body.as_bytes().to_vec(),
            metadata: Map::new(),
            ttl: 3600,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn push_then_retrieve_round_trips_body() {
        let storage = MemoryStorage::new();
        let result = storage
            .push(ConsistencyLevel::One, "acme", "orders", 1, spec("hello"))
            .await
            .unwrap();
        let record = storage
            .retrieve(ConsistencyLevel::One, "acme", "orders", 1, result.message_id, true, 0.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.body, b"hello");
        assert_eq!(record.queue_name, "orders:1");
    }

    #[tokio::test]
    async fn push_with_explicit_id_replaces_existing_message() {
        let storage = MemoryStorage::new();
        let id = TimeUuid::now();
        let mut first = spec("v1");
        first.timestamp = Some(PushTimestamp::Id(id));
        storage.push(ConsistencyLevel::One, "acme", "orders", 1, first).await.unwrap();

        let mut second = spec("v2");
        second.timestamp = Some(PushTimestamp::Id(id));
        storage.push(ConsistencyLevel::One, "acme", "orders", 1, second).await.unwrap();

        let record = storage
            .retrieve(ConsistencyLevel::One, "acme", "orders", 1, id, true, 0.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.body, b"v2");
        assert_eq!(storage.count(ConsistencyLevel::One, "acme", "orders", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn retrieve_batch_concatenates_without_cross_partition_merge() {
        let storage = MemoryStorage::new();
        storage.push(ConsistencyLevel::One, "acme", "orders", 2, spec("p2-a")).await.unwrap();
        storage.push(ConsistencyLevel::One, "acme", "orders", 1, spec("p1-a")).await.unwrap();

        let keys = vec![
            PartitionKey { queue: "orders".into(), partition: 2 },
            PartitionKey { queue: "orders".into(), partition: 1 },
        ];
        let records = storage
            .retrieve_batch(ConsistencyLevel::One, "acme", &keys, None, None, Order::Ascending, false, 0.0)
            .await
            .unwrap();
        assert_eq!(records[0].partition, 2);
        assert_eq!(records[1].partition, 1);
    }

    #[tokio::test]
    async fn delete_removes_only_named_ids() {
        let storage = MemoryStorage::new();
        let a = storage.push(ConsistencyLevel::One, "acme", "orders", 1, spec("a")).await.unwrap();
        let b = storage.push(ConsistencyLevel::One, "acme", "orders", 1, spec("b")).await.unwrap();
        storage.delete(ConsistencyLevel::One, "acme", "orders", 1, &[a.message_id]).await.unwrap();
        assert!(storage.retrieve(ConsistencyLevel::One, "acme", "orders", 1, a.message_id, false, 0.0).await.unwrap().is_none());
        assert!(storage.retrieve(ConsistencyLevel::One, "acme", "orders", 1, b.message_id, false, 0.0).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn truncate_clears_the_whole_partition() {
        let storage = MemoryStorage::new();
        storage.push(ConsistencyLevel::One, "acme", "orders", 1, spec("a")).await.unwrap();
        storage.truncate(ConsistencyLevel::One, "acme", "orders", 1).await.unwrap();
        assert_eq!(storage.count(ConsistencyLevel::One, "acme", "orders", 1).await.unwrap(), 0);
    }
}
