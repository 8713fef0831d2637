//! Storage and metadata backend contracts. The engine depends only on
//! these traits, never on a specific wide-column driver or an in-memory
//! map directly, so a backend can be swapped without touching engine
//! logic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::QueueyError;
use crate::model::{MessageRecord, Order, QueueAttrs, QueueAttrsPatch};
use crate::timeuuid::TimeUuid;

pub type Result<T> = std::result::Result<T, QueueyError>;

/// Read/write consistency level, selected from the queue's `consistency`
/// tier by the engine's policy table. Names follow wide-column quorum
/// vocabulary (`ONE`, `QUORUM`, `LOCAL_QUORUM`, `EACH_QUORUM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    One,
    Quorum,
    LocalQuorum,
    EachQuorum,
}

/// What to use as the message id on a push.
#[derive(Debug, Clone)]
pub enum PushTimestamp {
    /// Use this id verbatim, update-in-place semantics for that id.
    Id(TimeUuid),
    /// Synthesize a *new* id at this decimal-seconds timestamp (randomize=true).
    Seconds(Decimal),
}

#[derive(Debug, Clone)]
pub struct PushSpec {
    pub body: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    pub ttl: u32,
    pub timestamp: Option<PushTimestamp>,
}

#[derive(Debug, Clone, Copy)]
pub struct PushResult {
    pub message_id: TimeUuid,
    pub timestamp: Decimal,
}

/// `since` may be a concrete id or a decimal timestamp; in the latter case
/// the backend converts it to a lowest-valued id at that instant so the
/// slice is inclusive of everything at or after it.
#[derive(Debug, Clone)]
pub enum Since {
    Id(TimeUuid),
    Seconds(Decimal),
}

/// One `(queue, partition)` address to multi-get across.
#[derive(Debug, Clone)]
pub struct PartitionKey {
    pub queue: String,
    pub partition: u32,
}

/// A queue-scoped item within an atomic push batch.
#[derive(Debug, Clone)]
pub struct BatchPushItem {
    pub queue: String,
    pub partition: u32,
    pub spec: PushSpec,
}

/// Per-partition ordered column store. One implementation per storage
/// product; `queuey-memory` and `queuey-scylla` are the two concrete
/// backends this crate ships, chosen by configuration in `queuey-server`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn push(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        spec: PushSpec,
    ) -> Result<PushResult>;

    /// All inserts happen in one atomic batch; result order matches input order.
    async fn push_batch(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        items: Vec<BatchPushItem>,
    ) -> Result<Vec<PushResult>>;

    /// Multi-get across partition keys. `limit` applies *per* key, the
    /// aggregate may return up to `limit × keys.len()` records. Visibility
    /// delay is applied by the implementation: any message whose
    /// id-time is newer than `now − delay_seconds` is filtered out, with
    /// the cutoff computed once per call and compared on the integer
    /// 100-ns field.
    #[allow(clippy::too_many_arguments)]
    async fn retrieve_batch(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        keys: &[PartitionKey],
        limit: Option<u32>,
        since: Option<Since>,
        order: Order,
        include_metadata: bool,
        delay_seconds: f64,
    ) -> Result<Vec<MessageRecord>>;

    async fn retrieve(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        id: TimeUuid,
        include_metadata: bool,
        delay_seconds: f64,
    ) -> Result<Option<MessageRecord>>;

    async fn delete(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        ids: &[TimeUuid],
    ) -> Result<()>;

    async fn truncate(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
    ) -> Result<()>;

    async fn count(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
    ) -> Result<u64>;
}

/// Registry of queues per application. Writes use quorum-level
/// consistency (local-quorum in multi-DC mode, quorum otherwise); a
/// single-replica deployment relaxes to one-replica, that choice is the
/// caller's (the engine's), not this trait's.
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Idempotent create-or-update: merges only the attributes supplied in
    /// `patch` into an existing row, or inserts a fresh one (with
    /// `application` and `created` filled in) and atomically increments
    /// `queue_count[application]`. Monotonicity/no-clobber rules are the
    /// engine's responsibility, this is a raw merge.
    async fn register_queue(
        &self,
        application: &str,
        queue: &str,
        patch: QueueAttrsPatch,
        now: Decimal,
    ) -> Result<QueueAttrs>;

    async fn remove_queue(&self, application: &str, queue: &str) -> Result<bool>;

    /// `offset` is an opaque resume token equal to the last returned
    /// queue's storage key, the next page begins at that key.
    async fn queue_list(
        &self,
        application: &str,
        limit: u32,
        offset: Option<String>,
    ) -> Result<Vec<String>>;

    /// Result list is aligned with `queue_names`; missing queues produce `None`.
    async fn queue_information(
        &self,
        application: &str,
        queue_names: &[String],
    ) -> Result<Vec<Option<QueueAttrs>>>;

    async fn queue_count(&self, application: &str) -> Result<u64>;
}

/// Forwarding impls so `Arc<dyn StorageBackend>`/`Arc<dyn MetadataBackend>`
/// satisfy the traits themselves: `queuey-server` picks its concrete
/// backend at runtime from configuration and needs a single `QueueEngine`
/// type to hold either one behind a trait object.
#[async_trait]
impl<T: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<T> {
    async fn push(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        spec: PushSpec,
    ) -> Result<PushResult> {
        (**self).push(cl, application, queue, partition, spec).await
    }

    async fn push_batch(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        items: Vec<BatchPushItem>,
    ) -> Result<Vec<PushResult>> {
        (**self).push_batch(cl, application, items).await
    }

    async fn retrieve_batch(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        keys: &[PartitionKey],
        limit: Option<u32>,
        since: Option<Since>,
        order: Order,
        include_metadata: bool,
        delay_seconds: f64,
    ) -> Result<Vec<MessageRecord>> {
        (**self)
            .retrieve_batch(cl, application, keys, limit, since, order, include_metadata, delay_seconds)
            .await
    }

    async fn retrieve(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        id: TimeUuid,
        include_metadata: bool,
        delay_seconds: f64,
    ) -> Result<Option<MessageRecord>> {
        (**self)
            .retrieve(cl, application, queue, partition, id, include_metadata, delay_seconds)
            .await
    }

    async fn delete(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        ids: &[TimeUuid],
    ) -> Result<()> {
        (**self).delete(cl, application, queue, partition, ids).await
    }

    async fn truncate(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
    ) -> Result<()> {
        (**self).truncate(cl, application, queue, partition).await
    }

    async fn count(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
    ) -> Result<u64> {
        (**self).count(cl, application, queue, partition).await
    }
}

#[async_trait]
impl<T: MetadataBackend + ?Sized> MetadataBackend for std::sync::Arc<T> {
    async fn register_queue(
        &self,
        application: &str,
        queue: &str,
        patch: QueueAttrsPatch,
        now: Decimal,
    ) -> Result<QueueAttrs> {
        (**self).register_queue(application, queue, patch, now).await
    }

    async fn remove_queue(&self, application: &str, queue: &str) -> Result<bool> {
        (**self).remove_queue(application, queue).await
    }

    async fn queue_list(
        &self,
        application: &str,
        limit: u32,
        offset: Option<String>,
    ) -> Result<Vec<String>> {
        (**self).queue_list(application, limit, offset).await
    }

    async fn queue_information(
        &self,
        application: &str,
        queue_names: &[String],
    ) -> Result<Vec<Option<QueueAttrs>>> {
        (**self).queue_information(application, queue_names).await
    }

    async fn queue_count(&self, application: &str) -> Result<u64> {
        (**self).queue_count(application).await
    }
}
