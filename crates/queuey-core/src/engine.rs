//! The queue engine: the one place that knows how a consistency tier maps
//! to a (CL, delay) pair, how a push fans out across partitions, and how
//! metadata updates are merged. Everything here is storage-agnostic: it
//! drives `StorageBackend`/`MetadataBackend` and never touches a driver
//! directly.

use std::collections::BTreeMap;

use rand::Rng;
use rust_decimal::Decimal;

use crate::error::QueueyError;
use crate::model::{ConsistencyTier, MessageRecord, Order, PartitionedId, QueueAttrs, QueueAttrsPatch};
use crate::ports::{
    BatchPushItem, ConsistencyLevel, MetadataBackend, PartitionKey, PushResult, PushSpec,
    PushTimestamp, Since as PortsSince, StorageBackend,
};
use crate::principal::{owns_application, Acl, Permission, Principal};
use crate::timeuuid::TimeUuid;
use crate::validation;

pub type Result<T> = std::result::Result<T, QueueyError>;

/// One row of the consistency-tier policy table: which read/write CL a
/// tier uses, and how many seconds of visibility delay reads apply.
#[derive(Debug, Clone, Copy)]
struct PolicyRow {
    cl: ConsistencyLevel,
    delay_seconds: f64,
}

/// Deployment-wide knobs the policy table is parameterized by: whether
/// the cluster spans multiple datacenters, the number of replicas per
/// partition (a single replica collapses every tier to `One`/0-delay),
/// and the base delay `B` added to `Strong`'s visibility window.
#[derive(Debug, Clone, Copy)]
pub struct PolicyConfig {
    pub multi_dc: bool,
    pub replicas: u32,
    pub base_delay_seconds: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            multi_dc: false,
            replicas: 3,
            base_delay_seconds: 0.0,
        }
    }
}

impl PolicyConfig {
    /// Resolve a queue's `consistency` tier to the (CL, delay) pair reads
    /// and writes for that queue should use. A single-replica deployment
    /// has no quorum to speak of, so every tier relaxes to `One` with no
    /// delay: there is nothing a delay would protect against.
    fn resolve(&self, tier: ConsistencyTier) -> PolicyRow {
        if self.replicas <= 1 {
            return PolicyRow {
                cl: ConsistencyLevel::One,
                delay_seconds: 0.0,
            };
        }
        match tier {
            ConsistencyTier::Weak => PolicyRow {
                cl: ConsistencyLevel::One,
                delay_seconds: 1.0 + self.base_delay_seconds,
            },
            ConsistencyTier::Strong => PolicyRow {
                cl: if self.multi_dc {
                    ConsistencyLevel::LocalQuorum
                } else {
                    ConsistencyLevel::Quorum
                },
                delay_seconds: 5.0 + self.base_delay_seconds,
            },
            ConsistencyTier::VeryStrong => PolicyRow {
                cl: if self.multi_dc {
                    ConsistencyLevel::EachQuorum
                } else {
                    ConsistencyLevel::Quorum
                },
                delay_seconds: 600.0 + self.base_delay_seconds,
            },
        }
    }

    /// Metadata writes always use quorum (local-quorum in multi-DC),
    /// collapsing to `One` under a single replica same as data writes.
    fn metadata_cl(&self) -> ConsistencyLevel {
        if self.replicas <= 1 {
            ConsistencyLevel::One
        } else if self.multi_dc {
            ConsistencyLevel::LocalQuorum
        } else {
            ConsistencyLevel::Quorum
        }
    }
}

/// Drives the storage and metadata backends according to the policy
/// table and the ACL/principal rules. Holds no state of its own beyond
/// its backend handles and the policy config, safe to clone cheaply
/// behind an `Arc` in `queuey-server`'s app state.
pub struct QueueEngine<S, M> {
    storage: S,
    metadata: M,
    policy: PolicyConfig,
}

impl<S, M> QueueEngine<S, M>
where
    S: StorageBackend,
    M: MetadataBackend,
{
    pub fn new(storage: S, metadata: M, policy: PolicyConfig) -> Self {
        Self {
            storage,
            metadata,
            policy,
        }
    }

    /// Look up a queue's attributes and check `principals` against its
    /// assembled ACL for `permission`. Returns the attributes on success
    /// so callers don't have to re-fetch them.
    async fn authorize_queue(
        &self,
        application: &str,
        queue: &str,
        principals: &[Principal],
        permission: Permission,
    ) -> Result<QueueAttrs> {
        let attrs = self
            .metadata
            .queue_information(application, std::slice::from_ref(&queue.to_string()))
            .await?
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| QueueyError::NotFound(queue.to_string()))?;

        let acl = Acl::assemble(&attrs);
        if !acl.allows(principals, permission) {
            return Err(QueueyError::AccessDenied(format!(
                "no grant for {permission:?} on {queue}"
            )));
        }
        Ok(attrs)
    }

    /// Create a queue, or merge `patch` into an existing one. The caller
    /// must already hold `create_queue`/`create` on the application; that
    /// gate is `owns_application`, checked by the caller before this is
    /// reached, since there is no queue row to assemble an ACL from until
    /// one exists.
    pub async fn register_queue(
        &self,
        application: &str,
        queue: &str,
        patch: QueueAttrsPatch,
        now: Decimal,
    ) -> Result<QueueAttrs> {
        validation::validate_queue_name(queue)?;
        if let Some(existing) = self
            .metadata
            .queue_information(application, std::slice::from_ref(&queue.to_string()))
            .await?
            .into_iter()
            .next()
            .flatten()
        {
            if let Some(new_partitions) = patch.partitions {
                if new_partitions < existing.partitions {
                    return Err(QueueyError::InvalidUpdate(
                        "partitions may only increase".to_string(),
                    ));
                }
            }
        }
        self.metadata.register_queue(application, queue, patch, now).await
    }

    pub async fn remove_queue(
        &self,
        application: &str,
        queue: &str,
        principals: &[Principal],
    ) -> Result<()> {
        self.authorize_queue(application, queue, principals, Permission::DeleteQueue)
            .await?;
        let attrs = self
            .metadata
            .queue_information(application, std::slice::from_ref(&queue.to_string()))
            .await?
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| QueueyError::NotFound(queue.to_string()))?;
        let cl = self.policy.metadata_cl();
        for partition in 1..=attrs.partitions {
            self.storage
                .truncate(cl, application, queue, partition)
                .await?;
        }
        self.metadata.remove_queue(application, queue).await?;
        Ok(())
    }

    pub async fn queue_list(
        &self,
        application: &str,
        limit: u32,
        offset: Option<String>,
    ) -> Result<Vec<String>> {
        self.metadata.queue_list(application, limit, offset).await
    }

    pub async fn queue_count(&self, application: &str) -> Result<u64> {
        self.metadata.queue_count(application).await
    }

    pub async fn queue_information(
        &self,
        application: &str,
        queue_names: &[String],
    ) -> Result<Vec<Option<QueueAttrs>>> {
        self.metadata.queue_information(application, queue_names).await
    }

    /// Push one message. An explicit `id` in `spec` replaces the message
    /// at that id (update-in-place); an explicit decimal `timestamp`
    /// synthesizes a brand new randomized id at that instant; neither
    /// given mints a fresh id at `now`.
    pub async fn push(
        &self,
        application: &str,
        queue: &str,
        principals: &[Principal],
        partition: Option<u32>,
        body: Vec<u8>,
        metadata: BTreeMap<String, String>,
        ttl: u32,
        explicit_id: Option<TimeUuid>,
        explicit_timestamp: Option<Decimal>,
    ) -> Result<(PushResult, u32)> {
        validation::validate_body_nonempty(&body)?;
        let attrs = self
            .authorize_queue(application, queue, principals, Permission::Create)
            .await?;
        let row = self.policy.resolve(attrs.consistency);
        let partition = match partition {
            Some(p) => validate_partition(p, attrs.partitions)?,
            None => pick_partition(attrs.partitions),
        };

        let timestamp = match (explicit_id, explicit_timestamp) {
            (Some(id), _) => PushTimestamp::Id(id),
            (None, Some(t)) => PushTimestamp::Seconds(t),
            (None, None) => PushTimestamp::Seconds(TimeUuid::now().timestamp_of()),
        };

        let spec = PushSpec {
            body,
            metadata,
            ttl,
            timestamp: Some(timestamp),
        };
        let result = self
            .storage
            .push(row.cl, application, queue, partition, spec)
            .await?;
        Ok((result, partition))
    }

    /// Push a batch atomically within one queue. Each
    /// item may target a different partition; items with no partition
    /// given are assigned at random independently.
    pub async fn push_batch(
        &self,
        application: &str,
        queue: &str,
        principals: &[Principal],
        items: Vec<(Option<u32>, Vec<u8>, BTreeMap<String, String>, u32)>,
    ) -> Result<Vec<(PushResult, u32)>> {
        let attrs = self
            .authorize_queue(application, queue, principals, Permission::Create)
            .await?;
        let row = self.policy.resolve(attrs.consistency);

        let mut partitions = Vec::with_capacity(items.len());
        let batch_items = items
            .into_iter()
            .map(|(partition, body, metadata, ttl)| {
                validation::validate_body_nonempty(&body)?;
                let partition = match partition {
                    Some(p) => validate_partition(p, attrs.partitions)?,
                    None => pick_partition(attrs.partitions),
                };
                partitions.push(partition);
                Ok(BatchPushItem {
                    queue: queue.to_string(),
                    partition,
                    spec: PushSpec {
                        body,
                        metadata,
                        ttl,
                        timestamp: None,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let results = self.storage.push_batch(row.cl, application, batch_items).await?;
        Ok(results.into_iter().zip(partitions).collect())
    }

    /// Read across one or more partitions of a queue, concatenated in the
    /// order the partitions were requested, there is no cross-partition
    /// merge by timestamp.
    pub async fn get_messages(
        &self,
        application: &str,
        queue: &str,
        principals: &[Principal],
        partitions: Vec<u32>,
        limit: Option<u32>,
        since: Option<PortsSince>,
        order: Order,
        include_metadata: bool,
    ) -> Result<Vec<MessageRecord>> {
        let attrs = self
            .authorize_queue(application, queue, principals, Permission::View)
            .await?;
        let row = self.policy.resolve(attrs.consistency);

        let keys: Vec<PartitionKey> = partitions
            .into_iter()
            .map(|partition| PartitionKey {
                queue: queue.to_string(),
                partition,
            })
            .collect();

        self.storage
            .retrieve_batch(
                row.cl,
                application,
                &keys,
                limit,
                since,
                order,
                include_metadata,
                row.delay_seconds,
            )
            .await
    }

    pub async fn get_message(
        &self,
        application: &str,
        queue: &str,
        principals: &[Principal],
        id: PartitionedId,
        include_metadata: bool,
    ) -> Result<Option<MessageRecord>> {
        let attrs = self
            .authorize_queue(application, queue, principals, Permission::View)
            .await?;
        let row = self.policy.resolve(attrs.consistency);
        self.storage
            .retrieve(
                row.cl,
                application,
                queue,
                id.partition,
                id.message_id,
                include_metadata,
                row.delay_seconds,
            )
            .await
    }

    /// Delete a batch of messages, grouped by partition so each group can
    /// issue one storage call. A bare, un-prefixed message-id token routes
    /// to partition 1.
    pub async fn delete_messages(
        &self,
        application: &str,
        queue: &str,
        principals: &[Principal],
        ids: Vec<PartitionedId>,
    ) -> Result<()> {
        let attrs = self
            .authorize_queue(application, queue, principals, Permission::Delete)
            .await?;
        let row = self.policy.resolve(attrs.consistency);

        let mut by_partition: BTreeMap<u32, Vec<TimeUuid>> = BTreeMap::new();
        for id in ids {
            by_partition.entry(id.partition).or_default().push(id.message_id);
        }
        for (partition, ids) in by_partition {
            self.storage
                .delete(row.cl, application, queue, partition, &ids)
                .await?;
        }
        Ok(())
    }

    pub async fn message_count(
        &self,
        application: &str,
        queue: &str,
        principals: &[Principal],
        partition: u32,
    ) -> Result<u64> {
        let attrs = self
            .authorize_queue(application, queue, principals, Permission::View)
            .await?;
        let row = self.policy.resolve(attrs.consistency);
        self.storage.count(row.cl, application, queue, partition).await
    }
}

/// Whether `principals` may create/list queues for `application`, gates
/// application-scoped operations that precede any queue resource's ACL.
pub fn can_administer_application(principals: &[Principal], application: &str) -> bool {
    owns_application(principals, application)
}

fn pick_partition(partitions: u32) -> u32 {
    if partitions <= 1 {
        1
    } else {
        rand::thread_rng().gen_range(1..=partitions)
    }
}

/// A caller-supplied push partition must satisfy `1 ≤ p ≤ queue.partitions` (§4.D).
fn validate_partition(partition: u32, partitions: u32) -> Result<u32> {
    if partition < 1 || partition > partitions {
        return Err(QueueyError::InvalidParameter(format!(
            "partition {partition} out of range 1..={partitions}"
        )));
    }
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_replica_collapses_every_tier_to_one() {
        let policy = PolicyConfig {
            multi_dc: false,
            replicas: 1,
            base_delay_seconds: 5.0,
        };
        for tier in [
            ConsistencyTier::Weak,
            ConsistencyTier::Strong,
            ConsistencyTier::VeryStrong,
        ] {
            let row = policy.resolve(tier);
            assert_eq!(row.cl, ConsistencyLevel::One);
            assert_eq!(row.delay_seconds, 0.0);
        }
    }

    #[test]
    fn strong_tier_carries_base_delay() {
        let policy = PolicyConfig {
            multi_dc: false,
            replicas: 3,
            base_delay_seconds: 2.5,
        };
        let row = policy.resolve(ConsistencyTier::Strong);
        assert_eq!(row.cl, ConsistencyLevel::Quorum);
        assert_eq!(row.delay_seconds, 7.5);
    }

    #[test]
    fn very_strong_tier_uses_600s_base_delay() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.resolve(ConsistencyTier::VeryStrong).delay_seconds, 600.0);
    }

    #[test]
    fn multi_dc_prefers_local_quorum_for_strong_and_each_quorum_for_very_strong() {
        let policy = PolicyConfig {
            multi_dc: true,
            replicas: 3,
            base_delay_seconds: 0.0,
        };
        assert_eq!(policy.resolve(ConsistencyTier::Strong).cl, ConsistencyLevel::LocalQuorum);
        assert_eq!(
            policy.resolve(ConsistencyTier::VeryStrong).cl,
            ConsistencyLevel::EachQuorum
        );
    }

    #[test]
    fn weak_tier_has_a_one_second_floor_delay() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.resolve(ConsistencyTier::Weak).delay_seconds, 1.0);
    }

    #[test]
    fn pick_partition_stays_in_range() {
        for _ in 0..50 {
            let p = pick_partition(5);
            assert!((1..=5).contains(&p));
        }
        assert_eq!(pick_partition(1), 1);
    }

    #[test]
    fn validate_partition_rejects_out_of_range() {
        assert!(validate_partition(1, 3).is_ok());
        assert!(validate_partition(3, 3).is_ok());
        assert!(validate_partition(0, 3).is_err());
        assert!(validate_partition(4, 3).is_err());
    }
}
