//! `StorageBackend` over a `messages`/`message_metadata` column family
//! pair. One CQL partition per `(application, queue, partition)` triple,
//! clustered by `message_id` descending so "most recent first" reads
//! need no client-side reversal.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use scylla::frame::value::CqlTimeuuid;
use scylla::statement::{Consistency, Statement};
use scylla::Session;

use queuey_core::error::QueueyError;
use queuey_core::model::{MessageRecord, Order};
use queuey_core::ports::{
    BatchPushItem, ConsistencyLevel, PartitionKey, PushResult, PushSpec, PushTimestamp, Result,
    Since, StorageBackend,
};
use queuey_core::timeuuid::TimeUuid;

use crate::schema::partition_key;

fn to_cql_consistency(cl: ConsistencyLevel) -> Consistency {
    match cl {
        ConsistencyLevel::One => Consistency::One,
        ConsistencyLevel::Quorum => Consistency::Quorum,
        ConsistencyLevel::LocalQuorum => Consistency::LocalQuorum,
        ConsistencyLevel::EachQuorum => Consistency::EachQuorum,
    }
}

fn to_cql_timeuuid(id: TimeUuid) -> CqlTimeuuid {
    CqlTimeuuid::from(uuid::Uuid::from_bytes(*id.as_bytes()))
}

fn from_cql_timeuuid(id: CqlTimeuuid) -> TimeUuid {
    let uuid: uuid::Uuid = id.into();
    TimeUuid::parse(&uuid.simple().to_string()).expect("cql timeuuid is always well-formed")
}

pub(crate) fn map_unavailable(e: impl Into<anyhow::Error>) -> QueueyError {
    QueueyError::StorageUnavailable(e.into())
}

pub struct ScyllaStorage {
    session: Arc<Session>,
}

impl ScyllaStorage {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    async fn insert_one(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        spec: PushSpec,
    ) -> Result<PushResult> {
        let id = match spec.timestamp {
            Some(PushTimestamp::Id(id)) => id,
            Some(PushTimestamp::Seconds(t)) => TimeUuid::randomized_at(t),
            None => TimeUuid::now(),
        };
        let key = partition_key(application, queue, partition);

        let mut insert = Statement::new(
            "INSERT INTO messages (partition_key, message_id, body) VALUES (?, ?, ?) USING TTL ?",
        );
        insert.set_consistency(to_cql_consistency(cl));
        self.session
            .query_unpaged(insert, (key, to_cql_timeuuid(id), spec.body, spec.ttl as i32))
            .await
            .map_err(map_unavailable)?;

        if !spec.metadata.is_empty() {
            let mut insert_meta = Statement::new(
                "INSERT INTO message_metadata (message_id, metadata) VALUES (?, ?) USING TTL ?",
            );
            insert_meta.set_consistency(to_cql_consistency(cl));
            self.session
                .query_unpaged(insert_meta, (to_cql_timeuuid(id), spec.metadata, spec.ttl as i32))
                .await
                .map_err(map_unavailable)?;
        }

        Ok(PushResult {
            message_id: id,
            timestamp: id.timestamp_of(),
        })
    }
}

#[async_trait]
impl StorageBackend for ScyllaStorage {
    async fn push(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        spec: PushSpec,
    ) -> Result<PushResult> {
        self.insert_one(cl, application, queue, partition, spec).await
    }

    async fn push_batch(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        items: Vec<BatchPushItem>,
    ) -> Result<Vec<PushResult>> {
        // Scylla has no cross-partition-key atomic batch guarantee worth
        // paying for here (each item already targets its own partition
        // key); issue them as independent inserts, same as a LOGGED batch
        // would after the fact from the client's point of view.
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(
                self.insert_one(cl, application, &item.queue, item.partition, item.spec)
                    .await?,
            );
        }
        Ok(results)
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
        let lower_bound = since.map(|s| match s {
            Since::Id(id) => id,
            Since::Seconds(t) => TimeUuid::lowest_at(t),
        });
        let cutoff = if delay_seconds > 0.0 {
            let now = TimeUuid::now().timestamp_of();
            Some(TimeUuid::lowest_at(now - Decimal::try_from(delay_seconds).unwrap_or_default()))
        } else {
            None
        };

        let mut out = Vec::new();
        for key in keys {
            let partition_key_value = partition_key(application, &key.queue, key.partition);

            let mut cql = String::from(
                "SELECT message_id, body FROM messages WHERE partition_key = ?",
            );
            let mut bound: Vec<String> = vec![partition_key_value.clone()];
            if let Some(lb) = lower_bound {
                cql.push_str(" AND message_id >= ?");
                bound.push(to_cql_timeuuid(lb).to_string());
            }
            if let Some(c) = cutoff {
                cql.push_str(" AND message_id < ?");
                bound.push(to_cql_timeuuid(c).to_string());
            }
            match order {
                Order::Ascending => cql.push_str(" ORDER BY message_id ASC"),
                Order::Descending => {}
            }
            if let Some(limit) = limit {
                cql.push_str(&format!(" LIMIT {limit}"));
            }

            let mut stmt = Statement::new(cql);
            stmt.set_consistency(to_cql_consistency(cl));
            let result = self
                .session
                .query_unpaged(stmt, &bound)
                .await
                .map_err(map_unavailable)?
                .into_rows_result()
                .map_err(map_unavailable)?;

            let mut rows = Vec::new();
            for row in result.rows::<(CqlTimeuuid, Vec<u8>)>().map_err(map_unavailable)? {
                let (raw_id, body) = row.map_err(map_unavailable)?;
                rows.push((from_cql_timeuuid(raw_id), body));
            }

            for (id, body) in rows {
                let metadata = if include_metadata {
                    self.fetch_metadata(cl, id).await?
                } else {
                    BTreeMap::new()
                };
                out.push(MessageRecord {
                    message_id: id,
                    timestamp: id.timestamp_of(),
                    body,
                    metadata,
                    queue_name: format!("{}:{}", key.queue, key.partition),
                    partition: key.partition,
                });
            }
        }
        Ok(out)
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
        if delay_seconds > 0.0 {
            let cutoff_seconds = TimeUuid::now().timestamp_of()
                - Decimal::try_from(delay_seconds).unwrap_or_default();
            if id.timestamp_of() >= cutoff_seconds {
                return Ok(None);
            }
        }

        let key = partition_key(application, queue, partition);
        let mut stmt = Statement::new(
            "SELECT body FROM messages WHERE partition_key = ? AND message_id = ?",
        );
        stmt.set_consistency(to_cql_consistency(cl));
        let result = self
            .session
            .query_unpaged(stmt, (key, to_cql_timeuuid(id)))
            .await
            .map_err(map_unavailable)?
            .into_rows_result()
            .map_err(map_unavailable)?;

        let Some(row) = result.rows::<(Vec<u8>,)>().map_err(map_unavailable)?.next() else {
            return Ok(None);
        };
        let (body,) = row.map_err(map_unavailable)?;

        let metadata = if include_metadata {
            self.fetch_metadata(cl, id).await?
        } else {
            BTreeMap::new()
        };

        Ok(Some(MessageRecord {
            message_id: id,
            timestamp: id.timestamp_of(),
            body,
            metadata,
            queue_name: format!("{queue}:{partition}"),
            partition,
        }))
    }

    async fn delete(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
        ids: &[TimeUuid],
    ) -> Result<()> {
        let key = partition_key(application, queue, partition);
        for id in ids {
            let mut stmt = Statement::new("DELETE FROM messages WHERE partition_key = ? AND message_id = ?");
            stmt.set_consistency(to_cql_consistency(cl));
            self.session
                .query_unpaged(stmt, (key.clone(), to_cql_timeuuid(*id)))
                .await
                .map_err(map_unavailable)?;
        }
        Ok(())
    }

    async fn truncate(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
    ) -> Result<()> {
        let key = partition_key(application, queue, partition);
        let mut stmt = Statement::new("DELETE FROM messages WHERE partition_key = ?");
        stmt.set_consistency(to_cql_consistency(cl));
        self.session.query_unpaged(stmt, (key,)).await.map_err(map_unavailable)?;
        Ok(())
    }

    async fn count(
        &self,
        cl: ConsistencyLevel,
        application: &str,
        queue: &str,
        partition: u32,
    ) -> Result<u64> {
        let key = partition_key(application, queue, partition);
        let mut stmt = Statement::new("SELECT COUNT(*) FROM messages WHERE partition_key = ?");
        stmt.set_consistency(to_cql_consistency(cl));
        let result = self
            .session
            .query_unpaged(stmt, (key,))
            .await
            .map_err(map_unavailable)?
            .into_rows_result()
            .map_err(map_unavailable)?;
        let (count,): (i64,) = result
            .single_row()
            .map_err(map_unavailable)?;
        Ok(count as u64)
    }
}

impl ScyllaStorage {
    async fn fetch_metadata(&self, cl: ConsistencyLevel, id: TimeUuid) -> Result<BTreeMap<String, String>> {
        let mut stmt = Statement::new("SELECT metadata FROM message_metadata WHERE message_id = ?");
        stmt.set_consistency(to_cql_consistency(cl));
        let result = self
            .session
            .query_unpaged(stmt, (to_cql_timeuuid(id),))
            .await
            .map_err(map_unavailable)?
            .into_rows_result()
            .map_err(map_unavailable)?;
        let row = result
            .rows::<(Option<BTreeMap<String, String>>,)>()
            .map_err(map_unavailable)?
            .next();
        match row {
            Some(r) => Ok(r.map_err(map_unavailable)?.0.unwrap_or_default()),
            None => Ok(BTreeMap::new()),
        }
    }
}
