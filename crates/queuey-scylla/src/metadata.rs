//! `MetadataBackend` over the `queues`/`queue_counts` tables. Unlike the
//! in-memory backend, `queue_count` here is a CQL counter column kept in
//! sync on every register/remove rather than a row scan, since scanning
//! a partitioned `queues` table per request would not scale the way a
//! local counter does.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use scylla::statement::{Consistency, Statement};
use scylla::Session;

use queuey_core::model::{ConsistencyTier, QueueAttrs, QueueAttrsPatch, QueueType};
use queuey_core::ports::{MetadataBackend, Result};

use super::storage::map_unavailable;

pub struct ScyllaMetadata {
    session: Arc<Session>,
    write_consistency: Consistency,
}

impl ScyllaMetadata {
    pub fn new(session: Arc<Session>, multi_dc: bool) -> Self {
        Self {
            session,
            write_consistency: if multi_dc {
                Consistency::LocalQuorum
            } else {
                Consistency::Quorum
            },
        }
    }

    async fn fetch_one(&self, application: &str, queue: &str) -> Result<Option<QueueAttrs>> {
        let mut stmt = Statement::new(
            "SELECT partitions, queue_type, consistency, principals, created \
             FROM queues WHERE application = ? AND queue_name = ?",
        );
        stmt.set_consistency(self.write_consistency);
        let result = self
            .session
            .query_unpaged(stmt, (application, queue))
            .await
            .map_err(map_unavailable)?
            .into_rows_result()
            .map_err(map_unavailable)?;

        let row = result
            .rows::<(i32, String, String, Vec<String>, Decimal)>()
            .map_err(map_unavailable)?
            .next();
        let Some(row) = row else { return Ok(None) };
        let (partitions, queue_type, consistency, principals, created) = row.map_err(map_unavailable)?;

        Ok(Some(QueueAttrs {
            queue_name: queue.to_string(),
            application: application.to_string(),
            partitions: partitions as u32,
            queue_type: QueueType::parse(&queue_type).unwrap_or_default(),
            consistency: ConsistencyTier::parse(&consistency).unwrap_or_default(),
            principals,
            created,
        }))
    }
}

#[async_trait]
impl MetadataBackend for ScyllaMetadata {
    async fn register_queue(
        &self,
        application: &str,
        queue: &str,
        patch: QueueAttrsPatch,
        now: Decimal,
    ) -> Result<QueueAttrs> {
        let existing = self.fetch_one(application, queue).await?;
        let is_new = existing.is_none();
        let mut attrs = existing.unwrap_or_else(|| QueueAttrs::new(application, queue, now));

        if let Some(partitions) = patch.partitions {
            attrs.partitions = partitions;
        }
        if let Some(queue_type) = patch.queue_type {
            attrs.queue_type = queue_type;
        }
        if let Some(consistency) = patch.consistency {
            attrs.consistency = consistency;
        }
        if let Some(principals) = patch.principals {
            attrs.principals = principals;
        }

        let mut upsert = Statement::new(
            "INSERT INTO queues (application, queue_name, partitions, queue_type, consistency, principals, created) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        );
        upsert.set_consistency(self.write_consistency);
        self.session
            .query_unpaged(
                upsert,
                (
                    application,
                    queue,
                    attrs.partitions as i32,
                    attrs.queue_type.as_str(),
                    attrs.consistency.as_str(),
                    attrs.principals.clone(),
                    attrs.created,
                ),
            )
            .await
            .map_err(map_unavailable)?;

        if is_new {
            let mut bump = Statement::new(
                "UPDATE queue_counts SET count = count + 1 WHERE application = ?",
            );
            bump.set_consistency(self.write_consistency);
            self.session.query_unpaged(bump, (application,)).await.map_err(map_unavailable)?;
        }

        Ok(attrs)
    }

    async fn remove_queue(&self, application: &str, queue: &str) -> Result<bool> {
        let existed = self.fetch_one(application, queue).await?.is_some();
        if !existed {
            return Ok(false);
        }

        let mut delete = Statement::new("DELETE FROM queues WHERE application = ? AND queue_name = ?");
        delete.set_consistency(self.write_consistency);
        self.session
            .query_unpaged(delete, (application, queue))
            .await
            .map_err(map_unavailable)?;

        let mut decr = Statement::new("UPDATE queue_counts SET count = count - 1 WHERE application = ?");
        decr.set_consistency(self.write_consistency);
        self.session.query_unpaged(decr, (application,)).await.map_err(map_unavailable)?;

        Ok(true)
    }

    async fn queue_list(
        &self,
        application: &str,
        limit: u32,
        offset: Option<String>,
    ) -> Result<Vec<String>> {
        let mut stmt = Statement::new("SELECT queue_name FROM queues WHERE application = ?");
        stmt.set_consistency(self.write_consistency);
        let result = self
            .session
            .query_unpaged(stmt, (application,))
            .await
            .map_err(map_unavailable)?
            .into_rows_result()
            .map_err(map_unavailable)?;

        let mut names = Vec::new();
        for row in result.rows::<(String,)>().map_err(map_unavailable)? {
            names.push(row.map_err(map_unavailable)?.0);
        }
        names.sort();

        let start = match &offset {
            Some(after) => names.iter().position(|n| n >= after).unwrap_or(names.len()),
            None => 0,
        };
        Ok(names.into_iter().skip(start).take(limit as usize).collect())
    }

    async fn queue_information(
        &self,
        application: &str,
        queue_names: &[String],
    ) -> Result<Vec<Option<QueueAttrs>>> {
        let mut out = Vec::with_capacity(queue_names.len());
        for name in queue_names {
            out.push(self.fetch_one(application, name).await?);
        }
        Ok(out)
    }

    async fn queue_count(&self, application: &str) -> Result<u64> {
        let mut stmt = Statement::new("SELECT count FROM queue_counts WHERE application = ?");
        stmt.set_consistency(self.write_consistency);
        let result = self
            .session
            .query_unpaged(stmt, (application,))
            .await
            .map_err(map_unavailable)?
            .into_rows_result()
            .map_err(map_unavailable)?;

        let row = result.rows::<(i64,)>().map_err(map_unavailable)?.next();
        match row {
            Some(r) => Ok(r.map_err(map_unavailable)?.0.max(0) as u64),
            None => Ok(0),
        }
    }
}
