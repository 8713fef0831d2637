//! DDL for the keyspace this backend expects. Not run automatically;
//! `ensure_schema` is opt-in so a shared cluster isn't mutated by every
//! server boot.

use std::sync::Arc;

use scylla::{Session, SessionBuilder};

/// Open a session against the given contact nodes. Kept here so callers
/// (`queuey-server`) never need a direct dependency on the `scylla` crate.
pub async fn connect(known_nodes: &[String]) -> anyhow::Result<Arc<Session>> {
    let session = SessionBuilder::new()
        .known_nodes(known_nodes)
        .build()
        .await?;
    Ok(Arc::new(session))
}

/// Creates the keyspace and tables if they don't already exist. Call once
/// from an operator tool or a migration step, not from request handling.
pub async fn ensure_schema(session: &Session, keyspace: &str, replication_factor: u32) -> anyhow::Result<()> {
    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {keyspace} \
                 WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
            ),
            &[],
        )
        .await?;

    session.use_keyspace(keyspace, false).await?;

    session
        .query_unpaged(
            "CREATE TABLE IF NOT EXISTS messages (
                partition_key text,
                message_id timeuuid,
                body blob,
                PRIMARY KEY (partition_key, message_id)
            ) WITH CLUSTERING ORDER BY (message_id DESC)",
            &[],
        )
        .await?;

    session
        .query_unpaged(
            "CREATE TABLE IF NOT EXISTS message_metadata (
                message_id timeuuid PRIMARY KEY,
                metadata map<text, text>
            )",
            &[],
        )
        .await?;

    session
        .query_unpaged(
            "CREATE TABLE IF NOT EXISTS queues (
                application text,
                queue_name text,
                partitions int,
                queue_type text,
                consistency text,
                principals list<text>,
                created decimal,
                PRIMARY KEY (application, queue_name)
            )",
            &[],
        )
        .await?;

    session
        .query_unpaged(
            "CREATE TABLE IF NOT EXISTS queue_counts (
                application text PRIMARY KEY,
                count counter
            )",
            &[],
        )
        .await?;

    Ok(())
}

/// `partition_key` column value for one `(application, queue, partition)` triple.
pub fn partition_key(application: &str, queue: &str, partition: u32) -> String {
    format!("{application}:{queue}:{partition}")
}
