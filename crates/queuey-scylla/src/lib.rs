//! `StorageBackend`/`MetadataBackend` pair over a wide-column cluster
//! (Scylla, or any Cassandra-protocol-compatible store). Selected by
//! `QUEUEY_BACKEND=scylla`; see `schema::ensure_schema` for the DDL this
//! backend expects to already exist.

pub mod metadata;
pub mod schema;
pub mod storage;

pub use metadata::ScyllaMetadata;
pub use schema::{connect, ensure_schema};
pub use storage::ScyllaStorage;
