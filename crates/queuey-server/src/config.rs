//! Process configuration, read once from environment variables in `main`
//! (no config-file parser, that's out of scope per §1). Recognized
//! variables:
//!
//! - `QUEUEY_BACKEND` (`memory`|`scylla`, default `memory`)
//! - `QUEUEY_BIND_ADDR` (default `0.0.0.0:8080`)
//! - `QUEUEY_SCYLLA_NODES` (comma-separated, required when backend=scylla)
//! - `QUEUEY_SCYLLA_KEYSPACE` (default `queuey`)
//! - `QUEUEY_APP_KEYS` (comma-separated `key=application` pairs)
//! - `QUEUEY_MULTI_DC` (bool, default false)
//! - `QUEUEY_CONSISTENCY_BASE_DELAY` (seconds, the `B` term, default 0)
//! - `QUEUEY_REPLICAS` (default 3)

use std::collections::HashMap;
use std::sync::Arc;

use queuey_core::ports::{MetadataBackend, StorageBackend};
use queuey_core::{PolicyConfig, QueueEngine};
use queuey_memory::{MemoryMetadata, MemoryStorage};
use queuey_scylla::{ScyllaMetadata, ScyllaStorage};

use crate::state::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Scylla,
}

pub struct Config {
    pub backend: Backend,
    pub bind_addr: String,
    pub scylla_nodes: Vec<String>,
    pub scylla_keyspace: String,
    pub app_keys: HashMap<String, String>,
    pub policy: PolicyConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let backend = match std::env::var("QUEUEY_BACKEND").unwrap_or_else(|_| "memory".into()).as_str() {
            "scylla" => Backend::Scylla,
            _ => Backend::Memory,
        };
        let bind_addr = std::env::var("QUEUEY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
        let scylla_nodes = std::env::var("QUEUEY_SCYLLA_NODES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let scylla_keyspace = std::env::var("QUEUEY_SCYLLA_KEYSPACE").unwrap_or_else(|_| "queuey".into());
        let app_keys = std::env::var("QUEUEY_APP_KEYS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|pair| {
                let (key, app) = pair.split_once('=')?;
                let (key, app) = (key.trim(), app.trim());
                if key.is_empty() || app.is_empty() {
                    return None;
                }
                Some((key.to_string(), app.to_string()))
            })
            .collect();
        let multi_dc = std::env::var("QUEUEY_MULTI_DC")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let base_delay_seconds = std::env::var("QUEUEY_CONSISTENCY_BASE_DELAY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);
        let replicas = std::env::var("QUEUEY_REPLICAS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        Self {
            backend,
            bind_addr,
            scylla_nodes,
            scylla_keyspace,
            app_keys,
            policy: PolicyConfig {
                multi_dc,
                replicas,
                base_delay_seconds,
            },
        }
    }

    /// Build the engine for whichever backend was selected. A `scylla`
    /// backend also runs `ensure_schema` against the configured keyspace;
    /// a shared cluster this server doesn't own its schema in production
    /// should disable that by pre-creating the keyspace instead.
    pub async fn build_engine(&self) -> anyhow::Result<Engine> {
        match self.backend {
            Backend::Memory => {
                let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
                let metadata: Arc<dyn MetadataBackend> = Arc::new(MemoryMetadata::new());
                Ok(QueueEngine::new(storage, metadata, self.policy))
            }
            Backend::Scylla => {
                if self.scylla_nodes.is_empty() {
                    anyhow::bail!("QUEUEY_SCYLLA_NODES must be set when QUEUEY_BACKEND=scylla");
                }
                let session = queuey_scylla::connect(&self.scylla_nodes).await?;
                let replication_factor = if self.policy.replicas <= 1 { 1 } else { self.policy.replicas };
                queuey_scylla::ensure_schema(&session, &self.scylla_keyspace, replication_factor).await?;
                session.use_keyspace(&self.scylla_keyspace, false).await?;

                let storage: Arc<dyn StorageBackend> = Arc::new(ScyllaStorage::new(session.clone()));
                let metadata: Arc<dyn MetadataBackend> = Arc::new(ScyllaMetadata::new(session, self.policy.multi_dc));
                Ok(QueueEngine::new(storage, metadata, self.policy))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_keys_parses_pairs_and_skips_malformed_entries() {
        std::env::set_var("QUEUEY_APP_KEYS", "abc123=acme,  def456 = widgets ,not-a-pair");
        let config = Config::from_env();
        assert_eq!(config.app_keys.get("abc123"), Some(&"acme".to_string()));
        assert_eq!(config.app_keys.get("def456"), Some(&"widgets".to_string()));
        assert_eq!(config.app_keys.len(), 2);
        std::env::remove_var("QUEUEY_APP_KEYS");
    }

    #[test]
    fn replicas_of_one_forces_single_node_replication_factor() {
        std::env::set_var("QUEUEY_REPLICAS", "1");
        let config = Config::from_env();
        assert_eq!(config.policy.replicas, 1);
        std::env::remove_var("QUEUEY_REPLICAS");
    }
}
