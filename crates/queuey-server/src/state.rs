//! Shared application state handed to every axum handler.

use std::collections::HashMap;
use std::sync::Arc;

use queuey_core::ports::{MetadataBackend, StorageBackend};
use queuey_core::QueueEngine;

/// The engine type this server runs: whichever concrete backend
/// `Config::build_engine` picked, behind a trait object so both
/// `queuey-memory` and `queuey-scylla` fit the same `AppState`.
pub type Engine = QueueEngine<Arc<dyn StorageBackend>, Arc<dyn MetadataBackend>>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// `Application <key>` → owning application name, seeded at boot from
    /// `QUEUEY_APP_KEYS`. Process supervision / secret distribution for
    /// this table is out of scope; this is just the in-process lookup.
    pub app_keys: Arc<HashMap<String, String>>,
}
