//! Process-local queue registry, one row per `(application, queue_name)`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;

use queuey_core::model::{QueueAttrs, QueueAttrsPatch};
use queuey_core::ports::{MetadataBackend, Result};

#[derive(Default)]
struct ApplicationRow {
    /// Kept sorted by queue name so `queue_list` can page without a sort pass.
    queues: BTreeMap<String, QueueAttrs>,
}

#[derive(Default)]
pub struct MemoryMetadata {
    applications: RwLock<BTreeMap<String, ApplicationRow>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataBackend for MemoryMetadata {
    async fn register_queue(
        &self,
        application: &str,
        queue: &str,
        patch: QueueAttrsPatch,
        now: Decimal,
    ) -> Result<QueueAttrs> {
        let mut applications = self.applications.write().unwrap();
        let app = applications.entry(application.to_string()).or_default();

        let attrs = app
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| QueueAttrs::new(application, queue, now));

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
        Ok(attrs.clone())
    }

    async fn remove_queue(&self, application: &str, queue: &str) -> Result<bool> {
        let mut applications = self.applications.write().unwrap();
        Ok(applications
            .get_mut(application)
            .map(|app| app.queues.remove(queue).is_some())
            .unwrap_or(false))
    }

    async fn queue_list(
        &self,
        application: &str,
        limit: u32,
        offset: Option<String>,
    ) -> Result<Vec<String>> {
        let applications = self.applications.read().unwrap();
        let Some(app) = applications.get(application) else {
            return Ok(Vec::new());
        };
        let iter = app.queues.keys();
        let names: Vec<&String> = match offset {
            Some(after) => iter.skip_while(|name| **name < after).collect(),
            None => iter.collect(),
        };
        Ok(names.into_iter().take(limit as usize).cloned().collect())
    }

    async fn queue_information(
        &self,
        application: &str,
        queue_names: &[String],
    ) -> Result<Vec<Option<QueueAttrs>>> {
        let applications = self.applications.read().unwrap();
        let app = applications.get(application);
        Ok(queue_names
            .iter()
            .map(|name| app.and_then(|a| a.queues.get(name)).cloned())
            .collect())
    }

    async fn queue_count(&self, application: &str) -> Result<u64> {
        let applications = self.applications.read().unwrap();
        Ok(applications.get(application).map(|a| a.queues.len()).unwrap_or(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuey_core::model::QueueAttrsPatch;

    #[tokio::test]
    async fn register_then_fetch_round_trips_attrs() {
        let meta = MemoryMetadata::new();
        let mut patch = QueueAttrsPatch::default();
        patch.partitions = Some(4);
        meta.register_queue("acme", "orders", patch, Decimal::new(1000, 0)).await.unwrap();

        let fetched = meta
            .queue_information("acme", &["orders".to_string()])
            .await
            .unwrap();
        assert_eq!(fetched[0].as_ref().unwrap().partitions, 4);
    }

    #[tokio::test]
    async fn register_twice_merges_without_clobbering_unset_fields() {
        let meta = MemoryMetadata::new();
        let mut first = QueueAttrsPatch::default();
        first.partitions = Some(4);
        meta.register_queue("acme", "orders", first, Decimal::new(1000, 0)).await.unwrap();

        let second = QueueAttrsPatch::default();
        meta.register_queue("acme", "orders", second, Decimal::new(1000, 0)).await.unwrap();

        let fetched = meta.queue_information("acme", &["orders".to_string()]).await.unwrap();
        assert_eq!(fetched[0].as_ref().unwrap().partitions, 4);
    }

    #[tokio::test]
    async fn queue_list_pages_with_offset() {
        let meta = MemoryMetadata::new();
        for name in ["a", "b", "c"] {
            meta.register_queue("acme", name, QueueAttrsPatch::default(), Decimal::new(0, 0))
                .await
                .unwrap();
        }
        // offset is the last-returned key; the next slice is start-key
        // inclusive, so re-supplying "a" includes "a" again (§4.C).
        let page = meta.queue_list("acme", 10, Some("a".to_string())).await.unwrap();
        assert_eq!(page, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn remove_queue_reports_whether_it_existed() {
        let meta = MemoryMetadata::new();
        meta.register_queue("acme", "orders", QueueAttrsPatch::default(), Decimal::new(0, 0))
            .await
            .unwrap();
        assert!(meta.remove_queue("acme", "orders").await.unwrap());
        assert!(!meta.remove_queue("acme", "orders").await.unwrap());
    }
}
