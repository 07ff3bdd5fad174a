//! Retention of the previous day's images.
//!
//! Before a run ingests today's partition, yesterday's partition is removed
//! from both the object store and the metadata store. Both deletions are
//! best-effort: a missing partition is the normal steady state, and a failed
//! purge is reported without stopping the run.

use crate::cdn::ObjectStore;
use crate::metadata::MetadataStore;
use crate::models::{DatePartition, StorageLayout};
use crate::Error;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum PurgeStatus {
    Completed,
    Failed(String),
}

impl PurgeStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, PurgeStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub partition: DatePartition,
    pub objects_removed: usize,
    pub object_store: PurgeStatus,
    pub metadata_store: PurgeStatus,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.object_store.is_completed() && self.metadata_store.is_completed()
    }
}

pub struct RetentionManager {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    layout: StorageLayout,
}

impl RetentionManager {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        layout: StorageLayout,
    ) -> Self {
        Self {
            objects,
            metadata,
            layout,
        }
    }

    /// Remove `partition` from both stores. Never fails; problems are
    /// reported in the returned [`PurgeReport`].
    pub async fn purge(&self, partition: DatePartition) -> PurgeReport {
        info!("Purging partition {}", partition);

        let (objects_removed, object_store) = match self.purge_objects(&partition).await {
            Ok(removed) => (removed, PurgeStatus::Completed),
            Err(e) => {
                warn!("Object store purge of {} failed: {}", partition, e);
                (0, PurgeStatus::Failed(e.to_string()))
            }
        };

        let metadata_path = self.layout.metadata_path(&partition);
        let metadata_store = match self.metadata.delete_subtree(&metadata_path).await {
            Ok(()) => PurgeStatus::Completed,
            Err(e) => {
                let e = Error::Retention(format!("{}: {}", metadata_path, e));
                warn!("Metadata store purge of {} failed: {}", partition, e);
                PurgeStatus::Failed(e.to_string())
            }
        };

        let report = PurgeReport {
            partition,
            objects_removed,
            object_store,
            metadata_store,
        };

        if report.is_clean() {
            info!(
                "Purged partition {} ({} objects removed)",
                partition, report.objects_removed
            );
        }

        report
    }

    async fn purge_objects(&self, partition: &DatePartition) -> crate::Result<usize> {
        let folder = self.layout.object_folder(partition);

        let removed = self
            .objects
            .delete_by_prefix(&format!("{}/", folder))
            .await
            .map_err(|e| Error::Retention(format!("{}: {}", folder, e)))?;

        if removed == 0 {
            info!("Nothing stored under {}", folder);
        }

        self.objects
            .delete_folder(&folder)
            .await
            .map_err(|e| Error::Retention(format!("{}: {}", folder, e)))?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::MockCdnClient;
    use crate::metadata::MockMetadataStore;
    use chrono::NaiveDate;
    use serde_json::json;

    fn partition(d: u32) -> DatePartition {
        DatePartition::new(NaiveDate::from_ymd_opt(2024, 5, d).unwrap())
    }

    fn manager(cdn: &MockCdnClient, db: &MockMetadataStore) -> RetentionManager {
        RetentionManager::new(
            Arc::new(cdn.clone()),
            Arc::new(db.clone()),
            StorageLayout::default(),
        )
    }

    #[tokio::test]
    async fn test_purge_removes_partition_from_both_stores() {
        let cdn = MockCdnClient::new()
            .with_file("daily_images/2024-05-01/a".to_string(), vec![1])
            .with_file("daily_images/2024-05-01/b".to_string(), vec![2])
            .with_file("daily_images/2024-05-02/c".to_string(), vec![3]);
        let db = MockMetadataStore::new()
            .with_entry("daily_images/2024-05-01/a", json!({ "url": "a" }))
            .with_entry("daily_images/2024-05-02/c", json!({ "url": "c" }));

        let report = manager(&cdn, &db).purge(partition(1)).await;

        assert!(report.is_clean());
        assert_eq!(report.objects_removed, 2);
        assert_eq!(
            cdn.keys_with_prefix("daily_images/"),
            vec!["daily_images/2024-05-02/c"]
        );
        assert_eq!(
            db.paths_under("daily_images"),
            vec!["daily_images/2024-05-02/c"]
        );
    }

    #[tokio::test]
    async fn test_purge_of_missing_partition_is_clean() {
        let cdn = MockCdnClient::new();
        let db = MockMetadataStore::new();

        let report = manager(&cdn, &db).purge(partition(1)).await;

        assert!(report.is_clean());
        assert_eq!(report.objects_removed, 0);
    }

    #[tokio::test]
    async fn test_object_store_failure_does_not_skip_metadata_purge() {
        let cdn = MockCdnClient::new()
            .with_file("daily_images/2024-05-01/a".to_string(), vec![1])
            .with_delete_failure(true);
        let db = MockMetadataStore::new().with_entry("daily_images/2024-05-01/a", json!(1));

        let report = manager(&cdn, &db).purge(partition(1)).await;

        assert!(matches!(report.object_store, PurgeStatus::Failed(_)));
        assert_eq!(report.metadata_store, PurgeStatus::Completed);
        assert!(db.paths_under("daily_images").is_empty());
        assert_eq!(cdn.get_files().len(), 1);
    }

    #[tokio::test]
    async fn test_metadata_failure_is_reported_not_raised() {
        let cdn = MockCdnClient::new().with_file("daily_images/2024-05-01/a".to_string(), vec![1]);
        let db = MockMetadataStore::new().with_delete_failure(true);

        let report = manager(&cdn, &db).purge(partition(1)).await;

        assert_eq!(report.object_store, PurgeStatus::Completed);
        assert!(matches!(report.metadata_store, PurgeStatus::Failed(ref reason) if reason.contains("Retention")));
        assert!(cdn.get_files().is_empty());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_purge_status_serialization() {
        let failed = serde_json::to_value(PurgeStatus::Failed("boom".to_string())).unwrap();
        assert_eq!(failed, json!({ "status": "failed", "reason": "boom" }));

        let done = serde_json::to_value(PurgeStatus::Completed).unwrap();
        assert_eq!(done, json!({ "status": "completed" }));
    }
}
