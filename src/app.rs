//! Application orchestration for the daily image rotation.
//!
//! One run purges yesterday's partition and clears anything already stored
//! for today, acquires a batch of candidates from the media provider, uploads
//! them to the CDN in bounded groups and records each stored image in the
//! metadata store. Per-image failures are isolated
//! and reported in the [`BatchOutcome`]; only setup and acquisition errors
//! abort a run.

use crate::cdn::{CdnClient, MockCdnClient, ObjectStore, UploadSource};
use crate::config::Config;
use crate::metadata::{MetadataStore, MockMetadataStore, RealtimeDbClient};
use crate::models::{
    BatchOutcome, DatePartition, ImageCandidate, ItemFailure, Orientation, StorageLayout,
    StoredImageRecord,
};
use crate::provider::{MediaProvider, UnsplashClient};
use crate::retention::RetentionManager;
use crate::{Error, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::{strategy::FixedInterval, RetryIf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Tunables for a single run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub query: String,
    pub target_count: usize,
    /// Uploads started together; groups run one after another.
    pub upload_concurrency: usize,
    pub fetch_attempts: usize,
    pub fetch_retry_delay: Duration,
    pub run_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            query: "motivational,inspiration,success,nature".to_string(),
            target_count: 30,
            upload_concurrency: 5,
            fetch_attempts: 3,
            fetch_retry_delay: Duration::from_secs(2),
            run_timeout: Duration::from_secs(600),
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            query: config.query.clone(),
            target_count: config.image_count,
            upload_concurrency: config.upload_concurrency,
            fetch_attempts: config.fetch_attempts,
            fetch_retry_delay: config.fetch_retry_delay,
            run_timeout: config.run_timeout,
        }
    }
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub provider: Arc<dyn MediaProvider>,
    pub objects: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

/// Drives purge, acquisition and grouped upload-and-record for one day.
pub struct App {
    provider: Arc<dyn MediaProvider>,
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    retention: RetentionManager,
    layout: StorageLayout,
    settings: RunSettings,
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// This is primarily useful for integration tests and local harnesses that
    /// need to inject mocks.
    pub fn with_services(
        services: AppServices,
        layout: StorageLayout,
        settings: RunSettings,
    ) -> Self {
        let retention = RetentionManager::new(
            services.objects.clone(),
            services.metadata.clone(),
            layout.clone(),
        );

        Self {
            provider: services.provider,
            objects: services.objects,
            metadata: services.metadata,
            retention,
            layout,
            settings,
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub async fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(&config).await
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        // Reuse one HTTP connection pool across clients.
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let provider: Arc<dyn MediaProvider> = Arc::new(
            UnsplashClient::new_with_client(config.unsplash_access_key.clone(), http_client.clone())
                .with_base_url(config.unsplash_base_url.clone()),
        );

        let objects: Arc<dyn ObjectStore>;
        let metadata: Arc<dyn MetadataStore>;
        if config.dry_run {
            info!("DRY_RUN enabled, CDN and metadata writes stay in memory");
            objects = Arc::new(MockCdnClient::new().with_base_url(config.cdn_base_url.clone()));
            metadata = Arc::new(MockMetadataStore::new());
        } else {
            objects = Arc::new(
                CdnClient::new(
                    required(&config.cdn_access_key_id, "CDN_ACCESS_KEY_ID")?,
                    required(&config.cdn_secret_access_key, "CDN_SECRET_ACCESS_KEY")?,
                    config.cdn_endpoint.clone(),
                    config.cdn_region.clone(),
                    config.cdn_bucket.clone(),
                    config.cdn_base_url.clone(),
                    http_client.clone(),
                )
                .await?,
            );
            metadata = Arc::new(RealtimeDbClient::new_with_client(
                required(&config.metadata_db_url, "METADATA_DB_URL")?,
                config.metadata_db_secret.clone(),
                http_client,
            ));
        }

        info!(
            "Configured for {} images per run, upload groups of {}",
            config.image_count, config.upload_concurrency
        );

        Ok(Self::with_services(
            AppServices {
                provider,
                objects,
                metadata,
            },
            StorageLayout::new(&config.cdn_root_folder, &config.metadata_root),
            RunSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run the daily cycle for `today`.
    ///
    /// Returns `Err` only when candidates could not be acquired; every other
    /// problem is reported in the outcome.
    pub async fn run(&self, today: DatePartition) -> Result<BatchOutcome> {
        info!("Rotating images for {}", today);

        let purge = self.retention.purge(today.previous()?).await;
        // Clear today so a rerun replaces the day's set.
        let reset = self.retention.purge(today).await;

        let mut candidates = self.acquire().await.map_err(|e| {
            error!("Failed to acquire candidates for {}: {}", today, e);
            Error::Acquisition(e.to_string())
        })?;

        let target = self.settings.target_count;
        if candidates.len() < target {
            warn!(
                "Provider returned {} of {} requested images",
                candidates.len(),
                target
            );
        } else if candidates.len() > target {
            warn!(
                "Provider returned {} images, keeping the first {}",
                candidates.len(),
                target
            );
            candidates.truncate(target);
        }

        let folder = self.layout.object_folder(&today);
        let group_size = self.settings.upload_concurrency.max(1);
        let mut stored = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();

        for (group_index, group) in candidates.chunks(group_size).enumerate() {
            let first = group_index * group_size;
            info!(
                "Uploading images {}-{} of {}",
                first + 1,
                first + group.len(),
                candidates.len()
            );

            let results = join_all(group.iter().enumerate().map(|(offset, candidate)| {
                self.ingest_item(&today, &folder, first + offset, candidate)
            }))
            .await;

            for result in results {
                match result {
                    Ok(record) => stored.push(record),
                    Err(failure) => {
                        warn!(
                            "Image {} failed: {}",
                            failure.candidate_ref(),
                            failure.reason
                        );
                        failures.push(failure);
                    }
                }
            }
        }

        failures.sort_by_key(|failure| failure.index);

        let outcome = BatchOutcome {
            partition: today,
            target,
            requested: candidates.len(),
            succeeded: stored.len(),
            failed: failures.len(),
            failures,
            stored,
            purge,
            reset,
        };

        info!(
            "Finished {}: {} requested, {} succeeded, {} failed",
            outcome.partition, outcome.requested, outcome.succeeded, outcome.failed
        );

        Ok(outcome)
    }

    async fn acquire(&self) -> Result<Vec<ImageCandidate>> {
        let retries = self.settings.fetch_attempts.saturating_sub(1);
        let strategy = FixedInterval::new(self.settings.fetch_retry_delay).take(retries);

        info!(
            "Fetching {} '{}' images",
            self.settings.target_count, self.settings.query
        );

        RetryIf::spawn(
            strategy,
            move || {
                self.provider.fetch_random(
                    &self.settings.query,
                    self.settings.target_count,
                    Orientation::Portrait,
                )
            },
            |e: &Error| {
                let transient = e.is_transient();
                if transient {
                    warn!("Image fetch attempt failed: {}. Will retry...", e);
                }
                transient
            },
        )
        .await
    }

    async fn ingest_item(
        &self,
        partition: &DatePartition,
        folder: &str,
        index: usize,
        candidate: &ImageCandidate,
    ) -> std::result::Result<StoredImageRecord, ItemFailure> {
        let fail = |reason: String| ItemFailure {
            index,
            source_url: candidate.source_url.clone(),
            reason,
        };

        let id = Uuid::new_v4();
        let source = UploadSource::Url(candidate.source_url.clone());

        let uploaded = self
            .objects
            .upload(&source, folder, &id.to_string())
            .await
            .map_err(|e| fail(format!("upload failed: {}", e)))?;

        let record = StoredImageRecord::new(
            id,
            uploaded.secure_url.clone(),
            candidate.author_name.as_deref(),
        );
        let path = self.layout.record_path(partition, &id);

        let written = match serde_json::to_value(&record) {
            Ok(value) => self.metadata.write(&path, &value).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = written {
            // Keep the object store from holding an image nothing references.
            if let Err(cleanup) = self.objects.delete_object(&uploaded.key).await {
                warn!("Could not remove orphaned {}: {}", uploaded.key, cleanup);
            }
            return Err(fail(format!("record write failed: {}", e)));
        }

        Ok(record)
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| Error::Setup(format!("{} not set", key)))
}
