//! Data models and structures
//!
//! Defines the date partition key, provider candidates, persisted image
//! records and the per-run outcome reported by the orchestrator.

use crate::retention::PurgeReport;
use crate::{Error, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One calendar day (UTC) of stored images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatePartition(NaiveDate);

impl DatePartition {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's partition according to the UTC calendar.
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The partition exactly one calendar day earlier.
    pub fn previous(&self) -> Result<Self> {
        self.0
            .pred_opt()
            .map(Self)
            .ok_or_else(|| Error::Invariant(format!("No calendar day precedes {}", self)))
    }

    /// The partition exactly one calendar day later.
    pub fn next(&self) -> Result<Self> {
        self.0
            .succ_opt()
            .map(Self)
            .ok_or_else(|| Error::Invariant(format!("No calendar day follows {}", self)))
    }
}

impl fmt::Display for DatePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for DatePartition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Self)
            .map_err(|_| Error::DateParse(format!("Invalid date '{}'. Expected format: YYYY-MM-DD", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
        }
    }
}

/// A provider-returned image that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub source_url: String,
    pub author_name: Option<String>,
}

impl ImageCandidate {
    pub fn new(source_url: impl Into<String>, author_name: Option<String>) -> Self {
        Self {
            source_url: source_url.into(),
            author_name,
        }
    }
}

pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Metadata written for every image that reached the CDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImageRecord {
    pub id: Uuid,
    pub url: String,
    pub author: String,
}

impl StoredImageRecord {
    pub fn new(id: Uuid, url: String, author_name: Option<&str>) -> Self {
        let author = author_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_AUTHOR)
            .to_string();

        Self { id, url, author }
    }
}

/// A candidate that could not be uploaded or recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub index: usize,
    pub source_url: String,
    pub reason: String,
}

impl ItemFailure {
    /// Human-readable reference to the failed candidate.
    pub fn candidate_ref(&self) -> String {
        format!("#{} ({})", self.index, self.source_url)
    }
}

/// Aggregate result of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub partition: DatePartition,
    /// Count asked of the provider.
    pub target: usize,
    /// Candidates actually received and processed.
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    pub stored: Vec<StoredImageRecord>,
    /// Yesterday's partition, removed before acquisition.
    pub purge: PurgeReport,
    /// Today's partition, cleared before acquisition.
    pub reset: PurgeReport,
}

impl BatchOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.succeeded == self.requested
    }
}

/// Where a partition lives in the object store and in the metadata tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    object_root: String,
    metadata_root: String,
}

impl StorageLayout {
    pub fn new(object_root: &str, metadata_root: &str) -> Self {
        Self {
            object_root: object_root.trim_matches('/').to_string(),
            metadata_root: metadata_root.trim_matches('/').to_string(),
        }
    }

    /// Object store folder holding a partition's images.
    pub fn object_folder(&self, partition: &DatePartition) -> String {
        join_path(&self.object_root, &partition.to_string())
    }

    /// Metadata subtree holding a partition's records.
    pub fn metadata_path(&self, partition: &DatePartition) -> String {
        join_path(&self.metadata_root, &partition.to_string())
    }

    pub fn record_path(&self, partition: &DatePartition, id: &Uuid) -> String {
        format!("{}/{}", self.metadata_path(partition), id)
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("daily_images", "daily_images")
    }
}

fn join_path(root: &str, leaf: &str) -> String {
    if root.is_empty() {
        leaf.to_string()
    } else {
        format!("{}/{}", root, leaf)
    }
}
