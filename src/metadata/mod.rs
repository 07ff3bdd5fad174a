//! Metadata store integration
//!
//! A path-addressed JSON tree (Firebase Realtime Database style) holding one
//! subtree of image records per day.

pub mod mock;
pub mod realtime_db;

pub use mock::MockMetadataStore;
pub use realtime_db::RealtimeDbClient;

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Replace the value at `path`.
    async fn write(&self, path: &str, value: &Value) -> Result<()>;

    /// Read the value at `path`, `None` when nothing is stored there.
    async fn read(&self, path: &str) -> Result<Option<Value>>;

    /// Remove `path` and everything beneath it. Removing an absent path succeeds.
    async fn delete_subtree(&self, path: &str) -> Result<()>;
}
