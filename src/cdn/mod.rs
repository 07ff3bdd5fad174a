//! CDN integration for publishing daily images
//!
//! Handles uploading images to S3-compatible storage (DigitalOcean Spaces)
//! under per-day folders, and bulk removal of those folders.

pub mod client;
pub mod mock;

pub use client::CdnClient;
pub use mock::MockCdnClient;

use crate::Result;
use async_trait::async_trait;

/// Content to place in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// Remote content the store fetches before writing.
    Url(String),
    Bytes {
        data: Vec<u8>,
        content_type: String,
    },
}

impl UploadSource {
    /// Short description used in logs and failure reports.
    pub fn describe(&self) -> String {
        match self {
            UploadSource::Url(url) => url.clone(),
            UploadSource::Bytes { data, content_type } => {
                format!("{} bytes of {}", data.len(), content_type)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub key: String,
    pub secure_url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `source` at `{folder}/{id}` and return its public URL.
    async fn upload(&self, source: &UploadSource, folder: &str, id: &str)
        -> Result<UploadedObject>;

    /// Remove every object whose key starts with `prefix`. Returns how many
    /// were removed; zero is not an error.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Remove the (empty) folder itself.
    async fn delete_folder(&self, folder: &str) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

pub(crate) fn object_key(folder: &str, id: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        id.to_string()
    } else {
        format!("{}/{}", folder, id)
    }
}
