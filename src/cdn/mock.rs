use super::{object_key, ObjectStore, UploadSource, UploadedObject};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory object store. Also used for dry runs.
#[derive(Clone)]
pub struct MockCdnClient {
    files: Arc<Mutex<BTreeMap<String, MockObject>>>,
    base_url: String,
    failing_sources: Arc<Mutex<HashSet<String>>>,
    fail_deletes: Arc<Mutex<bool>>,
    latency: Option<Duration>,
    upload_count: Arc<Mutex<usize>>,
    in_flight: Arc<Mutex<usize>>,
    peak_in_flight: Arc<Mutex<usize>>,
}

impl MockCdnClient {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(BTreeMap::new())),
            base_url: "https://mock-cdn.example.com".to_string(),
            failing_sources: Arc::new(Mutex::new(HashSet::new())),
            fail_deletes: Arc::new(Mutex::new(false)),
            latency: None,
            upload_count: Arc::new(Mutex::new(0)),
            in_flight: Arc::new(Mutex::new(0)),
            peak_in_flight: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_file(self, key: String, content: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(
            key,
            MockObject {
                data: content,
                content_type: "application/octet-stream".to_string(),
            },
        );
        self
    }

    /// Make every upload of this source URL fail.
    pub fn with_failing_source(self, url: &str) -> Self {
        self.failing_sources.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn with_delete_failure(self, fail: bool) -> Self {
        *self.fail_deletes.lock().unwrap() = fail;
        self
    }

    /// Hold each upload open for `latency` so overlapping uploads are observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    /// Highest number of uploads observed running at the same time.
    pub fn get_peak_concurrency(&self) -> usize {
        *self.peak_in_flight.lock().unwrap()
    }

    pub fn get_files(&self) -> BTreeMap<String, MockObject> {
        self.files.lock().unwrap().clone()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn enter(&self) {
        let mut in_flight = self.in_flight.lock().unwrap();
        *in_flight += 1;
        let mut peak = self.peak_in_flight.lock().unwrap();
        *peak = (*peak).max(*in_flight);
    }

    fn leave(&self) {
        *self.in_flight.lock().unwrap() -= 1;
    }

    fn store(&self, source: &UploadSource, folder: &str, id: &str) -> Result<UploadedObject> {
        let object = match source {
            UploadSource::Url(url) => {
                if self.failing_sources.lock().unwrap().contains(url) {
                    return Err(Error::ObjectStore(format!(
                        "Mock upload failure for {}",
                        url
                    )));
                }
                MockObject {
                    data: url.as_bytes().to_vec(),
                    content_type: "image/jpeg".to_string(),
                }
            }
            UploadSource::Bytes { data, content_type } => MockObject {
                data: data.clone(),
                content_type: content_type.clone(),
            },
        };

        let key = object_key(folder, id);
        self.files.lock().unwrap().insert(key.clone(), object);

        Ok(UploadedObject {
            secure_url: format!("{}/{}", self.base_url, key),
            key,
        })
    }

    fn check_deletes(&self, target: &str) -> Result<()> {
        if *self.fail_deletes.lock().unwrap() {
            return Err(Error::ObjectStore(format!(
                "Mock delete failure for {}",
                target
            )));
        }
        Ok(())
    }
}

impl Default for MockCdnClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockCdnClient {
    async fn upload(
        &self,
        source: &UploadSource,
        folder: &str,
        id: &str,
    ) -> Result<UploadedObject> {
        *self.upload_count.lock().unwrap() += 1;

        self.enter();
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.store(source, folder, id);
        self.leave();

        result
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        self.check_deletes(prefix)?;

        let mut files = self.files.lock().unwrap();
        let before = files.len();
        files.retain(|key, _| !key.starts_with(prefix));
        Ok(before - files.len())
    }

    async fn delete_folder(&self, folder: &str) -> Result<()> {
        self.check_deletes(folder)?;

        let marker = format!("{}/", folder.trim_end_matches('/'));
        self.files.lock().unwrap().remove(&marker);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.check_deletes(key)?;

        self.files.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_cdn_upload_url_source() {
        let client = MockCdnClient::new();

        let uploaded = client
            .upload(
                &UploadSource::Url("https://images.test/a".to_string()),
                "daily/2024-01-01",
                "abc",
            )
            .await
            .unwrap();

        assert_eq!(uploaded.key, "daily/2024-01-01/abc");
        assert_eq!(
            uploaded.secure_url,
            "https://mock-cdn.example.com/daily/2024-01-01/abc"
        );
        assert_eq!(client.get_upload_count(), 1);
        assert_eq!(client.get_files().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_cdn_upload_bytes_keeps_content_type() {
        let client = MockCdnClient::new().with_base_url("https://custom-cdn.com".to_string());

        let uploaded = client
            .upload(
                &UploadSource::Bytes {
                    data: vec![1, 2, 3],
                    content_type: "image/webp".to_string(),
                },
                "folder",
                "id",
            )
            .await
            .unwrap();

        assert_eq!(uploaded.secure_url, "https://custom-cdn.com/folder/id");
        let stored = &client.get_files()["folder/id"];
        assert_eq!(stored.data, vec![1, 2, 3]);
        assert_eq!(stored.content_type, "image/webp");
    }

    #[tokio::test]
    async fn test_mock_cdn_failing_source() {
        let client = MockCdnClient::new().with_failing_source("https://images.test/bad");

        let result = client
            .upload(
                &UploadSource::Url("https://images.test/bad".to_string()),
                "f",
                "1",
            )
            .await;

        assert!(matches!(result, Err(Error::ObjectStore(_))));
        assert!(client.get_files().is_empty());
    }

    #[tokio::test]
    async fn test_mock_cdn_delete_by_prefix() {
        let client = MockCdnClient::new()
            .with_file("daily/2024-01-01/a".to_string(), vec![1])
            .with_file("daily/2024-01-01/b".to_string(), vec![2])
            .with_file("daily/2024-01-02/c".to_string(), vec![3]);

        let removed = client.delete_by_prefix("daily/2024-01-01/").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(client.keys_with_prefix("daily/"), vec!["daily/2024-01-02/c"]);

        let removed_again = client.delete_by_prefix("daily/2024-01-01/").await.unwrap();
        assert_eq!(removed_again, 0);
    }

    #[tokio::test]
    async fn test_mock_cdn_delete_failure() {
        let client = MockCdnClient::new()
            .with_file("daily/x".to_string(), vec![1])
            .with_delete_failure(true);

        assert!(client.delete_by_prefix("daily/").await.is_err());
        assert!(client.delete_folder("daily").await.is_err());
        assert_eq!(client.get_files().len(), 1);
    }
}
