use super::{object_key, ObjectStore, UploadSource, UploadedObject};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
use aws_sdk_s3::{config::Region, Client as S3Client};
use reqwest::header::CONTENT_TYPE;

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
// DeleteObjects accepts at most this many keys per request.
const DELETE_BATCH_SIZE: usize = 1000;

pub struct CdnClient {
    client: S3Client,
    http: reqwest::Client,
    bucket: String,
    base_url: String,
}

impl CdnClient {
    pub async fn new(
        access_key_id: String,
        secret_access_key: String,
        endpoint: String,
        region: String,
        bucket: String,
        base_url: String,
        http: reqwest::Client,
    ) -> Result<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "digital-ocean-spaces",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region))
            .endpoint_url(endpoint)
            .load()
            .await;

        let client = S3Client::new(&config);

        Ok(Self {
            client,
            http,
            bucket,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn fetch_source(&self, source: &UploadSource) -> Result<(Vec<u8>, String)> {
        match source {
            UploadSource::Bytes { data, content_type } => Ok((data.clone(), content_type.clone())),
            UploadSource::Url(url) => {
                let response = self.http.get(url).send().await?;

                if !response.status().is_success() {
                    return Err(Error::ObjectStore(format!(
                        "Source {} returned status {}",
                        url,
                        response.status()
                    )));
                }

                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let data = response.bytes().await?.to_vec();

                if data.is_empty() {
                    return Err(Error::ObjectStore(format!("Source {} returned no data", url)));
                }

                Ok((data, content_type))
            }
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| Error::ObjectStore(format!("Failed to list {}: {}", prefix, e)))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_string),
            );

            continuation_token = match response.is_truncated() {
                Some(true) => response.next_continuation_token().map(str::to_string),
                _ => None,
            };
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for CdnClient {
    async fn upload(
        &self,
        source: &UploadSource,
        folder: &str,
        id: &str,
    ) -> Result<UploadedObject> {
        let (data, content_type) = self.fetch_source(source).await?;
        let key = object_key(folder, id);

        tracing::debug!("Uploading {} ({} bytes) to {}", source.describe(), data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(format!("Failed to upload file: {}", e)))?;

        Ok(UploadedObject {
            secure_url: self.get_public_url(&key),
            key,
        })
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.list_keys(prefix).await?;
        let mut removed = 0;

        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = batch
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| Error::ObjectStore(format!("Invalid key {}: {}", key, e)))
                })
                .collect::<Result<Vec<_>>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| Error::ObjectStore(format!("Invalid delete request: {}", e)))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| Error::ObjectStore(format!("Failed to delete {}: {}", prefix, e)))?;

            let errors = output.errors();
            if let Some(first) = errors.first() {
                return Err(Error::ObjectStore(format!(
                    "Failed to delete {} objects under {} (first: {} {})",
                    errors.len(),
                    prefix,
                    first.key().unwrap_or("?"),
                    first.message().unwrap_or("unknown error")
                )));
            }

            removed += batch.len();
        }

        Ok(removed)
    }

    async fn delete_folder(&self, folder: &str) -> Result<()> {
        // Folders are zero-byte marker keys ending in '/'.
        let marker = format!("{}/", folder.trim_end_matches('/'));
        self.delete_object(&marker).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(format!("Failed to delete {}: {}", key, e)))?;
        Ok(())
    }
}
