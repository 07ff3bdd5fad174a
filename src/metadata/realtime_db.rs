use super::MetadataStore;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

/// REST client for a Firebase Realtime Database style JSON tree.
pub struct RealtimeDbClient {
    client: Client,
    base_url: String,
    secret: Option<String>,
}

impl RealtimeDbClient {
    pub fn new(base_url: String, secret: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(base_url, secret, client))
    }

    pub fn new_with_client(base_url: String, secret: Option<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}.json", self.base_url, path.trim_matches('/'));
        let builder = self.client.request(method, url);
        match &self.secret {
            Some(secret) => builder.query(&[("auth", secret.as_str())]),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, action: &str, path: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send {} request for {}: {}", action, path, e);
            e
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!(
                "Metadata store {} of {} failed (status {}): {}",
                action,
                path,
                status,
                error_text
            );
            return Err(Error::MetadataStore(format!(
                "{} {} failed (status {}): {}",
                action, path, status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl MetadataStore for RealtimeDbClient {
    async fn write(&self, path: &str, value: &Value) -> Result<()> {
        let builder = self.request(Method::PUT, path).json(value);
        self.send(builder, "write", path).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Value>> {
        let response = self.send(self.request(Method::GET, path), "read", path).await?;
        let body = response.text().await?;

        match serde_json::from_str(&body)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    async fn delete_subtree(&self, path: &str) -> Result<()> {
        if path.trim_matches('/').is_empty() {
            return Err(Error::Invariant(
                "Refusing to delete the metadata store root".to_string(),
            ));
        }

        self.send(self.request(Method::DELETE, path), "delete", path)
            .await?;
        Ok(())
    }
}
