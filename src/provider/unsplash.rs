use super::MediaProvider;
use crate::models::{ImageCandidate, Orientation};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    id: Option<String>,
    urls: UnsplashUrls,
    user: Option<UnsplashUser>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashUser {
    name: Option<String>,
}

impl From<UnsplashPhoto> for ImageCandidate {
    fn from(photo: UnsplashPhoto) -> Self {
        ImageCandidate::new(photo.urls.regular, photo.user.and_then(|user| user.name))
    }
}

/// Client for the Unsplash `/photos/random` endpoint.
pub struct UnsplashClient {
    client: Client,
    access_key: String,
    base_url: String,
}

impl UnsplashClient {
    pub fn new(access_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(access_key, client))
    }

    pub fn new_with_client(access_key: String, client: Client) -> Self {
        Self {
            client,
            access_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn parse_photos(body: &str) -> Result<Vec<ImageCandidate>> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::MalformedResponse(format!("Body is not JSON: {}", e)))?;

        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(Error::MalformedResponse(format!(
                    "Expected a JSON array of photos, got {}",
                    json_kind(&other)
                )))
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<UnsplashPhoto>(item)
                    .map(|photo| {
                        tracing::debug!("Photo {} -> {:?}", index, photo.id);
                        ImageCandidate::from(photo)
                    })
                    .map_err(|e| {
                        Error::MalformedResponse(format!("Photo at index {} is invalid: {}", index, e))
                    })
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl MediaProvider for UnsplashClient {
    async fn fetch_random(
        &self,
        query: &str,
        count: usize,
        orientation: Orientation,
    ) -> Result<Vec<ImageCandidate>> {
        let url = format!("{}/photos/random", self.base_url);
        let count = count.to_string();

        tracing::debug!("Requesting {} random photos for query '{}'", count, query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .header("Accept-Version", "v1")
            .query(&[
                ("query", query),
                ("count", count.as_str()),
                ("orientation", orientation.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to Unsplash: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Unsplash API error (status {}): {}", status, error_text);
            return Err(Error::Provider {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let body = response.text().await?;
        Self::parse_photos(&body).map_err(|e| {
            tracing::error!("Failed to parse Unsplash response: {}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> UnsplashClient {
        UnsplashClient::new("test-key".to_string(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_fetch_random_maps_photos() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/photos/random"))
            .and(query_param("query", "nature"))
            .and(query_param("count", "2"))
            .and(query_param("orientation", "portrait"))
            .and(header("Authorization", "Client-ID test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "abc",
                    "urls": { "raw": "https://images.test/abc?raw", "regular": "https://images.test/abc" },
                    "user": { "name": "Dorothea Lange" }
                },
                {
                    "id": "def",
                    "urls": { "regular": "https://images.test/def" },
                    "user": { "name": null }
                }
            ])))
            .mount(&server)
            .await;

        let candidates = client_for(&server)
            .fetch_random("nature", 2, Orientation::Portrait)
            .await
            .unwrap();

        assert_eq!(
            candidates,
            vec![
                ImageCandidate::new("https://images.test/abc", Some("Dorothea Lange".to_string())),
                ImageCandidate::new("https://images.test/def", None),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_random_rejects_non_array_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/photos/random"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": ["Rate Limit Exceeded"]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_random("nature", 5, Orientation::Portrait)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedResponse(_)));
        assert!(err.to_string().contains("an object"));
    }

    #[tokio::test]
    async fn test_fetch_random_rejects_photo_without_url() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/photos/random"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "id": "x" }])),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_random("nature", 1, Orientation::Portrait)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_random_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/photos/random"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_random("nature", 1, Orientation::Portrait)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_photos_rejects_plain_text() {
        let err = UnsplashClient::parse_photos("Rate Limit Exceeded").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }
}
