use super::MediaProvider;
use crate::models::{ImageCandidate, Orientation};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum MockFailure {
    Transient,
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub query: String,
    pub count: usize,
    pub orientation: Orientation,
}

#[derive(Clone)]
pub struct MockMediaProvider {
    candidates: Arc<Mutex<Option<Vec<ImageCandidate>>>>,
    failures: Arc<Mutex<VecDeque<MockFailure>>>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl MockMediaProvider {
    pub fn new() -> Self {
        Self {
            candidates: Arc::new(Mutex::new(None)),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Return exactly these candidates regardless of the requested count.
    pub fn with_candidates(self, candidates: Vec<ImageCandidate>) -> Self {
        *self.candidates.lock().unwrap() = Some(candidates);
        self
    }

    /// Queue one retryable failure (HTTP 503) before answering normally.
    pub fn with_transient_failure(self) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push_back(MockFailure::Transient);
        self
    }

    /// Queue a response that is not a list of photos.
    pub fn with_malformed_response(self) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push_back(MockFailure::Malformed);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn get_requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockMediaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProvider for MockMediaProvider {
    async fn fetch_random(
        &self,
        query: &str,
        count: usize,
        orientation: Orientation,
    ) -> Result<Vec<ImageCandidate>> {
        self.requests.lock().unwrap().push(FetchRequest {
            query: query.to_string(),
            count,
            orientation,
        });

        let failure = self.failures.lock().unwrap().pop_front();
        match failure {
            Some(MockFailure::Transient) => {
                return Err(Error::Provider {
                    status: 503,
                    body: "Mock provider unavailable".to_string(),
                })
            }
            Some(MockFailure::Malformed) => {
                return Err(Error::MalformedResponse(
                    "Expected a JSON array of photos, got an object".to_string(),
                ))
            }
            None => {}
        }

        let configured = self.candidates.lock().unwrap().clone();
        Ok(configured.unwrap_or_else(|| {
            (0..count)
                .map(|i| {
                    ImageCandidate::new(
                        format!("https://images.mock/{}/{}", query, i),
                        Some(format!("Photographer {}", i)),
                    )
                })
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_default_candidates() {
        let provider = MockMediaProvider::new();

        let candidates = provider
            .fetch_random("sunrise", 3, Orientation::Portrait)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 3);
        assert!(candidates[0].source_url.contains("sunrise"));
        assert_eq!(provider.get_call_count(), 1);
        assert_eq!(provider.get_requests()[0].orientation, Orientation::Portrait);
    }

    #[tokio::test]
    async fn test_mock_provider_failures_are_consumed_in_order() {
        let provider = MockMediaProvider::new()
            .with_transient_failure()
            .with_malformed_response();

        let first = provider.fetch_random("q", 1, Orientation::Portrait).await;
        let second = provider.fetch_random("q", 1, Orientation::Portrait).await;
        let third = provider.fetch_random("q", 1, Orientation::Portrait).await;

        assert!(matches!(first, Err(Error::Provider { status: 503, .. })));
        assert!(matches!(second, Err(Error::MalformedResponse(_))));
        assert_eq!(third.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_configured_candidates() {
        let provider = MockMediaProvider::new()
            .with_candidates(vec![ImageCandidate::new("https://images.mock/only", None)]);

        let candidates = provider
            .fetch_random("q", 10, Orientation::Portrait)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
    }
}
