//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.
//! Setup and acquisition errors abort a run; retention and per-item errors
//! are captured by the orchestrator and reported instead of propagated.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Media provider error (status {status}): {body}")]
    Provider { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Image acquisition failed: {0}")]
    Acquisition(String),

    #[error("S3/CDN error: {0}")]
    ObjectStore(String),

    #[error("Metadata store error: {0}")]
    MetadataStore(String),

    #[error("Retention error: {0}")]
    Retention(String),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl Error {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_classification() {
        let throttled = Error::Provider {
            status: 429,
            body: "Rate Limit Exceeded".to_string(),
        };
        let unavailable = Error::Provider {
            status: 503,
            body: String::new(),
        };
        let unauthorized = Error::Provider {
            status: 401,
            body: "OAuth error".to_string(),
        };

        assert!(throttled.is_transient());
        assert!(unavailable.is_transient());
        assert!(!unauthorized.is_transient());
    }

    #[test]
    fn test_malformed_response_is_not_retried() {
        let err = Error::MalformedResponse("expected a JSON array".to_string());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("expected a JSON array"));
    }
}
