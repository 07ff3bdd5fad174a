//! Media provider integration for acquiring candidate images
//!
//! Fetches batches of random, orientation-filtered photos from Unsplash and
//! exposes them as provider-neutral [`ImageCandidate`]s.

pub mod mock;
pub mod unsplash;

pub use mock::MockMediaProvider;
pub use unsplash::UnsplashClient;

use crate::models::{ImageCandidate, Orientation};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Fetch up to `count` random images matching `query`.
    ///
    /// Implementations must return [`crate::Error::MalformedResponse`] rather
    /// than panic when the provider answers with anything other than a list.
    async fn fetch_random(
        &self,
        query: &str,
        count: usize,
        orientation: Orientation,
    ) -> Result<Vec<ImageCandidate>>;
}
