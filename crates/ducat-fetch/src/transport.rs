//! The request seam between the fetch logic and the network.

use async_trait::async_trait;
use bytes::Bytes;

use crate::AttemptError;

/// Performs single GET attempts against the datafeed.
///
/// Implementations make exactly one attempt per call; retries, backoff and
/// circuit breaking live in [`crate::DayFetcher`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the base URL that day and hour paths are appended to.
    fn base_url(&self) -> &str;

    /// Fetches `url` once.
    ///
    /// Returns `Ok(None)` if the resource does not exist, which the feed uses
    /// for hours without data.
    async fn get(&self, url: &str) -> Result<Option<Bytes>, AttemptError>;
}
