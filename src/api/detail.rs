//! Single-record lookups for detail previews, cached with a short TTL.

use std::time::Duration;

use moka::future::Cache;

use super::{ArchiveClient, FetchError, Story, User};
use crate::retry::{RetryConfig, with_retry_if};

/// Detail lookups keyed by record id. Concurrent lookups of the same id are
/// coalesced into one request by moka's `try_get_with`.
pub struct DetailCache {
    client: ArchiveClient,
    retry: RetryConfig,
    users: Cache<String, User>,
    stories: Cache<String, Story>,
}

impl DetailCache {
    pub fn new(client: ArchiveClient, retry: RetryConfig, capacity: u64, ttl: Duration) -> Self {
        Self {
            client,
            retry,
            users: Self::create_cache(capacity, ttl),
            stories: Self::create_cache(capacity, ttl),
        }
    }

    fn create_cache<V: Clone + Send + Sync + 'static>(capacity: u64, ttl: Duration) -> Cache<String, V> {
        Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build()
    }

    pub async fn user(&self, uuid: &str) -> Result<User, FetchError> {
        let lookup = with_retry_if(&self.retry, || self.client.user(uuid), FetchError::is_retryable);
        self.users
            .try_get_with(uuid.to_string(), lookup)
            .await
            .map_err(|e| (*e).clone())
    }

    pub async fn story(&self, story_id: &str) -> Result<Story, FetchError> {
        let lookup = with_retry_if(
            &self.retry,
            || self.client.story(story_id),
            FetchError::is_retryable,
        );
        self.stories
            .try_get_with(story_id.to_string(), lookup)
            .await
            .map_err(|e| (*e).clone())
    }
}
