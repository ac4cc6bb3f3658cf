//! HTTP client for the archive API

use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use super::error::classify_failure;
use super::{FetchError, ListResult, Page, Resource, Story, User};
use crate::config::ApiConfig;
use crate::fetch::ListSource;
use crate::query::QueryState;

/// Archive API client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ArchiveClient {
    http: Client,
    base_url: String,
}

impl ArchiveClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("Invalid API base URL: {base_url}"))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, FetchError> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| FetchError::Transport(format!("invalid request URL: {e}")))
    }

    /// Full request URL for one page of a resource
    pub fn list_url(
        &self,
        resource: &Resource,
        query: &QueryState,
        page_size: u32,
    ) -> Result<Url, FetchError> {
        let mut url = self.url(&resource.path())?;
        url.query_pairs_mut()
            .extend_pairs(resource.query_params(query, page_size));
        Ok(url)
    }

    /// Fetch one page of a resource
    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: &Resource,
        query: &QueryState,
        page_size: u32,
    ) -> Result<ListResult<T>, FetchError> {
        let url = self.list_url(resource, query, page_size)?;
        tracing::debug!("GET {}", url);
        let page: Page<T> = self.get_json(url).await?;
        Ok(ListResult::from_page(page, page_size))
    }

    /// Fetch a single profile
    pub async fn user(&self, uuid: &str) -> Result<User, FetchError> {
        let url = self.url(&format!("{}{uuid}/", Resource::Users.path()))?;
        self.get_json(url).await
    }

    /// Fetch a single story
    pub async fn story(&self, story_id: &str) -> Result<Story, FetchError> {
        let url = self.url(&format!("{}{story_id}/", Resource::Stories.path()))?;
        self.get_json(url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

/// One list resource of the archive, bound to its record type
pub struct Endpoint<T> {
    client: ArchiveClient,
    resource: Resource,
    page_size: u32,
    _item: PhantomData<fn() -> T>,
}

impl<T> Endpoint<T> {
    pub fn new(client: ArchiveClient, resource: Resource, page_size: u32) -> Self {
        Self {
            client,
            resource,
            page_size: page_size.max(1),
            _item: PhantomData,
        }
    }
}

impl<T> ListSource for Endpoint<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Item = T;

    async fn fetch(&self, query: &QueryState) -> Result<ListResult<T>, FetchError> {
        self.client
            .list(&self.resource, query, self.page_size)
            .await
    }
}
