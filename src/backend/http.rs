//! HTTP/JSON binding of the analysis service.

use super::wire::{
    CachedResponse, CheckUrlResponse, ScrapeResponse, ScrapesResponse, SearchResponse,
    TagsResponse,
};
use super::{
    AnalysisBackend, BackendError, CachedAnalysis, ScrapeOutput, TagSearchPage, UrlCheck,
};
use crate::config::BackendConfig;
use crate::models::{AnalyzedItem, PopularTag, Preferences};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Analysis service reached over HTTP.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    timeout_seconds: u64,
}

impl HttpBackend {
    /// Create a client for the service described by `config`.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut base_url = Url::parse(&config.base_url)?;
        // Endpoints are joined relative to the base, which needs a trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Build the URL of `endpoint` with the given query parameters.
    fn endpoint(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Url, BackendError> {
        let mut url = self.base_url.join(endpoint)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout_seconds)
            } else if e.is_connect() {
                BackendError::Connect(self.base_url.to_string())
            } else {
                BackendError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        let url = self.endpoint(endpoint, query)?;
        debug!("GET {}", url);
        self.send_json(self.client.get(url)).await
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn check_url(&self, url: &str) -> Result<UrlCheck, BackendError> {
        self.get::<CheckUrlResponse>("check-url", &[("url", url)])
            .await?
            .into_check()
    }

    async fn get_cached(&self, url: &str) -> Result<CachedAnalysis, BackendError> {
        self.get::<CachedResponse>("get-cached", &[("url", url)])
            .await?
            .into_cached(url)
    }

    async fn scrape(
        &self,
        url: &str,
        preferences: Option<&Preferences>,
    ) -> Result<ScrapeOutput, BackendError> {
        let response: ScrapeResponse = match preferences {
            Some(prefs) => {
                self.get(
                    "custom-summary",
                    &[
                        ("url", url),
                        ("length", prefs.length.as_str()),
                        ("style", prefs.style.as_str()),
                    ],
                )
                .await?
            }
            None => self.get("scrape", &[("url", url)]).await?,
        };
        response.into_output()
    }

    async fn search_by_tags(&self, tags: &[String]) -> Result<TagSearchPage, BackendError> {
        let joined = tags.join(",");
        self.get::<SearchResponse>("search-by-tags", &[("tags", joined.as_str())])
            .await?
            .into_page()
    }

    async fn list_items(&self) -> Result<Vec<AnalyzedItem>, BackendError> {
        self.get::<ScrapesResponse>("scrapes", &[]).await?.into_items()
    }

    async fn popular_tags(&self) -> Result<Vec<PopularTag>, BackendError> {
        Ok(self.get::<TagsResponse>("tags", &[]).await?.tags)
    }

    async fn ask(&self, question: &str) -> Result<serde_json::Value, BackendError> {
        let url = self.endpoint("ask", &[("question", question)])?;
        debug!("POST {}", url);
        self.send_json(self.client.post(url)).await
    }
}
