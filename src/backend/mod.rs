//! Client side of the remote analysis service.
//!
//! The service does the scraping, summarizing and grading; this crate only
//! consumes its results. [`AnalysisBackend`] is the seam: the CLI talks to
//! the real service through [`HttpBackend`], tests use an in-memory fake.

pub mod http;
pub mod wire;

#[cfg(test)]
pub mod fake;

pub use http::HttpBackend;

use crate::models::{AnalyzedItem, Badge, PopularTag, Preferences};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failure talking to the analysis service.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to the analysis service at {0}")]
    Connect(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    /// The service answered with `status: "error"`.
    #[error("Service reported an error: {0}")]
    Remote(String),

    #[error("Invalid service URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Answer of the existence check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlCheck {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A previously stored analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnalysis {
    pub item: AnalyzedItem,
    pub message: Option<String>,
}

/// The analysis part of a scrape response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeAnalysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "crate::models::deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "crate::models::deserialize_grade")]
    pub grade: u8,
    #[serde(default)]
    pub badge: Badge,
}

/// A successful scrape-and-analyze answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOutput {
    pub analysis: ScrapeAnalysis,
    /// Leading part of the extracted page text.
    pub text: Option<String>,
    /// Tags the service saw for the first time.
    pub new_tags: Vec<String>,
}

/// A page of tag search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSearchPage {
    pub results: Vec<AnalyzedItem>,
    pub searched_tags: Vec<String>,
    pub related_tags: Vec<String>,
}

/// Logical operations offered by the analysis service.
///
/// Implementations turn service-reported errors (`status: "error"`) into
/// [`BackendError::Remote`], so every `Ok` carries a usable payload.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Whether `url` already has a stored analysis.
    async fn check_url(&self, url: &str) -> Result<UrlCheck, BackendError>;

    /// Fetch the stored analysis for `url`.
    async fn get_cached(&self, url: &str) -> Result<CachedAnalysis, BackendError>;

    /// Scrape and analyze `url`, registering the result on the service.
    async fn scrape(
        &self,
        url: &str,
        preferences: Option<&Preferences>,
    ) -> Result<ScrapeOutput, BackendError>;

    /// Items carrying ANY of `tags`, in service-defined order.
    async fn search_by_tags(&self, tags: &[String]) -> Result<TagSearchPage, BackendError>;

    /// Every analyzed item.
    async fn list_items(&self) -> Result<Vec<AnalyzedItem>, BackendError>;

    /// Tag statistics.
    async fn popular_tags(&self) -> Result<Vec<PopularTag>, BackendError>;

    /// Free-text question. The payload shape is loosely defined, so it is
    /// returned as raw JSON.
    async fn ask(&self, question: &str) -> Result<serde_json::Value, BackendError>;
}
