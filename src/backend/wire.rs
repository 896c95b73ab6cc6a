//! JSON shapes returned by the analysis service.
//!
//! The service reports most failures in-band (`{"status": "error",
//! "error": "..."}`) with a 200 status, so every response is decoded
//! into one of these structs first and then checked.

use super::{BackendError, CachedAnalysis, ScrapeAnalysis, ScrapeOutput, TagSearchPage, UrlCheck};
use crate::models::{AnalyzedItem, PopularTag};
use serde::Deserialize;

fn is_error(status: Option<&str>) -> bool {
    matches!(status, Some(s) if s.eq_ignore_ascii_case("error"))
}

fn remote_error(error: Option<String>) -> BackendError {
    BackendError::Remote(error.unwrap_or_else(|| "unknown error".to_string()))
}

/// `GET /check-url`
#[derive(Debug, Deserialize)]
pub struct CheckUrlResponse {
    #[serde(default)]
    pub exists: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CheckUrlResponse {
    pub fn into_check(self) -> Result<UrlCheck, BackendError> {
        if is_error(self.status.as_deref()) || self.error.is_some() {
            return Err(remote_error(self.error));
        }
        let exists = self
            .exists
            .ok_or_else(|| BackendError::Decode("missing 'exists' field".to_string()))?;
        Ok(UrlCheck {
            exists,
            message: self.message,
        })
    }
}

/// `GET /get-cached`
#[derive(Debug, Deserialize)]
pub struct CachedResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub response: Option<AnalyzedItem>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CachedResponse {
    pub fn into_cached(self, requested_url: &str) -> Result<CachedAnalysis, BackendError> {
        if is_error(self.status.as_deref()) {
            return Err(remote_error(self.error));
        }
        let mut item = self
            .response
            .ok_or_else(|| BackendError::Decode("missing 'response' object".to_string()))?;
        if item.url.is_empty() {
            item.url = requested_url.to_string();
        }
        Ok(CachedAnalysis {
            item,
            message: self.message,
        })
    }
}

/// `GET /scrape` and `GET /custom-summary`
#[derive(Debug, Deserialize)]
pub struct ScrapeResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub response: Option<ScrapeAnalysis>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub new_tags: Vec<String>,
}

impl ScrapeResponse {
    /// The placeholder `response` sent next to an error is discarded.
    pub fn into_output(self) -> Result<ScrapeOutput, BackendError> {
        if is_error(self.status.as_deref()) {
            return Err(remote_error(self.error));
        }
        let analysis = self
            .response
            .ok_or_else(|| BackendError::Decode("missing 'response' object".to_string()))?;
        Ok(ScrapeOutput {
            analysis,
            text: self.text.filter(|t| !t.is_empty()),
            new_tags: self.new_tags,
        })
    }
}

/// `GET /search-by-tags`
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Vec<AnalyzedItem>,
    #[serde(default)]
    pub searched_tags: Vec<String>,
    #[serde(default)]
    pub related_tags: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn into_page(self) -> Result<TagSearchPage, BackendError> {
        if is_error(self.status.as_deref()) {
            return Err(remote_error(self.error));
        }
        Ok(TagSearchPage {
            results: self.results,
            searched_tags: self.searched_tags,
            related_tags: self.related_tags,
        })
    }
}

/// `GET /scrapes`
#[derive(Debug, Deserialize)]
pub struct ScrapesResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub scrapes: Vec<AnalyzedItem>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScrapesResponse {
    pub fn into_items(self) -> Result<Vec<AnalyzedItem>, BackendError> {
        if is_error(self.status.as_deref()) {
            return Err(remote_error(self.error));
        }
        Ok(self.scrapes)
    }
}

/// `GET /tags`
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub tags: Vec<PopularTag>,
}
