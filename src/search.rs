//! Tag search client.
//!
//! Looks up analyzed items by tag (ANY-match, backend-defined order) and
//! exposes the service's tag statistics.

use crate::backend::AnalysisBackend;
use crate::error::{LinkError, Result};
use crate::models::{normalize_tags, AnalyzedItem, PopularTag, TagSearchResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of popular tags shown when no limit is given.
pub const DEFAULT_POPULAR_LIMIT: usize = 10;

/// Split a comma-separated query into normalized tags.
pub fn parse_tag_query(query: &str) -> Vec<String> {
    normalize_tags(query.split(','))
}

pub struct TagSearchClient {
    backend: Arc<dyn AnalysisBackend>,
}

impl TagSearchClient {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    /// Items carrying any of `tags`, in the order the service returns them.
    ///
    /// The same item is not deduplicated when several tags match it.
    pub async fn search<S: AsRef<str>>(&self, tags: &[S]) -> Result<Vec<AnalyzedItem>> {
        Ok(self.search_detailed(tags).await?.items)
    }

    /// Like [`search`](Self::search), also returning the searched and
    /// related tags.
    pub async fn search_detailed<S: AsRef<str>>(&self, tags: &[S]) -> Result<TagSearchResult> {
        let tags = normalize_tags(tags.iter().map(AsRef::as_ref));
        if tags.is_empty() {
            return Err(LinkError::Validation(
                "Please enter at least one tag.".to_string(),
            ));
        }

        let joined = tags.join(",");
        debug!("Searching tags [{}]", joined);

        let page = self.backend.search_by_tags(&tags).await.map_err(|source| {
            warn!("Tag search for [{}] failed: {}", joined, source);
            LinkError::Search {
                tags: joined.clone(),
                source,
            }
        })?;

        info!("Tag search [{}] returned {} item(s)", joined, page.results.len());
        Ok(TagSearchResult {
            items: page.results,
            searched_tags: if page.searched_tags.is_empty() {
                tags
            } else {
                page.searched_tags
            },
            related_tags: page.related_tags,
        })
    }

    /// The `limit` most used tags, most used first.
    pub async fn popular_tags(&self, limit: usize) -> Result<Vec<PopularTag>> {
        let mut tags = self
            .backend
            .popular_tags()
            .await
            .map_err(|source| LinkError::Listing {
                what: "popular tags",
                source,
            })?;

        // Stable, so equal counts keep the service's order.
        tags.sort_by(|a, b| b.count.cmp(&a.count));
        tags.truncate(limit);
        Ok(tags)
    }

    /// Every analyzed item the service knows about.
    pub async fn list_all(&self) -> Result<Vec<AnalyzedItem>> {
        self.backend
            .list_items()
            .await
            .map_err(|source| LinkError::Listing {
                what: "analyzed items",
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{item, FakeBackend, Op};
    use crate::error::ErrorKind;
    use std::sync::atomic::Ordering;

    fn create_test_client() -> (Arc<FakeBackend>, TagSearchClient) {
        let fake = Arc::new(
            FakeBackend::new()
                .with_item(item("https://a.example/1", &["ai"], 7, 30))
                .with_item(item("https://b.example/2", &["ml"], 5, 20))
                .with_item(item("https://c.example/3", &["web"], 9, 10))
                .with_item(item("https://d.example/4", &["ai", "web"], 4, 5)),
        );
        (fake.clone(), TagSearchClient::new(fake))
    }

    #[test]
    fn test_parse_tag_query() {
        assert_eq!(parse_tag_query("AI, ml,,ai "), vec!["ai", "ml"]);
        assert!(parse_tag_query(" , ").is_empty());
    }

    #[tokio::test]
    async fn test_search_is_any_match() {
        let (_fake, client) = create_test_client();
        let items = client.search(&["ai", "ml"]).await.unwrap();

        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.example/1", "https://b.example/2", "https://d.example/4"]
        );
    }

    #[tokio::test]
    async fn test_empty_tags_rejected_before_network() {
        let (fake, client) = create_test_client();
        let empty: [&str; 0] = [];

        let err = client.search(&empty).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = client.search(&["  ", ""]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fake.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_failure_is_search_error() {
        let (fake, client) = create_test_client();
        fake.fail(Op::Search);
        let err = client.search(&["ai"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Search);
    }

    #[tokio::test]
    async fn test_search_detailed_reports_searched_tags() {
        let (_fake, client) = create_test_client();
        let result = client.search_detailed(&["AI"]).await.unwrap();
        assert_eq!(result.searched_tags, vec!["ai"]);
        assert_eq!(result.items.len(), 2);
    }

    #[tokio::test]
    async fn test_popular_tags_sorted_and_limited() {
        let (_fake, client) = create_test_client();
        let tags = client.popular_tags(2).await.unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "ai");
        assert_eq!(tags[0].count, 2);
        assert_eq!(tags[1].name, "web");
    }

    #[tokio::test]
    async fn test_list_failure_is_listing_error() {
        let (fake, client) = create_test_client();
        fake.fail(Op::List);
        assert_eq!(client.list_all().await.unwrap_err().kind(), ErrorKind::Listing);
    }

    #[tokio::test]
    async fn test_popular_tags_failure_is_listing_error() {
        let (fake, client) = create_test_client();
        fake.fail(Op::Tags);
        let err = client.popular_tags(DEFAULT_POPULAR_LIMIT).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Listing);
    }
}
