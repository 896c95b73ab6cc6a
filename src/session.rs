//! One user session: the components wired together.
//!
//! Successful analyses and search results always land in the feed pool.
//! What the session *displays* as "the current analysis" or "the current
//! search" is guarded by request tickets, so a slow answer to an older
//! request never replaces the answer to a newer one.

use crate::analysis::{Latest, RequestOrchestrator};
use crate::backend::AnalysisBackend;
use crate::chat::{AskMode, ChatBridge};
use crate::error::Failure;
use crate::feeds::FeedAggregator;
use crate::models::{AnalysisOutcome, Preferences, TagSearchResult};
use crate::search::{parse_tag_query, TagSearchClient};
use std::sync::Arc;
use tracing::debug;

pub type AnalysisResult = Result<AnalysisOutcome, Failure>;
pub type SearchResult = Result<TagSearchResult, Failure>;

pub struct Session {
    orchestrator: RequestOrchestrator,
    search: TagSearchClient,
    feeds: FeedAggregator,
    chat: ChatBridge,
    current_analysis: Latest<AnalysisResult>,
    current_search: Latest<SearchResult>,
}

impl Session {
    pub fn new(backend: Arc<dyn AnalysisBackend>, feeds: FeedAggregator, mode: AskMode) -> Self {
        Self {
            orchestrator: RequestOrchestrator::new(backend.clone()),
            search: TagSearchClient::new(backend.clone()),
            chat: ChatBridge::new(backend, mode),
            feeds,
            current_analysis: Latest::new(),
            current_search: Latest::new(),
        }
    }

    pub fn orchestrator(&self) -> &RequestOrchestrator {
        &self.orchestrator
    }

    pub fn search(&self) -> &TagSearchClient {
        &self.search
    }

    pub fn feeds(&self) -> &FeedAggregator {
        &self.feeds
    }

    pub fn chat(&self) -> &ChatBridge {
        &self.chat
    }

    /// Analyze `url`, pool the item and make it the current analysis unless
    /// a newer submission was made meanwhile.
    pub async fn submit_url(&self, url: &str, preferences: Option<Preferences>) -> AnalysisResult {
        let ticket = self.current_analysis.begin();

        let result = self
            .orchestrator
            .analyze_with(url, preferences)
            .await
            .map_err(Failure::from);

        if let Ok(ref outcome) = result {
            self.feeds.ingest([outcome.item.clone()]);
        }
        if !self.current_analysis.apply(ticket, result.clone()) {
            debug!(
                "Analysis of {} (request #{}) superseded by a newer submission",
                url,
                ticket.value()
            );
        }
        result
    }

    /// Search by a comma-separated tag query; same guarding as
    /// [`submit_url`](Self::submit_url).
    pub async fn submit_search(&self, query: &str) -> SearchResult {
        let ticket = self.current_search.begin();

        let result = self
            .search
            .search_detailed(&parse_tag_query(query))
            .await
            .map_err(Failure::from);

        if let Ok(ref found) = result {
            self.feeds.ingest(found.items.iter().cloned());
        }
        if !self.current_search.apply(ticket, result.clone()) {
            debug!(
                "Search '{}' (request #{}) superseded by a newer query",
                query,
                ticket.value()
            );
        }
        result
    }

    pub fn current_analysis(&self) -> Option<AnalysisResult> {
        self.current_analysis.get()
    }

    pub fn current_search(&self) -> Option<SearchResult> {
        self.current_search.get()
    }
}
