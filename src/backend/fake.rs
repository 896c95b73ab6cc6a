//! In-memory analysis service for tests.

use super::{
    AnalysisBackend, BackendError, CachedAnalysis, ScrapeAnalysis, ScrapeOutput, TagSearchPage,
    UrlCheck,
};
use crate::models::{AnalyzedItem, Badge, PopularTag, Preferences};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Operation that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Check,
    Cached,
    Scrape,
    Search,
    List,
    Tags,
    Ask,
}

pub struct FakeBackend {
    items: Mutex<Vec<AnalyzedItem>>,
    analysis: ScrapeAnalysis,
    failing: Mutex<Vec<Op>>,
    /// The existence check always answers "not found".
    pub existence_lags: AtomicBool,
    delay: Duration,
    slow: Mutex<HashMap<String, Duration>>,
    ask_reply: Mutex<serde_json::Value>,
    pub check_calls: AtomicUsize,
    pub cached_calls: AtomicUsize,
    pub scrape_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub ask_calls: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            analysis: ScrapeAnalysis {
                summary: "A fresh analysis.".to_string(),
                tags: vec!["ai".to_string()],
                grade: 7,
                badge: Badge::Silver,
            },
            failing: Mutex::new(Vec::new()),
            existence_lags: AtomicBool::new(false),
            delay: Duration::ZERO,
            slow: Mutex::new(HashMap::new()),
            ask_reply: Mutex::new(serde_json::json!({})),
            check_calls: AtomicUsize::new(0),
            cached_calls: AtomicUsize::new(0),
            scrape_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            ask_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register an analyzed item.
    pub fn with_item(self, item: AnalyzedItem) -> Self {
        self.items.lock().unwrap().push(item);
        self
    }

    /// What every scrape returns.
    pub fn with_analysis(mut self, analysis: ScrapeAnalysis) -> Self {
        self.analysis = analysis;
        self
    }

    /// Delay applied to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Extra delay for calls whose URL or comma-joined tags equal `key`.
    pub fn with_slow(self, key: &str, delay: Duration) -> Self {
        self.slow.lock().unwrap().insert(key.to_string(), delay);
        self
    }

    pub fn with_ask_reply(self, reply: serde_json::Value) -> Self {
        *self.ask_reply.lock().unwrap() = reply;
        self
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().push(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.lock().unwrap().retain(|o| *o != op);
    }

    fn check_failure(&self, op: Op) -> Result<(), BackendError> {
        if self.failing.lock().unwrap().contains(&op) {
            Err(BackendError::Remote(format!("{:?} failed", op)))
        } else {
            Ok(())
        }
    }

    async fn pause(&self, key: &str) {
        let extra = self.slow.lock().unwrap().get(key).copied();
        let total = self.delay + extra.unwrap_or_default();
        if !total.is_zero() {
            tokio::time::sleep(total).await;
        }
    }

    fn find(&self, url: &str) -> Option<AnalyzedItem> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.url == url)
            .cloned()
    }
}

#[async_trait]
impl AnalysisBackend for FakeBackend {
    async fn check_url(&self, url: &str) -> Result<UrlCheck, BackendError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(url).await;
        self.check_failure(Op::Check)?;

        let exists = !self.existence_lags.load(Ordering::SeqCst) && self.find(url).is_some();
        Ok(UrlCheck {
            exists,
            message: exists.then(|| "This URL was previously scraped".to_string()),
        })
    }

    async fn get_cached(&self, url: &str) -> Result<CachedAnalysis, BackendError> {
        self.cached_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(url).await;
        self.check_failure(Op::Cached)?;

        let item = self
            .find(url)
            .ok_or_else(|| BackendError::Remote("URL not found in cache".to_string()))?;
        Ok(CachedAnalysis {
            item,
            message: Some("Retrieved from cache".to_string()),
        })
    }

    async fn scrape(
        &self,
        url: &str,
        preferences: Option<&Preferences>,
    ) -> Result<ScrapeOutput, BackendError> {
        self.scrape_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(url).await;
        self.check_failure(Op::Scrape)?;

        // Register the way the real service does.
        self.items.lock().unwrap().push(AnalyzedItem {
            url: url.to_string(),
            summary: self.analysis.summary.clone(),
            tags: self.analysis.tags.clone(),
            grade: self.analysis.grade,
            badge: self.analysis.badge.clone(),
            timestamp: Utc::now(),
            content: None,
            preferences: preferences.copied(),
        });

        Ok(ScrapeOutput {
            analysis: self.analysis.clone(),
            text: Some("page text".to_string()),
            new_tags: Vec::new(),
        })
    }

    async fn search_by_tags(&self, tags: &[String]) -> Result<TagSearchPage, BackendError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(&tags.join(",")).await;
        self.check_failure(Op::Search)?;

        let results: Vec<AnalyzedItem> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.has_any_tag(tags))
            .cloned()
            .collect();
        Ok(TagSearchPage {
            results,
            searched_tags: tags.to_vec(),
            related_tags: Vec::new(),
        })
    }

    async fn list_items(&self) -> Result<Vec<AnalyzedItem>, BackendError> {
        self.check_failure(Op::List)?;
        Ok(self.items.lock().unwrap().clone())
    }

    async fn popular_tags(&self) -> Result<Vec<PopularTag>, BackendError> {
        self.check_failure(Op::Tags)?;
        let mut counts: Vec<PopularTag> = Vec::new();
        for item in self.items.lock().unwrap().iter() {
            for tag in &item.tags {
                match counts.iter_mut().find(|t| &t.name == tag) {
                    Some(existing) => existing.count += 1,
                    None => counts.push(PopularTag {
                        name: tag.clone(),
                        count: 1,
                        created_at: None,
                    }),
                }
            }
        }
        Ok(counts)
    }

    async fn ask(&self, question: &str) -> Result<serde_json::Value, BackendError> {
        self.ask_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(question).await;
        self.check_failure(Op::Ask)?;
        Ok(self.ask_reply.lock().unwrap().clone())
    }
}

/// Build an item for tests.
pub fn item(url: &str, tags: &[&str], grade: u8, minutes_ago: i64) -> AnalyzedItem {
    AnalyzedItem {
        url: url.to_string(),
        summary: format!("Summary of {}", url),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        grade,
        badge: Badge::None,
        timestamp: Utc::now() - chrono::Duration::minutes(minutes_ago),
        content: None,
        preferences: None,
    }
}
