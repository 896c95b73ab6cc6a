//! Dedup-aware analysis of a single URL.
//!
//! `analyze` runs the existence check, then either fetches the stored
//! analysis or asks the service for a fresh one, and hands back a uniform
//! [`AnalysisOutcome`]. A URL is scraped at most once: concurrent calls for
//! the same URL are serialized, and the item of every URL analyzed in this
//! session is remembered. Later calls take the cached path even when the
//! service's existence check has not caught up yet, and they hand back that
//! same item.

use crate::backend::{AnalysisBackend, BackendError, ScrapeOutput};
use crate::error::{LinkError, Result};
use crate::models::{AnalysisOutcome, AnalyzedItem, Preferences};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

/// Where an `analyze` call for a URL currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    Checking,
    CacheHit,
    CacheMiss,
    FetchingCached,
    Scraping,
    Done,
    Failed,
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisState::Idle => "idle",
            AnalysisState::Checking => "checking",
            AnalysisState::CacheHit => "cache hit",
            AnalysisState::CacheMiss => "cache miss",
            AnalysisState::FetchingCached => "fetching cached",
            AnalysisState::Scraping => "scraping",
            AnalysisState::Done => "done",
            AnalysisState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Validate `raw` and return the key used for dedup.
///
/// The URL must be absolute http(s) with a host. The fragment never reaches
/// the server, so it is not part of the identity.
pub fn dedup_key(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LinkError::Validation("Please enter a URL.".to_string()));
    }

    let mut url = Url::parse(raw)
        .map_err(|e| LinkError::Validation(format!("'{}' is not a valid URL: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(LinkError::Validation(format!(
            "Only http and https URLs can be analyzed, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(LinkError::Validation(format!("'{}' has no host", raw)));
    }

    url.set_fragment(None);
    Ok(url.to_string())
}

/// Runs `analyze` against an [`AnalysisBackend`].
pub struct RequestOrchestrator {
    backend: Arc<dyn AnalysisBackend>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    analyzed: Mutex<HashMap<String, AnalyzedItem>>,
    states: Mutex<HashMap<String, AnalysisState>>,
}

/// Exclusive hold on the gate of one URL. The gate leaves the map once no
/// other caller holds or waits on it.
struct GateLease<'a> {
    orchestrator: &'a RequestOrchestrator,
    key: &'a str,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut gates = self
            .orchestrator
            .gates
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if gates.get(self.key).is_some_and(|g| Arc::strong_count(g) == 1) {
            gates.remove(self.key);
        }
    }
}

/// Tracks the state of one run. A run dropped before reaching `Done`
/// (error or cancelled future) ends in `Failed`.
struct Run<'a> {
    orchestrator: &'a RequestOrchestrator,
    key: &'a str,
    finished: bool,
}

impl<'a> Run<'a> {
    fn start(orchestrator: &'a RequestOrchestrator, key: &'a str) -> Self {
        let run = Self {
            orchestrator,
            key,
            finished: false,
        };
        run.enter(AnalysisState::Checking);
        run
    }

    fn enter(&self, state: AnalysisState) {
        debug!("{}: {}", self.key, state);
        self.orchestrator.set_state(self.key, state);
    }

    fn finish(mut self) {
        self.enter(AnalysisState::Done);
        self.finished = true;
    }
}

impl Drop for Run<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.enter(AnalysisState::Failed);
        }
    }
}

impl RequestOrchestrator {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self {
            backend,
            gates: Mutex::new(HashMap::new()),
            analyzed: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Analyze `url` with the service's default summary.
    pub async fn analyze(&self, url: &str) -> Result<AnalysisOutcome> {
        self.analyze_with(url, None).await
    }

    /// Analyze `url`, asking for a customized summary when the URL has to be
    /// scraped. Preferences are ignored on the cached path.
    pub async fn analyze_with(
        &self,
        url: &str,
        preferences: Option<Preferences>,
    ) -> Result<AnalysisOutcome> {
        let key = dedup_key(url)?;

        // Later callers for the same URL wait here and then see it as analyzed.
        let _lease = self.lease(&key).await;

        let run = Run::start(self, &key);

        let check = self
            .backend
            .check_url(&key)
            .await
            .map_err(|source| {
                warn!("Existence check for {} failed: {}", key, source);
                LinkError::Lookup {
                    url: key.clone(),
                    source,
                }
            })?;

        let remembered = self.analyzed_item(&key);
        if remembered.is_some() && !check.exists {
            debug!("{} analyzed earlier in this session, treating as cached", key);
        }

        let outcome = if check.exists || remembered.is_some() {
            run.enter(AnalysisState::CacheHit);
            run.enter(AnalysisState::FetchingCached);
            let cached = self.backend.get_cached(&key).await.map_err(|source| {
                warn!("Fetching cached analysis for {} failed: {}", key, source);
                LinkError::CacheRetrieval {
                    url: key.clone(),
                    source,
                }
            })?;

            info!("Using cached analysis for {}", key);
            AnalysisOutcome {
                // The item handed out first stays the item for this URL.
                item: remembered.unwrap_or(cached.item),
                was_cached: true,
                message: check.message.or(cached.message),
            }
        } else {
            run.enter(AnalysisState::CacheMiss);
            run.enter(AnalysisState::Scraping);
            let output = self
                .backend
                .scrape(&key, preferences.as_ref())
                .await
                .map_err(|source| {
                    warn!("Analysis of {} failed: {}", key, source);
                    LinkError::Analysis {
                        url: key.clone(),
                        source,
                    }
                })?;

            if !output.new_tags.is_empty() {
                debug!("First use of tag(s): {}", output.new_tags.join(", "));
            }
            let item = normalize_scrape(&key, output, preferences)?;
            info!(
                "Analyzed {}: grade {}, badge {}, {} tag(s)",
                key,
                item.grade,
                item.badge,
                item.tags.len()
            );
            AnalysisOutcome {
                item,
                was_cached: false,
                message: None,
            }
        };

        self.remember(&key, &outcome.item);
        run.finish();
        Ok(outcome)
    }

    /// Current state of the last `analyze` run for `url`.
    pub fn state(&self, url: &str) -> AnalysisState {
        let Ok(key) = dedup_key(url) else {
            return AnalysisState::Idle;
        };
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .copied()
            .unwrap_or(AnalysisState::Idle)
    }

    async fn lease<'a>(&'a self, key: &'a str) -> GateLease<'a> {
        let gate = self
            .gates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.to_string())
            .or_default()
            .clone();

        let mut lease = GateLease {
            orchestrator: self,
            key,
            guard: None,
        };
        lease.guard = Some(gate.lock_owned().await);
        lease
    }

    fn analyzed_item(&self, key: &str) -> Option<AnalyzedItem> {
        self.analyzed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn remember(&self, key: &str, item: &AnalyzedItem) {
        self.analyzed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.to_string())
            .or_insert_with(|| item.clone());
    }

    /// Number of URLs with a live gate.
    #[cfg(test)]
    fn open_gates(&self) -> usize {
        self.gates.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn set_state(&self, key: &str, state: AnalysisState) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), state);
    }
}

/// Turn a fresh scrape into an item, rejecting analyses that are unusable.
fn normalize_scrape(
    url: &str,
    output: ScrapeOutput,
    preferences: Option<Preferences>,
) -> Result<AnalyzedItem> {
    let analysis = output.analysis;

    let reject = |reason: String| LinkError::Analysis {
        url: url.to_string(),
        source: BackendError::Decode(reason),
    };
    if analysis.tags.is_empty() {
        return Err(reject("analysis returned no tags".to_string()));
    }
    if !(1..=10).contains(&analysis.grade) {
        return Err(reject(format!(
            "analysis returned no usable grade ({})",
            analysis.grade
        )));
    }

    Ok(AnalyzedItem {
        url: url.to_string(),
        summary: analysis.summary,
        tags: analysis.tags,
        grade: analysis.grade,
        badge: analysis.badge,
        timestamp: Utc::now(),
        content: output.text,
        preferences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{item, FakeBackend, Op};
    use crate::backend::ScrapeAnalysis;
    use crate::error::ErrorKind;
    use crate::models::{Badge, SummaryLength, SummaryStyle};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const URL: &str = "https://a.example/post";

    fn create_test_orchestrator(fake: FakeBackend) -> (Arc<FakeBackend>, RequestOrchestrator) {
        let fake = Arc::new(fake);
        let orchestrator = RequestOrchestrator::new(fake.clone());
        (fake, orchestrator)
    }

    #[test]
    fn test_dedup_key() {
        assert_eq!(dedup_key(URL).unwrap(), URL);
        assert_eq!(dedup_key("  https://a.example/post#intro ").unwrap(), URL);
        assert_eq!(dedup_key("https://a.example").unwrap(), "https://a.example/");
    }

    #[test]
    fn test_dedup_key_rejects_invalid_input() {
        for bad in ["", "   ", "not a url", "a.example/post", "ftp://a.example/x", "mailto:x@a.example"] {
            let err = dedup_key(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "input {:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_first_analyze_scrapes_then_second_is_cached() {
        let (fake, orchestrator) = create_test_orchestrator(FakeBackend::new());

        let first = orchestrator.analyze(URL).await.unwrap();
        assert!(!first.was_cached);
        assert_eq!(first.item.url, URL);
        assert_eq!(first.item.grade, 7);
        assert_eq!(first.item.badge, Badge::Silver);
        assert_eq!(first.item.content.as_deref(), Some("page text"));

        let second = orchestrator.analyze(URL).await.unwrap();
        assert!(second.was_cached);
        assert_eq!(second.item, first.item);
        assert!(second.message.is_some());

        assert_eq!(fake.scrape_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.cached_calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.state(URL), AnalysisState::Done);
    }

    #[tokio::test]
    async fn test_known_url_never_scrapes() {
        let fake = FakeBackend::new().with_item(item(URL, &["ai"], 9, 60));
        let (fake, orchestrator) = create_test_orchestrator(fake);

        for _ in 0..3 {
            let outcome = orchestrator.analyze(URL).await.unwrap();
            assert!(outcome.was_cached);
            assert_eq!(outcome.item.grade, 9);
        }
        assert_eq!(fake.scrape_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_resubmission_scrapes_once() {
        let fake = FakeBackend::new().with_delay(Duration::from_millis(20));
        let (fake, orchestrator) = create_test_orchestrator(fake);

        let (a, b, c) = tokio::join!(
            orchestrator.analyze(URL),
            orchestrator.analyze(URL),
            orchestrator.analyze("https://a.example/post#again"),
        );

        let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| !o.was_cached).count(), 1);
        assert_eq!(fake.scrape_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lagging_existence_check_still_uses_cache() {
        let (fake, orchestrator) = create_test_orchestrator(FakeBackend::new());
        let first = orchestrator.analyze(URL).await.unwrap();

        fake.existence_lags.store(true, Ordering::SeqCst);
        let again = orchestrator.analyze(URL).await.unwrap();
        assert!(again.was_cached);
        assert_eq!(again.item, first.item);
        assert_eq!(fake.scrape_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_any_call() {
        let (fake, orchestrator) = create_test_orchestrator(FakeBackend::new());

        let err = orchestrator.analyze("not a url").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fake.check_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.scrape_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_kinds_are_distinct() {
        let (fake, orchestrator) = create_test_orchestrator(FakeBackend::new());
        fake.fail(Op::Check);
        let err = orchestrator.analyze(URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert_eq!(orchestrator.state(URL), AnalysisState::Failed);
        fake.recover(Op::Check);

        fake.fail(Op::Scrape);
        let err = orchestrator.analyze(URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Analysis);
        fake.recover(Op::Scrape);

        let cached = FakeBackend::new().with_item(item(URL, &["ai"], 6, 5));
        let (cached, orchestrator) = create_test_orchestrator(cached);
        cached.fail(Op::Cached);
        let err = orchestrator.analyze(URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheRetrieval);
        assert_eq!(cached.scrape_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_scrape_is_not_remembered() {
        let (fake, orchestrator) = create_test_orchestrator(FakeBackend::new());
        fake.fail(Op::Scrape);
        assert!(orchestrator.analyze(URL).await.is_err());
        fake.recover(Op::Scrape);

        let outcome = orchestrator.analyze(URL).await.unwrap();
        assert!(!outcome.was_cached);
        assert_eq!(fake.scrape_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unusable_analysis_is_an_analysis_error() {
        let fake = FakeBackend::new().with_analysis(ScrapeAnalysis {
            summary: "Error generating analysis".to_string(),
            tags: Vec::new(),
            grade: 0,
            badge: Badge::None,
        });
        let (_fake, orchestrator) = create_test_orchestrator(fake);

        let err = orchestrator.analyze(URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Analysis);
        assert_eq!(orchestrator.state(URL), AnalysisState::Failed);
    }

    #[tokio::test]
    async fn test_preferences_are_recorded() {
        let (_fake, orchestrator) = create_test_orchestrator(FakeBackend::new());
        let prefs = Preferences {
            length: SummaryLength::Short,
            style: SummaryStyle::BulletPoints,
        };

        let outcome = orchestrator.analyze_with(URL, Some(prefs)).await.unwrap();
        assert_eq!(outcome.item.preferences, Some(prefs));

        // Asking again with other preferences returns the stored item as is.
        let again = orchestrator.analyze_with(URL, None).await.unwrap();
        assert!(again.was_cached);
        assert_eq!(again.item, outcome.item);
    }

    #[tokio::test]
    async fn test_concurrent_callers_get_one_item() {
        let fake = FakeBackend::new().with_delay(Duration::from_millis(20));
        let (_fake, orchestrator) = create_test_orchestrator(fake);

        let (a, b) = tokio::join!(orchestrator.analyze(URL), orchestrator.analyze(URL));
        assert_eq!(a.unwrap().item, b.unwrap().item);
    }

    #[tokio::test]
    async fn test_gates_are_released() {
        let fake = FakeBackend::new().with_delay(Duration::from_millis(10));
        let (_fake, orchestrator) = create_test_orchestrator(fake);

        let (a, b, c) = tokio::join!(
            orchestrator.analyze(URL),
            orchestrator.analyze(URL),
            orchestrator.analyze("https://b.example/other"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(orchestrator.open_gates(), 0);

        assert!(orchestrator.analyze("not a url").await.is_err());
        assert_eq!(orchestrator.open_gates(), 0);
    }

    #[test]
    fn test_state_of_unknown_url_is_idle() {
        let (_fake, orchestrator) = create_test_orchestrator(FakeBackend::new());
        assert_eq!(orchestrator.state(URL), AnalysisState::Idle);
        assert_eq!(orchestrator.state("garbage"), AnalysisState::Idle);
    }
}
