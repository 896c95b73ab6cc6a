//! Chat/query bridge.
//!
//! Questions go either to the service's free-text endpoint or through the
//! tag search. The answer is a typed [`FormattedAnswer`]; turning it into
//! text is left to [`crate::report::render_answer`]. Failures never reach
//! the transcript as raw errors, only as the fixed fallback line.

use crate::backend::AnalysisBackend;
use crate::models::{AnalyzedItem, Badge, ChatMessage, ChatRole};
use crate::search::{parse_tag_query, TagSearchClient};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shown whenever a question produced no usable answer.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't retrieve the information. Please try again.";

/// Where questions are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskMode {
    /// The service's free-text question endpoint.
    #[default]
    FreeText,
    /// The question is read as comma-separated tags.
    TagSearch,
}

/// One result of an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, deserialize_with = "crate::models::deserialize_grade")]
    pub grade: u8,
    #[serde(default)]
    pub badge: Badge,
}

impl From<AnalyzedItem> for AnswerRecord {
    fn from(item: AnalyzedItem) -> Self {
        Self {
            url: item.url,
            summary: item.summary,
            grade: item.grade,
            badge: item.badge,
        }
    }
}

/// Answer to a question, ready for a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FormattedAnswer {
    Results(Vec<AnswerRecord>),
    Fallback(String),
}

impl FormattedAnswer {
    pub fn fallback() -> Self {
        FormattedAnswer::Fallback(FALLBACK_ANSWER.to_string())
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FormattedAnswer::Fallback(_))
    }
}

#[derive(Deserialize)]
struct AskReply {
    #[serde(default)]
    results: Vec<AnswerRecord>,
}

/// Forwards questions and formats the answers. Never touches the item pool
/// or the feeds.
pub struct ChatBridge {
    backend: Arc<dyn AnalysisBackend>,
    search: TagSearchClient,
    mode: AskMode,
}

impl ChatBridge {
    pub fn new(backend: Arc<dyn AnalysisBackend>, mode: AskMode) -> Self {
        Self {
            search: TagSearchClient::new(backend.clone()),
            backend,
            mode,
        }
    }

    pub fn mode(&self) -> AskMode {
        self.mode
    }

    pub async fn ask(&self, question: &str) -> FormattedAnswer {
        let records = match self.mode {
            AskMode::FreeText => self.ask_free_text(question).await,
            AskMode::TagSearch => self.ask_by_tags(question).await,
        };

        match records {
            Some(records) if !records.is_empty() => FormattedAnswer::Results(records),
            _ => FormattedAnswer::fallback(),
        }
    }

    async fn ask_free_text(&self, question: &str) -> Option<Vec<AnswerRecord>> {
        let reply = match self.backend.ask(question).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Question failed: {}", e);
                return None;
            }
        };

        // Anything without a `results` array counts as no answer.
        match serde_json::from_value::<AskReply>(reply) {
            Ok(reply) => Some(reply.results),
            Err(e) => {
                debug!("Unrecognized answer payload: {}", e);
                None
            }
        }
    }

    async fn ask_by_tags(&self, question: &str) -> Option<Vec<AnswerRecord>> {
        match self.search.search(&parse_tag_query(question)).await {
            Ok(items) => Some(items.into_iter().map(AnswerRecord::from).collect()),
            Err(e) => {
                warn!("Question failed: {}", e);
                None
            }
        }
    }
}

/// In-memory transcript of one chat session.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask `question` and append both sides to the transcript.
    ///
    /// Blank questions are ignored and return `None`.
    pub async fn send(&mut self, bridge: &ChatBridge, question: &str) -> Option<FormattedAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }

        self.push(ChatRole::User, question.to_string());
        let answer = bridge.ask(question).await;
        self.push(ChatRole::Assistant, crate::report::render_answer(&answer));
        Some(answer)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn push(&mut self, role: ChatRole, content: String) {
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id: self.next_id,
            content,
            role,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{item, FakeBackend, Op};
    use serde_json::json;

    fn free_text_bridge(reply: serde_json::Value) -> (Arc<FakeBackend>, ChatBridge) {
        let fake = Arc::new(FakeBackend::new().with_ask_reply(reply));
        (fake.clone(), ChatBridge::new(fake, AskMode::FreeText))
    }

    #[tokio::test]
    async fn test_free_text_results() {
        let (_fake, bridge) = free_text_bridge(json!({
            "results": [
                {"url": "https://a.example", "summary": "A", "grade": "8", "badge": "gold"},
                {"url": "https://b.example", "summary": "B", "grade": 3}
            ]
        }));

        match bridge.ask("what about rust?").await {
            FormattedAnswer::Results(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].grade, 8);
                assert_eq!(records[0].badge, Badge::Gold);
                assert_eq!(records[1].badge, Badge::None);
            }
            other => panic!("expected results, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_or_unknown_reply_falls_back() {
        for reply in [json!({"results": []}), json!({"answer": "hi"}), json!("text")] {
            let (_fake, bridge) = free_text_bridge(reply);
            assert_eq!(bridge.ask("q").await, FormattedAnswer::fallback());
        }
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back() {
        let (fake, bridge) = free_text_bridge(json!({"results": [{"url": "u"}]}));
        fake.fail(Op::Ask);
        let answer = bridge.ask("q").await;
        assert!(answer.is_fallback());
        assert_eq!(answer, FormattedAnswer::Fallback(FALLBACK_ANSWER.to_string()));
    }

    #[tokio::test]
    async fn test_tag_search_mode() {
        let fake = Arc::new(
            FakeBackend::new()
                .with_item(item("https://a.example", &["ai"], 7, 1))
                .with_item(item("https://b.example", &["web"], 5, 1)),
        );
        let bridge = ChatBridge::new(fake.clone(), AskMode::TagSearch);

        match bridge.ask("AI, ml").await {
            FormattedAnswer::Results(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].url, "https://a.example");
            }
            other => panic!("expected results, got {:?}", other),
        }
        assert_eq!(fake.ask_calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        assert!(bridge.ask(" , ").await.is_fallback());
    }

    #[tokio::test]
    async fn test_session_transcript() {
        let (_fake, bridge) = free_text_bridge(json!({"results": []}));
        let mut session = ChatSession::new();

        assert!(session.send(&bridge, "   ").await.is_none());
        assert!(session.messages().is_empty());

        session.send(&bridge, "first").await.unwrap();
        session.send(&bridge, "second").await.unwrap();

        let messages = session.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, FALLBACK_ANSWER);
        assert!(messages.windows(2).all(|w| w[0].id < w[1].id));

        session.clear();
        assert!(session.messages().is_empty());
    }
}
