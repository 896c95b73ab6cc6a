//! Data models for LinkBender.
//!
//! This module contains the core data structures shared by the request
//! orchestrator, the tag search client, the feed aggregator and the chat
//! bridge, together with the lenient decoders used for the analysis
//! service's JSON.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Badge assigned to an analysis by the remote service.
///
/// The client treats the badge as opaque: the well-known labels get their
/// own variants and anything else is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Badge {
    Gold,
    Silver,
    Bronze,
    #[default]
    None,
    Other(String),
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Badge::Gold => write!(f, "gold"),
            Badge::Silver => write!(f, "silver"),
            Badge::Bronze => write!(f, "bronze"),
            Badge::None => write!(f, "none"),
            Badge::Other(s) => write!(f, "{}", s),
        }
    }
}

impl Badge {
    /// Returns an emoji representation of the badge.
    pub fn emoji(&self) -> &'static str {
        match self {
            Badge::Gold => "🥇",
            Badge::Silver => "🥈",
            Badge::Bronze => "🥉",
            Badge::None => "·",
            Badge::Other(_) => "🏅",
        }
    }
}

impl From<&str> for Badge {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "gold" => Badge::Gold,
            "silver" => Badge::Silver,
            "bronze" => Badge::Bronze,
            "" | "none" => Badge::None,
            other => Badge::Other(other.to_string()),
        }
    }
}

impl From<String> for Badge {
    fn from(s: String) -> Self {
        Badge::from(s.as_str())
    }
}

impl From<Badge> for String {
    fn from(badge: Badge) -> Self {
        badge.to_string()
    }
}

/// Requested summary length.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLength {
    Short,
    Medium,
    Detailed,
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLength::Short => "short",
            SummaryLength::Medium => "medium",
            SummaryLength::Detailed => "detailed",
        }
    }
}

/// Requested summary style.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    BulletPoints,
    Conversational,
    Technical,
}

impl SummaryStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::BulletPoints => "bullet_points",
            SummaryStyle::Conversational => "conversational",
            SummaryStyle::Technical => "technical",
        }
    }
}

/// Preferences used to generate a customized summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub length: SummaryLength,
    pub style: SummaryStyle,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            length: SummaryLength::Medium,
            style: SummaryStyle::Conversational,
        }
    }
}

/// A URL together with the analysis the service produced for it.
///
/// `url` is the identity: the system of record holds at most one
/// analysis per URL and the client never changes an item once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedItem {
    /// The analyzed URL.
    #[serde(default)]
    pub url: String,
    /// Summary text.
    #[serde(default)]
    pub summary: String,
    /// Normalized tags (lower-case, trimmed, no duplicates).
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    /// Grade from 1 to 10; 0 means the service sent no usable grade.
    #[serde(default, deserialize_with = "deserialize_grade")]
    pub grade: u8,
    /// Badge computed by the service.
    #[serde(default)]
    pub badge: Badge,
    /// When the analysis was created.
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Extracted page text, when the service returned it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Preferences used for a customized summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

impl AnalyzedItem {
    /// Whether the item carries at least one of `tags`.
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }

    /// Host part of the URL, for compact display.
    pub fn hostname(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// Uniform result of `analyze`, whichever path produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub item: AnalyzedItem,
    pub was_cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Sort rule of a feed.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Newest first.
    #[default]
    Recent,
    /// Highest grade first.
    Grade,
    /// Keep the feed's own order.
    Tags,
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Recent => write!(f, "recent"),
            SortBy::Grade => write!(f, "grade"),
            SortBy::Tags => write!(f, "tags"),
        }
    }
}

/// Display preferences of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDisplay {
    #[serde(default)]
    pub show_content: bool,
    #[serde(default)]
    pub show_preferences: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

/// A named, independently sorted and filtered view over the item pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sort_by: SortBy,
    /// ANY-match tag filter; empty means no filtering.
    #[serde(default)]
    pub selected_tags: Vec<String>,
    /// Feed membership, in insertion order.
    #[serde(default)]
    pub items: Vec<AnalyzedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<FeedDisplay>,
}

impl FeedConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, sort_by: SortBy) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sort_by,
            selected_tags: Vec::new(),
            items: Vec::new(),
            display: None,
        }
    }

    /// Whether `url` is a member of this feed.
    pub fn contains(&self, url: &str) -> bool {
        self.items.iter().any(|i| i.url == url)
    }
}

/// Items sharing one tag.
#[derive(Debug, Clone, Serialize)]
pub struct TagGroup {
    pub name: String,
    pub items: Vec<AnalyzedItem>,
    pub count: usize,
}

/// How often a tag occurs in the item pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUsage {
    pub name: String,
    pub count: usize,
}

/// Tag statistics kept by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularTag {
    pub name: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of a tag search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TagSearchResult {
    pub items: Vec<AnalyzedItem>,
    pub searched_tags: Vec<String>,
    pub related_tags: Vec<String>,
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message of a chat session. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: u64,
    pub content: String,
    pub role: ChatRole,
    pub timestamp: DateTime<Utc>,
}

/// Normalize tags the way the analysis service does: trim, lower-case,
/// drop empties and duplicates (first occurrence wins).
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Parse a grade sent as a number or a numeric string.
///
/// Anything that is not a number in 0..=10 yields 0.
pub fn parse_grade(raw: &str) -> u8 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|g| (0.0..=10.0).contains(g))
        .map(|g| g.round() as u8)
        .unwrap_or(0)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GradeRepr {
    Number(f64),
    Text(String),
}

pub(crate) fn deserialize_grade<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let grade = match Option::<GradeRepr>::deserialize(deserializer)? {
        Some(GradeRepr::Number(n)) => parse_grade(&n.to_string()),
        Some(GradeRepr::Text(s)) => parse_grade(&s),
        None => 0,
    };
    Ok(grade)
}

pub(crate) fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(normalize_tags(tags))
}

/// Parse RFC 3339, or a naive ISO datetime taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
        None => Ok(Utc::now()),
    }
}

fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .as_deref()
        .and_then(parse_timestamp))
}
