//! Error types for the client core.
//!
//! Every failure that reaches the orchestration boundary is a
//! [`LinkError`]. Callers that only need to show something to the user
//! turn it into a [`Failure`]: one message plus a machine-readable kind.

use crate::backend::BackendError;
use crate::feeds::StoreError;
use serde::Serialize;
use std::fmt;

/// Machine-distinguishable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Lookup,
    CacheRetrieval,
    Analysis,
    Search,
    Listing,
    FeedCapacity,
    FeedNotFound,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Lookup => "lookup",
            ErrorKind::CacheRetrieval => "cache_retrieval",
            ErrorKind::Analysis => "analysis",
            ErrorKind::Search => "search",
            ErrorKind::Listing => "listing",
            ErrorKind::FeedCapacity => "feed_capacity",
            ErrorKind::FeedNotFound => "feed_not_found",
            ErrorKind::Storage => "storage",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Rejected before any network call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The existence check itself failed, so the cache state is unknown.
    #[error("Could not check whether {url} was analyzed before: {source}")]
    Lookup {
        url: String,
        #[source]
        source: BackendError,
    },

    /// The URL is known to be cached but fetching it failed.
    #[error("{url} was analyzed before but the cached result could not be fetched: {source}")]
    CacheRetrieval {
        url: String,
        #[source]
        source: BackendError,
    },

    /// A fresh analysis failed or the service reported an error.
    #[error("Analysis of {url} failed: {source}")]
    Analysis {
        url: String,
        #[source]
        source: BackendError,
    },

    #[error("Tag search for [{tags}] failed: {source}")]
    Search {
        tags: String,
        #[source]
        source: BackendError,
    },

    /// Listing items or tag statistics failed.
    #[error("Could not list {what}: {source}")]
    Listing {
        what: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Feed limit reached: at most {max} feeds can be configured")]
    FeedCapacity { max: usize },

    #[error("Feed not found: {id}")]
    FeedNotFound { id: String },

    #[error("Feed store error: {0}")]
    Storage(#[from] StoreError),
}

impl LinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::Validation(_) => ErrorKind::Validation,
            LinkError::Lookup { .. } => ErrorKind::Lookup,
            LinkError::CacheRetrieval { .. } => ErrorKind::CacheRetrieval,
            LinkError::Analysis { .. } => ErrorKind::Analysis,
            LinkError::Search { .. } => ErrorKind::Search,
            LinkError::Listing { .. } => ErrorKind::Listing,
            LinkError::FeedCapacity { .. } => ErrorKind::FeedCapacity,
            LinkError::FeedNotFound { .. } => ErrorKind::FeedNotFound,
            LinkError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Single line suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            LinkError::Validation(reason) => reason.clone(),
            LinkError::Lookup { url, .. } => format!(
                "Could not determine whether {} was analyzed before. Please try again.",
                url
            ),
            LinkError::CacheRetrieval { url, .. } => format!(
                "{} was analyzed before, but the saved analysis could not be loaded.",
                url
            ),
            LinkError::Analysis { url, source } => {
                format!("Failed to analyze {}: {}", url, source)
            }
            LinkError::Search { tags, .. } => {
                format!("Search for tags [{}] failed. Please try again.", tags)
            }
            LinkError::Listing { what, .. } => format!("Could not load {}.", what),
            LinkError::FeedCapacity { max } => {
                format!("You can have at most {} feeds.", max)
            }
            LinkError::FeedNotFound { id } => format!("There is no feed with id '{}'.", id),
            LinkError::Storage(e) => format!("Feed settings could not be saved: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// What the presentation layer keeps of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&LinkError> for Failure {
    fn from(e: &LinkError) -> Self {
        Self {
            kind: e.kind(),
            message: e.user_message(),
        }
    }
}

impl From<LinkError> for Failure {
    fn from(e: LinkError) -> Self {
        Failure::from(&e)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}
