//! Feed configuration persistence.
//!
//! The aggregator only sees [`FeedRepository`]. The CLI uses a JSON document
//! on disk; tests use an in-memory repository.

use crate::models::FeedConfig;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key under which the feed list is stored in the document.
pub const FEEDS_KEY: &str = "dynamic-feeds";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed feed document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Feed document {0} is not a JSON object")]
    NotAnObject(PathBuf),

    /// The store refused the operation.
    #[error("Feed store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the feed list.
pub trait FeedRepository: Send + Sync {
    /// The last saved feed list, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<FeedConfig>>, StoreError>;

    /// Replace the saved feed list with `feeds`.
    fn save(&self, feeds: &[FeedConfig]) -> Result<(), StoreError>;
}

/// Feed list stored under [`FEEDS_KEY`] in a JSON object document.
///
/// Other keys in the document are left untouched. Writes go to a temporary
/// file next to the document which is then renamed over it, so a crash
/// mid-write leaves the previous version in place.
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_document(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let value: Value = serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        match value {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let content =
            serde_json::to_string_pretty(document).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}

impl FeedRepository for JsonFileRepository {
    fn load(&self) -> Result<Option<Vec<FeedConfig>>, StoreError> {
        let Some(mut document) = self.read_document()? else {
            debug!("No feed document at {}", self.path.display());
            return Ok(None);
        };
        let Some(feeds) = document.remove(FEEDS_KEY) else {
            return Ok(None);
        };

        let feeds: Vec<FeedConfig> =
            serde_json::from_value(feeds).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(feeds))
    }

    fn save(&self, feeds: &[FeedConfig]) -> Result<(), StoreError> {
        let mut document = self.read_document()?.unwrap_or_default();
        let value = serde_json::to_value(feeds).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        document.insert(FEEDS_KEY.to_string(), value);

        self.write_document(&document)?;
        debug!("Saved {} feed(s) to {}", feeds.len(), self.path.display());
        Ok(())
    }
}

/// Process-local repository.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryRepository {
    feeds: std::sync::Mutex<Option<Vec<FeedConfig>>>,
    saves: std::sync::Mutex<usize>,
}

#[cfg(test)]
impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
impl FeedRepository for MemoryRepository {
    fn load(&self) -> Result<Option<Vec<FeedConfig>>, StoreError> {
        Ok(self.feeds.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, feeds: &[FeedConfig]) -> Result<(), StoreError> {
        *self.feeds.lock().unwrap_or_else(|e| e.into_inner()) = Some(feeds.to_vec());
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

impl<R: FeedRepository + ?Sized> FeedRepository for std::sync::Arc<R> {
    fn load(&self) -> Result<Option<Vec<FeedConfig>>, StoreError> {
        (**self).load()
    }

    fn save(&self, feeds: &[FeedConfig]) -> Result<(), StoreError> {
        (**self).save(feeds)
    }
}
