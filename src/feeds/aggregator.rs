//! The feed aggregator: a shared item pool plus a bounded list of feeds.
//!
//! Every mutation works on a copy of the feed list, saves the copy through
//! the repository and only then swaps it in, all under the write lock.
//! Readers therefore see either the old or the new list, and a failed save
//! leaves the in-memory state untouched.

use super::store::FeedRepository;
use super::view;
use crate::analysis::dedup_key;
use crate::error::{LinkError, Result};
use crate::models::{
    normalize_tags, AnalyzedItem, FeedConfig, SortBy, TagGroup, TagUsage,
};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Maximum number of configured feeds.
pub const MAX_FEEDS: usize = 4;

/// Feeds used when nothing was saved yet.
pub fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig::new("recent", "Recent", SortBy::Recent),
        FeedConfig::new("high-grade", "High Grade", SortBy::Grade),
    ]
}

#[derive(Debug, Default)]
struct Board {
    feeds: Vec<FeedConfig>,
    pool: Vec<AnalyzedItem>,
}

pub struct FeedAggregator {
    repository: Box<dyn FeedRepository>,
    board: RwLock<Board>,
}

impl FeedAggregator {
    /// Restore the feeds from `repository`, or start with the default set.
    pub fn open(repository: impl FeedRepository + 'static) -> Result<Self> {
        let feeds = match repository.load()? {
            Some(feeds) => {
                debug!("Restored {} feed(s)", feeds.len());
                if feeds.len() > MAX_FEEDS {
                    warn!(
                        "Feed store holds {} feeds, more than the limit of {}",
                        feeds.len(),
                        MAX_FEEDS
                    );
                }
                feeds
            }
            None => {
                debug!("No saved feeds, using defaults");
                default_feeds()
            }
        };

        Ok(Self {
            repository: Box::new(repository),
            board: RwLock::new(Board {
                feeds,
                pool: Vec::new(),
            }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Board> {
        self.board.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Board> {
        self.board.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `change` to a copy of the feed list, persist it, then commit.
    fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<FeedConfig>, &[AnalyzedItem]) -> Result<T>,
    {
        let mut board = self.write();
        let mut feeds = board.feeds.clone();
        let out = change(&mut feeds, &board.pool)?;
        self.repository.save(&feeds)?;
        board.feeds = feeds;
        Ok(out)
    }

    /// Snapshot of the configured feeds.
    pub fn feeds(&self) -> Vec<FeedConfig> {
        self.read().feeds.clone()
    }

    pub fn feed(&self, id: &str) -> Option<FeedConfig> {
        self.read().feeds.iter().find(|f| f.id == id).cloned()
    }

    /// Snapshot of the shared item pool.
    pub fn pool(&self) -> Vec<AnalyzedItem> {
        self.read().pool.clone()
    }

    /// Add items to the shared pool. Items whose URL is already pooled are
    /// skipped. Returns how many were added.
    pub fn ingest<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = AnalyzedItem>,
    {
        let mut board = self.write();
        let mut added = 0;
        for item in items {
            if !board.pool.iter().any(|p| p.url == item.url) {
                board.pool.push(item);
                added += 1;
            }
        }
        debug!("Pooled {} new item(s), {} total", added, board.pool.len());
        added
    }

    /// Give every pooled item that no feed holds yet a home: the first feed
    /// whose selected tags it matches, else the first feed.
    ///
    /// Saves once when anything changed. Returns the number of items placed.
    pub fn populate(&self) -> Result<usize> {
        let placed = {
            let board = self.read();
            board
                .pool
                .iter()
                .filter(|item| !board.feeds.iter().any(|f| f.contains(&item.url)))
                .count()
        };
        if placed == 0 {
            return Ok(0);
        }

        let placed = self.mutate(|feeds, pool| {
            if feeds.is_empty() {
                return Ok(0);
            }
            let mut placed = 0;
            for item in pool {
                if feeds.iter().any(|f| f.contains(&item.url)) {
                    continue;
                }
                let target = feeds
                    .iter()
                    .position(|f| !f.selected_tags.is_empty() && item.has_any_tag(&f.selected_tags))
                    .unwrap_or(0);
                feeds[target].items.push(item.clone());
                placed += 1;
            }
            Ok(placed)
        })?;

        info!("Placed {} item(s) into feeds", placed);
        Ok(placed)
    }

    /// The visible, filtered and sorted items of feed `id`.
    pub fn view(&self, id: &str, min_grade: Option<u8>) -> Result<Vec<AnalyzedItem>> {
        let board = self.read();
        let feed = find(&board.feeds, id)?;
        Ok(view::compute_feed_view(feed, &feed.items, min_grade))
    }

    /// Tag groups over the pool, optionally dropping low grades first.
    pub fn groups(&self, min_grade: Option<u8>) -> Vec<TagGroup> {
        let board = self.read();
        match min_grade {
            Some(min) => view::group_by_tag(&view::filter_min_grade(&board.pool, min)),
            None => view::group_by_tag(&board.pool),
        }
    }

    pub fn tag_usage(&self) -> Vec<TagUsage> {
        view::tag_usage(&self.read().pool)
    }

    /// Create a feed. Fails with a capacity error once [`MAX_FEEDS`] exist.
    pub fn add_feed(&self, name: Option<&str>) -> Result<FeedConfig> {
        let feed = self.mutate(|feeds, _| {
            if feeds.len() >= MAX_FEEDS {
                return Err(LinkError::FeedCapacity { max: MAX_FEEDS });
            }
            let name = match name.map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => format!("Feed {}", feeds.len() + 1),
            };
            let id = format!("feed-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
            let feed = FeedConfig::new(id, name, SortBy::Recent);
            feeds.push(feed.clone());
            Ok(feed)
        })?;

        info!("Added feed '{}' ({})", feed.name, feed.id);
        Ok(feed)
    }

    /// Delete feed `id`. Its items are not moved anywhere else.
    pub fn remove_feed(&self, id: &str) -> Result<FeedConfig> {
        let removed = self.mutate(|feeds, _| {
            let index = position(feeds, id)?;
            Ok(feeds.remove(index))
        })?;

        info!("Removed feed '{}' ({})", removed.name, removed.id);
        Ok(removed)
    }

    pub fn rename_feed(&self, id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LinkError::Validation("Feed name cannot be empty.".to_string()));
        }

        self.mutate(|feeds, _| {
            find_mut(feeds, id)?.name = name.to_string();
            Ok(())
        })?;
        info!("Renamed feed {} to '{}'", id, name);
        Ok(())
    }

    pub fn set_sort(&self, id: &str, sort_by: SortBy) -> Result<()> {
        self.mutate(|feeds, _| {
            find_mut(feeds, id)?.sort_by = sort_by;
            Ok(())
        })?;
        info!("Feed {} now sorted by {}", id, sort_by);
        Ok(())
    }

    /// Replace the tag filter of feed `id`. An empty list disables filtering.
    pub fn set_selected_tags<S: AsRef<str>>(&self, id: &str, tags: &[S]) -> Result<()> {
        let tags = normalize_tags(tags.iter().map(AsRef::as_ref));
        self.mutate(|feeds, _| {
            find_mut(feeds, id)?.selected_tags = tags.clone();
            Ok(())
        })?;
        info!("Feed {} filters on [{}]", id, tags.join(", "));
        Ok(())
    }

    /// Select `tag` on feed `id`, or deselect it if already selected.
    /// Returns whether the tag is selected afterwards.
    pub fn toggle_tag(&self, id: &str, tag: &str) -> Result<bool> {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return Err(LinkError::Validation("Tag cannot be empty.".to_string()));
        }

        let selected = self.mutate(|feeds, _| {
            let feed = find_mut(feeds, id)?;
            if let Some(index) = feed.selected_tags.iter().position(|t| *t == tag) {
                feed.selected_tags.remove(index);
                Ok(false)
            } else {
                feed.selected_tags.push(tag.clone());
                Ok(true)
            }
        })?;

        debug!("Feed {}: tag '{}' selected = {}", id, tag, selected);
        Ok(selected)
    }

    /// Move the item with `url` into feed `to`.
    ///
    /// The item leaves every other feed and appears once in `to`. When `to`
    /// (or a given `from`) does not exist nothing changes. `url` matches an
    /// item stored under the same address written differently, such as
    /// without the trailing slash.
    pub fn move_item(&self, url: &str, from: Option<&str>, to: &str) -> Result<()> {
        let key = dedup_key(url).ok();
        let is_target = |candidate: &str| same_link(candidate, url, key.as_deref());

        self.mutate(|feeds, pool| {
            position(feeds, to)?;
            if let Some(from) = from {
                position(feeds, from)?;
            }

            let item = feeds
                .iter()
                .flat_map(|f| f.items.iter())
                .chain(pool.iter())
                .find(|i| is_target(&i.url))
                .cloned()
                .ok_or_else(|| LinkError::Validation(format!("No analyzed item for {}", url)))?;

            for feed in feeds.iter_mut() {
                if feed.id == to {
                    if !feed.items.iter().any(|i| is_target(&i.url)) {
                        feed.items.push(item.clone());
                    }
                } else {
                    feed.items.retain(|i| !is_target(&i.url));
                }
            }
            Ok(())
        })?;

        info!("Moved {} to feed {}", url, to);
        Ok(())
    }

    /// The item with `url`, from the pool or any feed.
    pub fn find_item(&self, url: &str) -> Option<AnalyzedItem> {
        let key = dedup_key(url).ok();
        let board = self.read();
        board
            .pool
            .iter()
            .chain(board.feeds.iter().flat_map(|f| f.items.iter()))
            .find(|i| same_link(&i.url, url, key.as_deref()))
            .cloned()
    }
}

/// Whether `candidate` is the link `url`, either as written or once both
/// are reduced to their dedup key.
fn same_link(candidate: &str, url: &str, key: Option<&str>) -> bool {
    candidate == url
        || key.is_some_and(|key| dedup_key(candidate).is_ok_and(|c| c == key))
}

fn position(feeds: &[FeedConfig], id: &str) -> Result<usize> {
    feeds
        .iter()
        .position(|f| f.id == id)
        .ok_or_else(|| LinkError::FeedNotFound { id: id.to_string() })
}

fn find<'a>(feeds: &'a [FeedConfig], id: &str) -> Result<&'a FeedConfig> {
    Ok(&feeds[position(feeds, id)?])
}

fn find_mut<'a>(feeds: &'a mut [FeedConfig], id: &str) -> Result<&'a mut FeedConfig> {
    let index = position(feeds, id)?;
    Ok(&mut feeds[index])
}
