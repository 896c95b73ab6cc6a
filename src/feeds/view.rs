//! Pure feed computations over an item slice.

use crate::models::{AnalyzedItem, FeedConfig, SortBy, TagGroup, TagUsage};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Partition `items` by tag. An item with N tags lands in N groups.
///
/// Groups are ordered by descending item count; equal counts keep the order
/// in which the tags were first seen.
pub fn group_by_tag(items: &[AnalyzedItem]) -> Vec<TagGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<TagGroup> = Vec::new();

    for item in items {
        for tag in &item.tags {
            let slot = *index.entry(tag.as_str()).or_insert_with(|| {
                groups.push(TagGroup {
                    name: tag.clone(),
                    items: Vec::new(),
                    count: 0,
                });
                groups.len() - 1
            });
            groups[slot].items.push(item.clone());
            groups[slot].count += 1;
        }
    }

    groups.sort_by_key(|g| Reverse(g.count));
    groups
}

/// Tag frequencies over `items`, most used first, first-seen tie-break.
pub fn tag_usage(items: &[AnalyzedItem]) -> Vec<TagUsage> {
    group_by_tag(items)
        .into_iter()
        .map(|g| TagUsage {
            name: g.name,
            count: g.count,
        })
        .collect()
}

/// Items whose grade is at least `min_grade`.
pub fn filter_min_grade(items: &[AnalyzedItem], min_grade: u8) -> Vec<AnalyzedItem> {
    items
        .iter()
        .filter(|i| i.grade >= min_grade)
        .cloned()
        .collect()
}

/// Sort `items` in place by `rule`. All sorts are stable.
pub fn sort_items(items: &mut [AnalyzedItem], rule: SortBy) {
    match rule {
        SortBy::Recent => items.sort_by_key(|i| Reverse(i.timestamp)),
        SortBy::Grade => items.sort_by_key(|i| Reverse(i.grade)),
        SortBy::Tags => {}
    }
}

/// What a feed shows for `items`.
///
/// Drops items under `min_grade`, then keeps items sharing at least one tag
/// with `selected_tags` (all items when none are selected), sorts by the
/// feed's rule and caps the result at `display.max_items`.
pub fn compute_feed_view(
    config: &FeedConfig,
    items: &[AnalyzedItem],
    min_grade: Option<u8>,
) -> Vec<AnalyzedItem> {
    let mut view: Vec<AnalyzedItem> = items
        .iter()
        .filter(|i| min_grade.map_or(true, |min| i.grade >= min))
        .filter(|i| config.selected_tags.is_empty() || i.has_any_tag(&config.selected_tags))
        .cloned()
        .collect();

    sort_items(&mut view, config.sort_by);

    if let Some(max) = config.display.as_ref().and_then(|d| d.max_items) {
        view.truncate(max);
    }
    view
}
