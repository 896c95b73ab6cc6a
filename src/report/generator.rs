//! Markdown rendering.
//!
//! Every command prints through one of these functions; `--format json`
//! goes through [`generate_json`] instead.

use crate::chat::{AnswerRecord, FormattedAnswer};
use crate::error::Failure;
use crate::models::{
    AnalysisOutcome, AnalyzedItem, FeedConfig, PopularTag, TagGroup, TagSearchResult, TagUsage,
};
use anyhow::Result;
use serde::Serialize;

/// Render the result of analyzing one URL.
pub fn render_outcome(outcome: &AnalysisOutcome) -> String {
    let mut output = String::new();

    let origin = if outcome.was_cached {
        "♻️ cached"
    } else {
        "✨ new"
    };
    output.push_str(&format!("## {} ({})\n\n", outcome.item.url, origin));

    if let Some(ref message) = outcome.message {
        output.push_str(&format!("> {}\n\n", message));
    }

    output.push_str(&generate_item_details(&outcome.item, true));
    output
}

/// Render a failed `analyze` for `url`.
pub fn render_failure(url: &str, failure: &Failure) -> String {
    format!("## {}\n\n❌ {} *({})*\n\n", url, failure.message, failure.kind)
}

/// Render a tag search.
pub fn render_search(result: &TagSearchResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Tag search: {}\n\n",
        result.searched_tags.join(", ")
    ));

    if result.items.is_empty() {
        output.push_str("No analyzed links carry these tags.\n\n");
    } else {
        output.push_str(&format!("Found {} link(s).\n\n", result.items.len()));
        for item in &result.items {
            output.push_str(&generate_item_block(item, false, false));
        }
    }

    if !result.related_tags.is_empty() {
        output.push_str(&format!(
            "**Related tags:** {}\n",
            result.related_tags.join(", ")
        ));
    }

    output
}

/// Plain-text template for a chat answer.
pub fn render_answer(answer: &FormattedAnswer) -> String {
    match answer {
        FormattedAnswer::Fallback(text) => text.clone(),
        FormattedAnswer::Results(records) => records
            .iter()
            .map(generate_answer_record)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn generate_answer_record(record: &AnswerRecord) -> String {
    let mut block = String::new();

    block.push_str(&format!("🔗 {}\n", record.url));
    if !record.summary.is_empty() {
        block.push_str(&format!("   {}\n", record.summary));
    }
    block.push_str(&format!(
        "   Grade: {} | Badge: {} {}\n",
        record.grade,
        record.badge.emoji(),
        record.badge
    ));

    block
}

/// Render the configured feeds as a table.
pub fn render_feed_list(feeds: &[FeedConfig]) -> String {
    let mut output = String::new();

    output.push_str("# Feeds\n\n");
    if feeds.is_empty() {
        output.push_str("No feeds configured.\n");
        return output;
    }

    output.push_str("| Id | Name | Sort | Tags | Items |\n");
    output.push_str("|:---|:---|:---:|:---|:---:|\n");
    for feed in feeds {
        let tags = if feed.selected_tags.is_empty() {
            "*all*".to_string()
        } else {
            feed.selected_tags.join(", ")
        };
        output.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            feed.id,
            feed.name,
            feed.sort_by,
            tags,
            feed.items.len()
        ));
    }
    output.push('\n');

    output
}

/// Render what a feed shows.
pub fn render_feed_view(feed: &FeedConfig, items: &[AnalyzedItem]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", feed.name));
    output.push_str(&format!("*Sorted by {}", feed.sort_by));
    if !feed.selected_tags.is_empty() {
        output.push_str(&format!(" | Tags: {}", feed.selected_tags.join(", ")));
    }
    output.push_str(&format!(" | {} of {} item(s)*\n\n", items.len(), feed.items.len()));

    if items.is_empty() {
        output.push_str("Nothing to show.\n");
        return output;
    }

    let display = feed.display.clone().unwrap_or_default();
    for item in items {
        output.push_str(&generate_item_block(
            item,
            display.show_content,
            display.show_preferences,
        ));
    }

    output
}

/// Render tag groups, largest first.
pub fn render_groups(groups: &[TagGroup]) -> String {
    let mut output = String::new();

    output.push_str("# Links by tag\n\n");
    if groups.is_empty() {
        output.push_str("No tagged links yet.\n");
        return output;
    }

    for group in groups {
        output.push_str(&format!("## {} ({})\n\n", group.name, group.count));
        for item in &group.items {
            let label = item.hostname().unwrap_or_else(|| item.url.clone());
            output.push_str(&format!(
                "- {} [{}]({}) (grade {})\n",
                item.badge.emoji(),
                label,
                item.url,
                item.grade
            ));
        }
        output.push('\n');
    }

    output
}

/// Render the service's tag statistics.
pub fn render_popular_tags(tags: &[PopularTag]) -> String {
    let mut output = String::new();

    output.push_str("# Popular tags\n\n");
    if tags.is_empty() {
        output.push_str("No tags yet.\n");
        return output;
    }

    output.push_str(&generate_tag_table(
        tags.iter().map(|t| (t.name.as_str(), t.count)),
    ));
    output
}

/// Render tag counts over the links analyzed in this session.
pub fn render_tag_usage(usage: &[TagUsage]) -> String {
    let mut output = String::new();

    output.push_str("# Tags in use\n\n");
    if usage.is_empty() {
        output.push_str("No analyzed links yet.\n");
        return output;
    }

    output.push_str(&generate_tag_table(
        usage.iter().map(|t| (t.name.as_str(), t.count)),
    ));
    output
}

fn generate_tag_table<'a>(rows: impl Iterator<Item = (&'a str, usize)>) -> String {
    let mut table = String::new();
    table.push_str("| Tag | Links |\n");
    table.push_str("|:---|:---:|\n");
    for (name, count) in rows {
        table.push_str(&format!("| {} | {} |\n", name, count));
    }
    table.push('\n');
    table
}

/// One item as a list entry.
fn generate_item_block(item: &AnalyzedItem, show_content: bool, show_preferences: bool) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {} {}\n\n", item.badge.emoji(), item.url));
    block.push_str(&generate_item_details(item, show_preferences));

    if show_content {
        if let Some(ref content) = item.content {
            block.push_str("<details>\n<summary>Extracted text</summary>\n\n");
            block.push_str(content);
            block.push_str("\n</details>\n\n");
        }
    }

    block.push_str("---\n\n");
    block
}

fn generate_item_details(item: &AnalyzedItem, show_preferences: bool) -> String {
    let mut details = String::new();

    details.push_str(&format!(
        "- **Grade:** {}/10\n- **Badge:** {} {}\n",
        item.grade,
        item.badge.emoji(),
        item.badge
    ));
    if !item.tags.is_empty() {
        details.push_str(&format!("- **Tags:** {}\n", item.tags.join(", ")));
    }
    details.push_str(&format!(
        "- **Analyzed:** {}\n",
        item.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if show_preferences {
        if let Some(prefs) = item.preferences {
            details.push_str(&format!(
                "- **Summary:** {}, {}\n",
                prefs.length.as_str(),
                prefs.style.as_str()
            ));
        }
    }
    details.push('\n');

    if !item.summary.is_empty() {
        details.push_str(&item.summary);
        details.push_str("\n\n");
    }

    details
}

/// Pretty JSON for `--format json`.
pub fn generate_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}
