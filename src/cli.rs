//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{SortBy, SummaryLength, SummaryStyle};
use crate::search::DEFAULT_POPULAR_LIMIT;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// LinkBender - analyze links, search them by tag, organize them into feeds
///
/// Talks to a LinkBender analysis service that scrapes, summarizes and
/// grades web pages. Each URL is analyzed at most once; later requests reuse
/// the stored analysis.
///
/// Examples:
///   linkbender analyze https://example.com/article
///   linkbender analyze https://a.example https://b.example --length short
///   linkbender search ai,rust
///   linkbender ask "what did I read about databases?"
///   linkbender feeds move https://a.example --to high-grade
///   linkbender --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .linkbender.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the analysis service
    #[arg(long, value_name = "URL", env = "LINKBENDER_BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    /// Feed store file (JSON)
    #[arg(long, value_name = "FILE", global = true)]
    pub store: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .linkbender.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze one or more URLs (reuses stored analyses)
    Analyze {
        /// URLs to analyze
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Summary length for fresh analyses
        #[arg(long)]
        length: Option<SummaryLength>,

        /// Summary style for fresh analyses
        #[arg(long)]
        style: Option<SummaryStyle>,

        /// Do not add the results to the feeds
        #[arg(long)]
        no_feed: bool,
    },

    /// Find analyzed links carrying any of the given tags
    Search {
        /// Comma-separated tags, e.g. "ai,rust"
        #[arg(value_name = "TAGS")]
        tags: String,
    },

    /// Ask a single question
    Ask {
        #[arg(required = true, value_name = "QUESTION")]
        question: Vec<String>,
    },

    /// Interactive question session on stdin (type `exit` to leave)
    Chat,

    /// Most used tags
    Tags {
        /// Number of tags to show
        #[arg(long, default_value_t = DEFAULT_POPULAR_LIMIT, value_name = "N")]
        limit: usize,

        /// Count tags over links analyzed locally instead of asking the service
        #[arg(long)]
        local: bool,
    },

    /// Group every analyzed link by tag
    Groups {
        /// Hide links graded below this
        #[arg(long, value_name = "GRADE", value_parser = clap::value_parser!(u8).range(0..=10))]
        min_grade: Option<u8>,
    },

    /// Manage feeds
    Feeds {
        #[command(subcommand)]
        action: FeedsCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FeedsCommand {
    /// List the configured feeds
    List,

    /// Show the items of a feed
    Show {
        id: String,

        /// Hide links graded below this
        #[arg(long, value_name = "GRADE", value_parser = clap::value_parser!(u8).range(0..=10))]
        min_grade: Option<u8>,
    },

    /// Create a feed
    Add { name: Option<String> },

    /// Delete a feed
    Remove { id: String },

    /// Rename a feed
    Rename { id: String, name: String },

    /// Change how a feed is sorted
    Sort { id: String, rule: SortBy },

    /// Select a tag filter on a feed, or deselect it if already selected
    Tag { id: String, tag: String },

    /// Replace a feed's tag filter with a comma-separated list; omit to clear it
    Filter { id: String, tags: Option<String> },

    /// Move a link into a feed
    Move {
        url: String,

        /// Target feed
        #[arg(long, value_name = "ID")]
        to: String,

        /// Feed the link is dragged from
        #[arg(long, value_name = "ID")]
        from: Option<String>,
    },

    /// Load every analyzed link from the service and place new ones
    Sync,
}

/// Output format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A command is required. Run with --help to see them.".to_string());
        }

        if let Some(ref url) = self.backend_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Backend URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(Command::Tags { limit: 0, .. }) = &self.command {
            return Err("Tag limit must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            command: Some(Command::Chat),
            config: None,
            backend_url: None,
            store: None,
            timeout: None,
            format: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_analyze() {
        let args = Args::parse_from([
            "linkbender",
            "analyze",
            "https://a.example",
            "https://b.example",
            "--length",
            "short",
            "--style",
            "bullet-points",
        ]);

        match args.command {
            Some(Command::Analyze {
                urls,
                length,
                style,
                no_feed,
            }) => {
                assert_eq!(urls.len(), 2);
                assert_eq!(length, Some(SummaryLength::Short));
                assert_eq!(style, Some(SummaryStyle::BulletPoints));
                assert!(!no_feed);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_feeds_move() {
        let args = Args::parse_from([
            "linkbender",
            "feeds",
            "move",
            "https://a.example",
            "--to",
            "high-grade",
            "--format",
            "json",
        ]);

        assert_eq!(args.format, Some(OutputFormat::Json));
        match args.command {
            Some(Command::Feeds {
                action: FeedsCommand::Move { url, to, from },
            }) => {
                assert_eq!(url, "https://a.example");
                assert_eq!(to, "high-grade");
                assert!(from.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_tags_defaults() {
        let args = Args::parse_from(["linkbender", "tags"]);
        match args.command {
            Some(Command::Tags { limit, local }) => {
                assert_eq!(limit, DEFAULT_POPULAR_LIMIT);
                assert!(!local);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::parse_from(["linkbender", "feeds", "filter", "ai"]);
        assert!(matches!(
            args.command,
            Some(Command::Feeds {
                action: FeedsCommand::Filter { tags: None, .. }
            })
        ));
    }

    #[test]
    fn test_min_grade_range() {
        assert!(Args::try_parse_from(["linkbender", "groups", "--min-grade", "11"]).is_err());
        assert!(Args::try_parse_from(["linkbender", "groups", "--min-grade", "7"]).is_ok());
    }

    #[test]
    fn test_validation_requires_command() {
        let mut args = make_args();
        args.command = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_backend_url() {
        let mut args = make_args();
        args.backend_url = Some("localhost:8000".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
