//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.linkbender.toml` files.

use crate::chat::AskMode;
use crate::cli::OutputFormat;
use crate::models::{Preferences, SummaryLength, SummaryStyle};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".linkbender.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis service settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Feed persistence settings.
    #[serde(default)]
    pub feeds: FeedsConfig,

    /// Chat settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Default summary preferences.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the analysis service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    120 // scraping plus summarizing a long page is slow
}

fn default_user_agent() -> String {
    format!("linkbender/{}", env!("CARGO_PKG_VERSION"))
}

/// Feed persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// JSON document holding the feed configuration.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".linkbender/feeds.json")
}

/// Chat settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Where questions are sent.
    #[serde(default)]
    pub mode: AskMode,
}

/// Default summary preferences for `analyze`.
///
/// When neither is set the service's plain scrape endpoint is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<SummaryLength>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<SummaryStyle>,
}

impl AnalysisConfig {
    /// Preferences to request, filling an unset half with its default.
    pub fn preferences(&self) -> Option<Preferences> {
        if self.length.is_none() && self.style.is_none() {
            return None;
        }
        let defaults = Preferences::default();
        Some(Preferences {
            length: self.length.unwrap_or(defaults.length),
            style: self.style.unwrap_or(defaults.style),
        })
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.backend_url {
            self.backend.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.backend.timeout_seconds = timeout;
        }
        if let Some(ref store) = args.store {
            self.feeds.store_path = store.clone();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_seconds, 120);
        assert_eq!(
            config.feeds.store_path,
            PathBuf::from(".linkbender/feeds.json")
        );
        assert_eq!(config.chat.mode, AskMode::FreeText);
        assert!(config.analysis.preferences().is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true
format = "json"

[backend]
base_url = "https://linkbender.example.com"

[chat]
mode = "tag_search"

[analysis]
length = "short"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.backend.base_url, "https://linkbender.example.com");
        assert_eq!(config.backend.timeout_seconds, 120);
        assert_eq!(config.chat.mode, AskMode::TagSearch);

        let prefs = config.analysis.preferences().unwrap();
        assert_eq!(prefs.length, SummaryLength::Short);
        assert_eq!(prefs.style, SummaryStyle::Conversational);
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args::parse_from([
            "linkbender",
            "--backend-url",
            "http://10.0.0.2:8000",
            "--timeout",
            "5",
            "--store",
            "/tmp/feeds.json",
            "tags",
        ]);

        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(config.backend.base_url, "http://10.0.0.2:8000");
        assert_eq!(config.backend.timeout_seconds, 5);
        assert_eq!(config.feeds.store_path, PathBuf::from("/tmp/feeds.json"));
        assert_eq!(config.general.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[backend]"));
        assert!(toml_str.contains("[feeds]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.backend.base_url, "http://localhost:8000");
    }
}
