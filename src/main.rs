//! LinkBender - link analysis, tag search and feed organization
//!
//! A CLI client for the LinkBender analysis service. URLs are analyzed at
//! most once, analyzed links can be searched by tag, and results are
//! organized into up to four persistent feeds.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, failed analysis, etc.)

mod analysis;
mod backend;
mod chat;
mod cli;
mod config;
mod error;
mod feeds;
mod models;
mod report;
mod search;
mod session;

use anyhow::{Context, Result};
use backend::{AnalysisBackend, HttpBackend};
use chat::{AskMode, ChatSession};
use cli::{Args, Command, FeedsCommand, OutputFormat};
use config::{Config, CONFIG_FILE};
use feeds::{FeedAggregator, JsonFileRepository};
use indicatif::{ProgressBar, ProgressStyle};
use models::Preferences;
use serde::Serialize;
use session::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("LinkBender v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .linkbender.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to point at your analysis service and feed store.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// How results are printed.
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    /// Print `value` as JSON, or the Markdown produced by `markdown`.
    fn emit<T, F>(&self, value: &T, markdown: F) -> Result<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce() -> String,
    {
        match self.format {
            OutputFormat::Json => println!("{}", report::generate_json(value)?),
            OutputFormat::Markdown => print!("{}", markdown()),
        }
        Ok(())
    }

    /// A spinner while a request is in flight, unless output is machine-read.
    fn spinner(&self, message: impl Into<String>) -> Option<ProgressBar> {
        if self.quiet || self.format == OutputFormat::Json {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

fn finish(spinner: Option<ProgressBar>) {
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

/// Run the selected command. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let Some(command) = args.command.clone() else {
        return Ok(0);
    };

    let backend: Arc<dyn AnalysisBackend> = Arc::new(
        HttpBackend::new(&config.backend).context("Failed to create the analysis service client")?,
    );
    debug!(
        "Analysis service: {} (timeout {}s)",
        config.backend.base_url, config.backend.timeout_seconds
    );

    let repository = JsonFileRepository::new(&config.feeds.store_path);
    let feeds = FeedAggregator::open(repository).with_context(|| {
        format!(
            "Failed to load feeds from {}",
            config.feeds.store_path.display()
        )
    })?;

    let session = Session::new(backend, feeds, config.chat.mode);
    let out = Output {
        format: config.general.format,
        quiet: args.quiet,
    };

    match command {
        Command::Analyze {
            urls,
            length,
            style,
            no_feed,
        } => {
            let preferences = match (length, style) {
                (None, None) => config.analysis.preferences(),
                (length, style) => {
                    let defaults = config.analysis.preferences().unwrap_or_default();
                    Some(Preferences {
                        length: length.unwrap_or(defaults.length),
                        style: style.unwrap_or(defaults.style),
                    })
                }
            };
            handle_analyze(&session, &out, &urls, preferences, no_feed).await
        }
        Command::Search { tags } => handle_search(&session, &out, &tags).await,
        Command::Ask { question } => {
            let question = question.join(" ");
            let spinner = out.spinner("Thinking...");
            let answer = session.chat().ask(&question).await;
            finish(spinner);
            if answer.is_fallback() {
                debug!("No usable answer for '{}'", question);
            }
            out.emit(&answer, || format!("{}\n", report::render_answer(&answer)))?;
            Ok(0)
        }
        Command::Chat => handle_chat(&session, &out).await,
        Command::Tags { limit, local: true } => {
            load_pool(&session, &out).await?;
            let mut usage = session.feeds().tag_usage();
            usage.truncate(limit);
            out.emit(&usage, || report::render_tag_usage(&usage))?;
            Ok(0)
        }
        Command::Tags { limit, local: false } => {
            let spinner = out.spinner("Loading tags...");
            let tags = session.search().popular_tags(limit).await;
            finish(spinner);
            let tags = tags?;
            out.emit(&tags, || report::render_popular_tags(&tags))?;
            Ok(0)
        }
        Command::Groups { min_grade } => {
            load_pool(&session, &out).await?;
            let groups = session.feeds().groups(min_grade);
            out.emit(&groups, || report::render_groups(&groups))?;
            Ok(0)
        }
        Command::Feeds { action } => handle_feeds(&session, &out, action).await,
    }
}

#[derive(Serialize)]
struct AnalyzeEntry<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a models::AnalysisOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a error::Failure>,
}

async fn handle_analyze(
    session: &Session,
    out: &Output,
    urls: &[String],
    preferences: Option<Preferences>,
    no_feed: bool,
) -> Result<i32> {
    let spinner = out.spinner(format!("Analyzing {} link(s)...", urls.len()));
    let results = futures::future::join_all(
        urls.iter()
            .map(|url| session.submit_url(url, preferences)),
    )
    .await;
    finish(spinner);

    let entries: Vec<AnalyzeEntry<'_>> = urls
        .iter()
        .zip(&results)
        .inspect(|(url, result)| {
            if result.is_err() {
                debug!(
                    "{} ended in state '{}'",
                    url,
                    session.orchestrator().state(url)
                );
            }
        })
        .map(|(url, result)| AnalyzeEntry {
            url,
            outcome: result.as_ref().ok(),
            error: result.as_ref().err(),
        })
        .collect();

    out.emit(&entries, || {
        entries
            .iter()
            .map(|entry| match (entry.outcome, entry.error) {
                (Some(outcome), _) => report::render_outcome(outcome),
                (None, Some(failure)) => report::render_failure(entry.url, failure),
                (None, None) => String::new(),
            })
            .collect()
    })?;

    if let Some(Ok(current)) = session.current_analysis() {
        debug!(
            "Current analysis: {} ({} link(s) pooled)",
            current.item.url,
            session.feeds().pool().len()
        );
    }

    if !no_feed {
        let placed = session.feeds().populate()?;
        if placed > 0 && !out.quiet && out.format == OutputFormat::Markdown {
            println!("📥 Added {} link(s) to your feeds.", placed);
        }
    }

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        warn!("{} of {} analyses failed", failed, results.len());
        return Ok(1);
    }
    Ok(0)
}

async fn handle_search(session: &Session, out: &Output, query: &str) -> Result<i32> {
    let spinner = out.spinner(format!("Searching [{}]...", query));
    let submitted = session.submit_search(query).await;
    finish(spinner);

    // One query per run, so the current search is the one just submitted.
    let result = session.current_search().unwrap_or(submitted);
    match result {
        Ok(found) => {
            out.emit(&found, || report::render_search(&found))?;
            Ok(0)
        }
        Err(failure) => {
            eprintln!("❌ {}", failure);
            Ok(1)
        }
    }
}

async fn handle_chat(session: &Session, out: &Output) -> Result<i32> {
    let mut transcript = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    if !out.quiet && out.format == OutputFormat::Markdown {
        let mode = match session.chat().mode() {
            AskMode::FreeText => "free text",
            AskMode::TagSearch => "tag search",
        };
        println!(
            "💬 Ask about your links ({}). Type `clear` to start over, `exit` or Ctrl-D to leave.",
            mode
        );
    }

    loop {
        if !out.quiet && out.format == OutputFormat::Markdown {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
        }

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.eq_ignore_ascii_case("clear") {
            transcript.clear();
            continue;
        }

        if let Some(answer) = transcript.send(session.chat(), line).await {
            out.emit(&answer, || format!("{}\n", report::render_answer(&answer)))?;
        }
    }

    debug!("Chat ended after {} message(s)", transcript.messages().len());
    Ok(0)
}

/// Fetch every analyzed link from the service into the pool.
async fn load_pool(session: &Session, out: &Output) -> Result<usize> {
    let spinner = out.spinner("Loading analyzed links...");
    let items = session.search().list_all().await;
    finish(spinner);

    let added = session.feeds().ingest(items?);
    debug!("Loaded {} link(s) into the pool", added);
    Ok(added)
}

async fn handle_feeds(session: &Session, out: &Output, action: FeedsCommand) -> Result<i32> {
    let feeds = session.feeds();

    match action {
        FeedsCommand::List => {
            let list = feeds.feeds();
            out.emit(&list, || report::render_feed_list(&list))?;
        }
        FeedsCommand::Show { id, min_grade } => {
            let feed = feeds
                .feed(&id)
                .ok_or_else(|| error::LinkError::FeedNotFound { id: id.clone() })?;
            let items = feeds.view(&id, min_grade)?;
            out.emit(&items, || report::render_feed_view(&feed, &items))?;
        }
        FeedsCommand::Add { name } => {
            let feed = feeds.add_feed(name.as_deref())?;
            out.emit(&feed, || {
                format!("✅ Created feed '{}' with id `{}`.\n", feed.name, feed.id)
            })?;
        }
        FeedsCommand::Remove { id } => {
            let feed = feeds.remove_feed(&id)?;
            out.emit(&feed, || format!("🗑️  Removed feed '{}'.\n", feed.name))?;
        }
        FeedsCommand::Rename { id, name } => {
            feeds.rename_feed(&id, &name)?;
            print_feed(out, feeds, &id)?;
        }
        FeedsCommand::Sort { id, rule } => {
            feeds.set_sort(&id, rule)?;
            print_feed(out, feeds, &id)?;
        }
        FeedsCommand::Tag { id, tag } => {
            let selected = feeds.toggle_tag(&id, &tag)?;
            if out.format == OutputFormat::Markdown && !out.quiet {
                let verb = if selected { "now filters on" } else { "no longer filters on" };
                println!("🏷️  Feed `{}` {} '{}'.", id, verb, tag.trim().to_lowercase());
            }
            print_feed(out, feeds, &id)?;
        }
        FeedsCommand::Filter { id, tags } => {
            let tags = tags
                .as_deref()
                .map(search::parse_tag_query)
                .unwrap_or_default();
            feeds.set_selected_tags(&id, tags.as_slice())?;
            print_feed(out, feeds, &id)?;
        }
        FeedsCommand::Move { url, to, from } => {
            analysis::dedup_key(&url)?;
            let url = url.trim();
            if feeds.find_item(url).is_none() {
                load_pool(session, out).await?;
            }
            feeds.move_item(url, from.as_deref(), &to)?;
            print_feed(out, feeds, &to)?;
        }
        FeedsCommand::Sync => {
            load_pool(session, out).await?;
            let placed = feeds.populate()?;
            let list = feeds.feeds();
            out.emit(&list, || {
                format!(
                    "🔄 Placed {} new link(s).\n\n{}",
                    placed,
                    report::render_feed_list(&list)
                )
            })?;
        }
    }

    Ok(0)
}

fn print_feed(out: &Output, feeds: &FeedAggregator, id: &str) -> Result<()> {
    let feed = feeds
        .feed(id)
        .ok_or_else(|| error::LinkError::FeedNotFound { id: id.to_string() })?;
    out.emit(&feed, || report::render_feed_list(std::slice::from_ref(&feed)))
}
