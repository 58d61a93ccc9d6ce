//! Command-line interface parsing for arenaview
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into the typed configuration the app starts from.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::app::ViewMode;
use crate::channels::DEFAULT_CHANNEL;
use crate::data::SortKey;
use crate::loader::{LoaderConfig, DEFAULT_PAGE_SIZE};
use crate::refresh::PollConfig;

/// Error types for CLI argument parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// The specified view name is not recognized
    #[error("Invalid view: '{0}'. Valid views: grid, diary")]
    InvalidView(String),

    /// The specified sort key is not recognized
    #[error("Invalid sort: '{0}'. Valid sorts: connected_at, position")]
    InvalidSort(String),

    /// A count that has to be positive was zero
    #[error("--{0} must be at least 1")]
    Zero(&'static str),
}

/// arenaview - Browse Are.na channels from the terminal
#[derive(Parser, Debug)]
#[command(name = "arenaview")]
#[command(about = "Browse Are.na channels from the terminal")]
#[command(version)]
pub struct Cli {
    /// Channel slug or Are.na channel URL
    ///
    /// Examples:
    ///   arenaview interior-2030
    ///   arenaview https://www.are.na/kent/words-igfvslsuyr0
    #[arg(value_name = "CHANNEL", default_value = DEFAULT_CHANNEL)]
    pub channel: String,

    /// Number of pages to load
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub pages: u32,

    /// Blocks per page
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PAGE_SIZE)]
    pub per: u32,

    /// Layout: grid or diary
    #[arg(long, value_name = "VIEW", default_value = "grid")]
    pub view: String,

    /// Content order: connected_at or position
    #[arg(long, value_name = "SORT", default_value = "connected_at")]
    pub sort: String,

    /// Keep running and print new blocks as they are connected
    #[arg(long)]
    pub watch: bool,

    /// Seconds between checks for new content with --watch
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub interval: u64,

    /// Search the featured channels instead of opening one
    #[arg(long, value_name = "QUERY")]
    pub search: Option<String>,

    /// List the featured channels with live metadata
    #[arg(long)]
    pub featured: bool,

    /// Remove every cached channel before doing anything else
    #[arg(long)]
    pub clear_cache: bool,

    /// Keep the cache in memory only
    #[arg(long)]
    pub no_disk_cache: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// What the binary should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a channel (the default)
    Open,
    /// Print channel picker results
    Search(String),
    /// Print the featured channels
    Featured,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub action: Action,
    /// Channel slug or URL as typed; validated when opened
    pub channel: String,
    pub pages: u32,
    pub view: ViewMode,
    pub sort: SortKey,
    pub loader: LoaderConfig,
    pub poll: PollConfig,
    pub watch: bool,
    pub clear_cache: bool,
    pub disk_cache: bool,
    pub verbose: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            action: Action::Open,
            channel: DEFAULT_CHANNEL.to_string(),
            pages: 1,
            view: ViewMode::default(),
            sort: SortKey::default(),
            loader: LoaderConfig::default(),
            poll: PollConfig::default(),
            watch: false,
            clear_cache: false,
            disk_cache: true,
            verbose: false,
        }
    }
}

/// Parses a view name argument into a ViewMode
pub fn parse_view_arg(s: &str) -> Result<ViewMode, CliError> {
    ViewMode::parse(s).ok_or_else(|| CliError::InvalidView(s.to_string()))
}

/// Parses a sort argument into a SortKey
pub fn parse_sort_arg(s: &str) -> Result<SortKey, CliError> {
    SortKey::parse(s).ok_or_else(|| CliError::InvalidSort(s.to_string()))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if a view, sort or count is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let view = parse_view_arg(&cli.view)?;
        let sort = parse_sort_arg(&cli.sort)?;
        if cli.pages == 0 {
            return Err(CliError::Zero("pages"));
        }
        if cli.per == 0 {
            return Err(CliError::Zero("per"));
        }
        if cli.interval == 0 {
            return Err(CliError::Zero("interval"));
        }

        let action = match (&cli.search, cli.featured) {
            (Some(query), _) => Action::Search(query.clone()),
            (None, true) => Action::Featured,
            (None, false) => Action::Open,
        };

        Ok(StartupConfig {
            action,
            channel: cli.channel.clone(),
            pages: cli.pages,
            view,
            sort,
            loader: LoaderConfig { page_size: cli.per },
            poll: PollConfig {
                interval: Duration::from_secs(cli.interval),
                enabled: cli.watch,
            },
            watch: cli.watch,
            clear_cache: cli.clear_cache,
            disk_cache: !cli.no_disk_cache,
            verbose: cli.verbose,
        })
    }
}
