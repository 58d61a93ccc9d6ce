//! Application state management for arenaview
//!
//! `App` owns the API client, the cache, the page loader and the poller.
//! Front ends drive it only through [`App::dispatch`], which turns a
//! [`Command`] into an [`AppEvent`] describing what changed.

use tracing::{info, warn};

use crate::cache::ChannelCache;
use crate::channels::{self, SearchResult};
use crate::cli::StartupConfig;
use crate::data::{extract_channel_slug, ArenaClient, ArenaError, Block, Channel};
use crate::loader::{LoadState, LoaderConfig, PageOutcome, PaginatedLoader};
use crate::refresh::{PollConfig, PollHandle, RefreshMessage};
use crate::render;

/// How channel contents are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Channel order, one entry per block
    #[default]
    Grid,
    /// Grouped by the day blocks were connected
    Diary,
}

impl ViewMode {
    /// Parses a view name as used on the command line
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "grid" => Some(ViewMode::Grid),
            "diary" => Some(ViewMode::Diary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::Diary => "diary",
        }
    }
}

/// Requests a front end can make
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a channel by slug or URL
    Open(String),
    /// Load the next page of the open channel
    LoadMore,
    /// Change the layout and reload the open channel from page 1
    SwitchView(ViewMode),
    /// Search the channel picker
    Search(String),
    /// Drop every cached channel
    ClearCache,
    /// Close the open channel and stop polling
    Close,
}

/// What a command did
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A page request for `channel` finished
    Loaded { channel: String, outcome: PageOutcome },
    /// The layout changed; `outcome` is the reload, if a channel is open
    ViewChanged {
        mode: ViewMode,
        outcome: Option<PageOutcome>,
    },
    SearchResults(Vec<SearchResult>),
    CacheCleared,
    Closed,
    /// Short message for the user; details are in the log
    Error(String),
}

/// Main application struct managing state and data
pub struct App {
    /// Current layout
    pub view_mode: ViewMode,
    /// Metadata of the open channel, when it could be fetched
    pub channel: Option<Channel>,
    client: ArenaClient,
    cache: Option<ChannelCache>,
    loader: PaginatedLoader,
    poll_config: PollConfig,
    poller: Option<PollHandle>,
}

impl App {
    /// Creates an App from its parts
    pub fn new(
        client: ArenaClient,
        cache: Option<ChannelCache>,
        loader_config: LoaderConfig,
        poll_config: PollConfig,
    ) -> Self {
        let mut loader = PaginatedLoader::new(client.clone(), loader_config);
        if let Some(cache) = &cache {
            loader = loader.with_cache(cache.clone());
        }
        Self {
            view_mode: ViewMode::default(),
            channel: None,
            client,
            cache,
            loader,
            poll_config,
            poller: None,
        }
    }

    /// Creates an App talking to the public API, configured from the CLI
    ///
    /// The disk cache is used unless disabled or unavailable, in which case
    /// the cache only lives in memory.
    pub fn with_startup_config(config: &StartupConfig) -> Self {
        let client = ArenaClient::new().with_sort(config.sort);
        let cache = if config.disk_cache {
            ChannelCache::new().or_else(|| {
                warn!("no cache directory available, caching in memory");
                Some(ChannelCache::in_memory())
            })
        } else {
            Some(ChannelCache::in_memory())
        };
        let mut app = Self::new(client, cache, config.loader.clone(), config.poll.clone());
        app.view_mode = config.view;
        app
    }

    /// The loader for the open channel
    pub fn loader(&self) -> &PaginatedLoader {
        &self.loader
    }

    pub fn client(&self) -> &ArenaClient {
        &self.client
    }

    /// Blocks loaded so far
    pub fn items(&self) -> Vec<Block> {
        self.loader.items()
    }

    /// Paging state of the open channel
    pub fn load_state(&self) -> LoadState {
        self.loader.state()
    }

    /// Slug of the open channel
    pub fn current_channel(&self) -> Option<String> {
        self.loader.current_channel()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(PollHandle::is_running)
    }

    /// Handles one command
    pub async fn dispatch(&mut self, command: Command) -> AppEvent {
        match command {
            Command::Open(input) => self.open(&input).await,
            Command::LoadMore => self.load_more().await,
            Command::SwitchView(mode) => self.switch_view(mode).await,
            Command::Search(query) => AppEvent::SearchResults(channels::search(&query)),
            Command::ClearCache => {
                if let Some(cache) = &self.cache {
                    cache.clear();
                }
                AppEvent::CacheCleared
            }
            Command::Close => {
                self.stop_polling().await;
                self.loader.clear();
                self.channel = None;
                AppEvent::Closed
            }
        }
    }

    async fn open(&mut self, input: &str) -> AppEvent {
        let slug = match extract_channel_slug(input) {
            Ok(slug) => slug,
            Err(e) => return AppEvent::Error(e.to_string()),
        };

        self.stop_polling().await;
        self.loader.select_channel(&slug);

        self.channel = match self.client.channel(&slug).await {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!(channel = %slug, error = %e, "channel metadata unavailable");
                None
            }
        };

        match self.loader.load_first_page(&slug).await {
            Ok(outcome) => {
                info!(channel = %slug, "channel opened");
                self.start_polling();
                AppEvent::Loaded {
                    channel: slug,
                    outcome,
                }
            }
            Err(e) => load_error(&slug, e),
        }
    }

    async fn load_more(&mut self) -> AppEvent {
        let Some(channel) = self.loader.current_channel() else {
            return AppEvent::Error("Open a channel first".to_string());
        };
        match self.loader.load_next_page().await {
            Ok(outcome) => AppEvent::Loaded { channel, outcome },
            Err(e) => load_error(&channel, e),
        }
    }

    async fn switch_view(&mut self, mode: ViewMode) -> AppEvent {
        self.view_mode = mode;
        let Some(channel) = self.loader.current_channel() else {
            return AppEvent::ViewChanged {
                mode,
                outcome: None,
            };
        };

        self.loader.reset();
        match self.loader.load_next_page().await {
            Ok(outcome) => AppEvent::ViewChanged {
                mode,
                outcome: Some(outcome),
            },
            Err(e) => load_error(&channel, e),
        }
    }

    fn start_polling(&mut self) {
        if self.poll_config.enabled {
            self.poller = Some(PollHandle::spawn(
                self.loader.clone(),
                self.poll_config.clone(),
            ));
        }
    }

    async fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.shutdown().await;
        }
    }

    /// Poll results that arrived since the last call
    pub fn poll_messages(&mut self) -> Vec<RefreshMessage> {
        let Some(poller) = self.poller.as_mut() else {
            return Vec::new();
        };
        std::iter::from_fn(|| poller.try_recv()).collect()
    }

    /// Waits for the next poll result; `None` when not polling
    pub async fn next_poll_message(&mut self) -> Option<RefreshMessage> {
        self.poller.as_mut()?.recv().await
    }

    /// The open channel in the current layout
    pub fn render(&self) -> String {
        let items = self.items();
        let mut out = self
            .channel
            .as_ref()
            .map(render::render_header)
            .unwrap_or_default();
        if self.load_state().is_stale() {
            out.push_str("(offline, showing saved copy)\n");
        }
        out.push_str(&self.render_blocks(&items));
        out
    }

    /// `blocks` in the current layout, without the channel header
    pub fn render_blocks(&self, blocks: &[Block]) -> String {
        match self.view_mode {
            ViewMode::Grid => render::render_grid(blocks),
            ViewMode::Diary => render::render_diary(blocks),
        }
    }
}

fn load_error(channel: &str, error: ArenaError) -> AppEvent {
    warn!(channel, error = %error, "loading failed");
    AppEvent::Error(error.user_message().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::MockArena;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_app(arena: &MockArena, page_size: u32) -> App {
        let client = ArenaClient::with_transport(Arc::new(arena.clone()));
        let poll = PollConfig {
            enabled: false,
            ..Default::default()
        };
        App::new(
            client,
            Some(ChannelCache::in_memory()),
            LoaderConfig { page_size },
            poll,
        )
    }

    #[test]
    fn test_view_mode_parse() {
        assert_eq!(ViewMode::parse("GRID"), Some(ViewMode::Grid));
        assert_eq!(ViewMode::parse("diary"), Some(ViewMode::Diary));
        assert_eq!(ViewMode::parse("list"), None);
        assert_eq!(ViewMode::Diary.as_str(), "diary");
    }

    #[tokio::test]
    async fn test_open_loads_first_page_and_metadata() {
        let arena = MockArena::new();
        arena.add_channel("interior-2030", "Interior 2030", 12);
        let mut app = test_app(&arena, 5);

        let event = app
            .dispatch(Command::Open("https://www.are.na/kent/interior-2030".to_string()))
            .await;

        assert_eq!(
            event,
            AppEvent::Loaded {
                channel: "interior-2030".to_string(),
                outcome: PageOutcome::Loaded {
                    page: 1,
                    added: 5,
                    total: 5,
                    has_more: true,
                },
            }
        );
        assert_eq!(app.channel.as_ref().map(|c| c.length), Some(12));
        assert!(app.render().starts_with("Interior 2030 (12 blocks)\n"));
    }

    #[tokio::test]
    async fn test_open_rejects_bad_input_without_requests() {
        let arena = MockArena::new();
        let mut app = test_app(&arena, 5);

        let event = app.dispatch(Command::Open("   ".to_string())).await;
        assert_eq!(
            event,
            AppEvent::Error("Please enter a channel slug or URL".to_string())
        );

        let event = app.dispatch(Command::Open("not a slug!".to_string())).await;
        assert!(matches!(event, AppEvent::Error(_)));
        assert!(arena.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_missing_channel_reports_not_found() {
        let arena = MockArena::new();
        let mut app = test_app(&arena, 5);

        let event = app.dispatch(Command::Open("missing".to_string())).await;

        assert_eq!(event, AppEvent::Error("Channel not found".to_string()));
        assert!(app.channel.is_none());
    }

    #[tokio::test]
    async fn test_load_more_appends() {
        let arena = MockArena::new();
        arena.add_channel("words", "Words", 8);
        let mut app = test_app(&arena, 5);
        app.dispatch(Command::Open("words".to_string())).await;

        let event = app.dispatch(Command::LoadMore).await;

        assert!(matches!(
            event,
            AppEvent::Loaded {
                outcome: PageOutcome::Loaded { page: 2, total: 8, has_more: false, .. },
                ..
            }
        ));
        assert_eq!(app.items().len(), 8);
    }

    #[tokio::test]
    async fn test_load_more_without_channel() {
        let arena = MockArena::new();
        let mut app = test_app(&arena, 5);
        assert_eq!(
            app.dispatch(Command::LoadMore).await,
            AppEvent::Error("Open a channel first".to_string())
        );
    }

    #[tokio::test]
    async fn test_switch_view_reloads_first_page() {
        let arena = MockArena::new();
        arena.add_channel("words", "Words", 12);
        let mut app = test_app(&arena, 5);
        app.dispatch(Command::Open("words".to_string())).await;
        app.dispatch(Command::LoadMore).await;
        assert_eq!(app.items().len(), 10);

        let event = app.dispatch(Command::SwitchView(ViewMode::Diary)).await;

        assert!(matches!(
            event,
            AppEvent::ViewChanged {
                mode: ViewMode::Diary,
                outcome: Some(PageOutcome::Loaded { page: 1, total: 5, .. }),
            }
        ));
        assert_eq!(app.view_mode, ViewMode::Diary);
        assert_eq!(app.items().len(), 5);
    }

    #[tokio::test]
    async fn test_switch_view_without_channel() {
        let arena = MockArena::new();
        let mut app = test_app(&arena, 5);

        let event = app.dispatch(Command::SwitchView(ViewMode::Diary)).await;

        assert_eq!(
            event,
            AppEvent::ViewChanged {
                mode: ViewMode::Diary,
                outcome: None,
            }
        );
        assert!(arena.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_copy_after_failure() {
        let arena = MockArena::new();
        arena.add_channel("words", "Words", 3);
        let mut app = test_app(&arena, 5);
        app.dispatch(Command::Open("words".to_string())).await;

        arena.fail_next(6, StatusCode::BAD_GATEWAY);
        let event = app.dispatch(Command::Open("words".to_string())).await;

        assert!(matches!(
            event,
            AppEvent::Loaded {
                outcome: PageOutcome::Stale { total: 3, .. },
                ..
            }
        ));
        assert!(app.render().contains("offline"));
    }

    #[test]
    fn test_render_blocks_follows_view_mode() {
        let arena = MockArena::new();
        let mut app = test_app(&arena, 5);
        let blocks = vec![
            crate::data::mock::generated_block(1),
            crate::data::mock::generated_block(2),
        ];

        let grid = app.render_blocks(&blocks);
        assert!(!grid.contains("2023"));
        assert_eq!(grid.lines().count(), 2);

        app.view_mode = ViewMode::Diary;
        let diary = app.render_blocks(&blocks);
        assert!(diary.starts_with("Wednesday, November 15, 2023\n"));
        assert!(diary.contains("Tuesday, November 14, 2023\n  [text      ] Block 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_removes_fallback() {
        let arena = MockArena::new();
        arena.add_channel("words", "Words", 3);
        let mut app = test_app(&arena, 5);
        app.dispatch(Command::Open("words".to_string())).await;

        assert_eq!(app.dispatch(Command::ClearCache).await, AppEvent::CacheCleared);

        arena.fail_next(6, StatusCode::BAD_GATEWAY);
        let event = app.dispatch(Command::Open("words".to_string())).await;
        assert!(matches!(event, AppEvent::Error(_)));
    }

    #[tokio::test]
    async fn test_search_command() {
        let arena = MockArena::new();
        let mut app = test_app(&arena, 5);

        let event = app.dispatch(Command::Search("tennis".to_string())).await;

        let AppEvent::SearchResults(results) = event else {
            panic!("Expected search results");
        };
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].slug(), "tennis-is-life");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_starts_on_open_and_stops_on_close() {
        let arena = MockArena::new();
        arena.add_channel("words", "Words", 3);
        let client = ArenaClient::with_transport(Arc::new(arena.clone()));
        let poll = PollConfig {
            interval: Duration::from_secs(10),
            enabled: true,
        };
        let mut app = App::new(client, None, LoaderConfig { page_size: 5 }, poll);

        app.dispatch(Command::Open("words".to_string())).await;
        assert!(app.is_polling());

        arena.connect_new_blocks("words", 2);
        let message = app.next_poll_message().await;
        assert_eq!(
            message,
            Some(RefreshMessage::NewContent {
                channel: "words".to_string(),
                added: 2,
            })
        );
        assert_eq!(app.items().len(), 5);

        assert_eq!(app.dispatch(Command::Close).await, AppEvent::Closed);
        assert!(!app.is_polling());
        assert!(app.current_channel().is_none());
        assert!(app.poll_messages().is_empty());
    }
}
