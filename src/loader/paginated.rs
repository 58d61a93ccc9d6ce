//! Incremental page loader for channel contents
//!
//! `PaginatedLoader` drives sequential page fetches for the active channel.
//! It is a cheap, cloneable handle: a renderer asking for the next page and
//! the background poller can hold clones at the same time. The shared state
//! is only locked between awaits, and every fetch result is checked against
//! the selection it was issued for before it is applied.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::state::LoadState;
use crate::cache::{CachedChannel, ChannelCache};
use crate::data::{ArenaClient, ArenaError, Block, BlockId};

/// Default number of blocks per page
pub const DEFAULT_PAGE_SIZE: u32 = 24;

/// Loader tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Blocks requested per page
    pub page_size: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// What a page request did
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// A page was fetched and merged
    Loaded {
        page: u32,
        added: usize,
        total: usize,
        has_more: bool,
    },
    /// Page 1 failed and the cached snapshot is shown instead
    Stale {
        total: usize,
        stored_at: DateTime<Utc>,
    },
    /// A later page failed; paging stops with what is already loaded
    Ended { page: u32, reason: String },
    /// Nothing to do: a fetch is in flight, there are no more pages, or no
    /// channel is selected
    Skipped,
    /// The channel changed while the fetch was in flight; the result was dropped
    Superseded,
}

/// Result of a poll for newer content
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateCheck {
    /// No channel is selected
    Idle,
    /// The newest block is the one already shown
    UpToDate,
    /// New blocks were put at the front
    Updated { added: usize, newest: BlockId },
    /// Page 1 was missing or served from the cache and has now been fetched
    /// fresh, replacing everything shown
    Reloaded { total: usize, has_more: bool },
    /// The channel changed while checking
    Superseded,
}

/// Clears the `loading` flag when a page fetch is abandoned mid-flight
///
/// Only touches the state if the selection the fetch was issued for is still
/// active.
struct InFlight<'a> {
    state: &'a Mutex<LoadState>,
    generation: u64,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a Mutex<LoadState>, generation: u64) -> Self {
        Self {
            state,
            generation,
            armed: true,
        }
    }

    /// The fetch resolved; the caller takes over the flag
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation() == self.generation {
            debug!(generation = self.generation, "page fetch abandoned");
            state.set_loading(false);
        }
    }
}

/// Loads a channel page by page, with cache fallback and write-through
#[derive(Clone)]
pub struct PaginatedLoader {
    client: ArenaClient,
    cache: Option<ChannelCache>,
    state: Arc<Mutex<LoadState>>,
}

impl fmt::Debug for PaginatedLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedLoader")
            .field("client", &self.client)
            .field("cache", &self.cache)
            .field("state", &*self.lock())
            .finish()
    }
}

impl PaginatedLoader {
    pub fn new(client: ArenaClient, config: LoaderConfig) -> Self {
        Self {
            client,
            cache: None,
            state: Arc::new(Mutex::new(LoadState::new(config.page_size))),
        }
    }

    /// Use `cache` for first-page fallback and write-through
    pub fn with_cache(mut self, cache: ChannelCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn lock(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current paging state
    pub fn state(&self) -> LoadState {
        self.lock().clone()
    }

    /// Blocks loaded so far for the active channel
    pub fn items(&self) -> Vec<Block> {
        self.lock().items().to_vec()
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more()
    }

    pub fn current_channel(&self) -> Option<String> {
        self.lock().channel().map(str::to_string)
    }

    /// Makes `channel` the active channel with a fresh state
    ///
    /// Anything still in flight for the previous selection is discarded when
    /// it resolves.
    pub fn select_channel(&self, channel: &str) {
        let mut state = self.lock();
        state.reset(Some(channel.to_string()));
        debug!(channel, generation = state.generation(), "channel selected");
    }

    /// Starts the active channel over from page 1 (e.g. after a view switch)
    pub fn reset(&self) {
        let mut state = self.lock();
        let channel = state.channel().map(str::to_string);
        state.reset(channel);
    }

    /// Drops the active channel entirely
    pub fn clear(&self) {
        self.lock().reset(None);
    }

    /// Cached snapshot for the active channel, for showing something
    /// before page 1 arrives
    pub fn cached_snapshot(&self) -> Option<CachedChannel> {
        let channel = self.current_channel()?;
        self.cache.as_ref()?.get_entry(&channel)
    }

    /// Selects `channel` and loads its first page
    pub async fn load_first_page(&self, channel: &str) -> Result<PageOutcome, ArenaError> {
        self.select_channel(channel);
        self.load_next_page().await
    }

    /// Loads the next page of the active channel
    ///
    /// A no-op while a fetch is outstanding or once the last page was seen.
    /// Page 1 failures fall back to the cache and are returned as errors only
    /// when no fresh snapshot exists; later page failures end paging quietly.
    pub async fn load_next_page(&self) -> Result<PageOutcome, ArenaError> {
        let (channel, generation, page, page_size) = {
            let mut state = self.lock();
            let Some(channel) = state.channel().map(str::to_string) else {
                return Ok(PageOutcome::Skipped);
            };
            if state.is_loading() || !state.has_more() {
                return Ok(PageOutcome::Skipped);
            }
            state.set_loading(true);
            (channel, state.generation(), state.next_page(), state.page_size())
        };

        let in_flight = InFlight::new(&self.state, generation);
        let result = self.client.contents(&channel, page, page_size).await;
        in_flight.disarm();

        let mut state = self.lock();
        if state.generation() != generation {
            debug!(channel = %channel, page, "discarding result for previous selection");
            return Ok(PageOutcome::Superseded);
        }
        state.set_loading(false);

        match result {
            Ok(items) => {
                let added = state.apply_page(page, items);
                let snapshot = state.items().to_vec();
                let has_more = state.has_more();
                drop(state);

                debug!(channel = %channel, page, added, total = snapshot.len(), has_more, "page loaded");
                if let Some(cache) = &self.cache {
                    cache.put(&channel, &snapshot);
                }
                Ok(PageOutcome::Loaded {
                    page,
                    added,
                    total: snapshot.len(),
                    has_more,
                })
            }
            Err(error) if page == 1 => {
                state.mark_exhausted();
                let fallback = self.cache.as_ref().and_then(|c| c.get_entry(&channel));
                match fallback {
                    Some(entry) => {
                        warn!(channel = %channel, error = %error, "first page failed, serving cached snapshot");
                        let total = entry.items.len();
                        state.serve_stale(entry.items);
                        Ok(PageOutcome::Stale {
                            total,
                            stored_at: entry.stored_at,
                        })
                    }
                    None => {
                        warn!(channel = %channel, error = %error, "first page failed");
                        Err(error)
                    }
                }
            }
            Err(error) => {
                state.mark_exhausted();
                warn!(channel = %channel, page, error = %error, "page failed, no more content");
                Ok(PageOutcome::Ended {
                    page,
                    reason: error.to_string(),
                })
            }
        }
    }

    /// Checks whether the active channel has content newer than what is shown
    ///
    /// Fetches only the newest block; when it differs from the newest loaded
    /// block, page 1 is re-fetched, put in front and written to the cache.
    /// When page 1 never loaded or was served from the cache, page 1 is
    /// fetched fresh and replaces everything, so paging can resume.
    pub async fn check_for_updates(&self) -> Result<UpdateCheck, ArenaError> {
        let (channel, generation, known_newest, page_size, recovering) = {
            let state = self.lock();
            let Some(channel) = state.channel().map(str::to_string) else {
                return Ok(UpdateCheck::Idle);
            };
            (
                channel,
                state.generation(),
                state.newest_id().cloned(),
                state.page_size(),
                needs_reload(&state),
            )
        };

        let newest_id = if recovering {
            None
        } else {
            let newest = self.client.contents(&channel, 1, 1).await?;
            let Some(newest_id) = newest.first().map(|b| b.id.clone()) else {
                return Ok(UpdateCheck::UpToDate);
            };
            if known_newest.as_ref() == Some(&newest_id) {
                return Ok(UpdateCheck::UpToDate);
            }
            Some(newest_id)
        };

        let head = self.client.contents(&channel, 1, page_size).await?;
        let head_newest = head.first().map(|b| b.id.clone());

        let mut state = self.lock();
        if state.generation() != generation {
            return Ok(UpdateCheck::Superseded);
        }

        // A page load may have finished while this check was in flight
        let update = if needs_reload(&state) {
            state.apply_page(1, head);
            UpdateCheck::Reloaded {
                total: state.items().len(),
                has_more: state.has_more(),
            }
        } else {
            let added = state.replace_head(head);
            match newest_id.or(head_newest) {
                Some(newest) => UpdateCheck::Updated { added, newest },
                None => UpdateCheck::UpToDate,
            }
        };
        let snapshot = state.items().to_vec();
        drop(state);

        info!(channel = %channel, update = ?update, "checked for new content");
        if let Some(cache) = &self.cache {
            cache.put(&channel, &snapshot);
        }
        Ok(update)
    }
}

/// Page 1 is missing or came from the cache, with no page load in flight
fn needs_reload(state: &LoadState) -> bool {
    !state.is_loading() && (state.is_stale() || state.pages_loaded() == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::{generated_block, MockArena, ScriptedTransport};
    use crate::data::HttpResponse;
    use reqwest::StatusCode;
    use std::time::Duration;

    fn loader_for(arena: &MockArena, page_size: u32) -> PaginatedLoader {
        let client = ArenaClient::with_transport(Arc::new(arena.clone()));
        PaginatedLoader::new(client, LoaderConfig { page_size })
    }

    fn contents_body(count: u64) -> String {
        let blocks: Vec<Block> = (1..=count).rev().map(generated_block).collect();
        serde_json::json!({ "contents": blocks }).to_string()
    }

    #[test]
    fn test_loader_config_default() {
        assert_eq!(LoaderConfig::default().page_size, 24);
    }

    #[tokio::test]
    async fn test_page_length_decides_has_more() {
        for (count, expected) in [(10, true), (7, false), (0, false)] {
            let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(
                StatusCode::OK,
                contents_body(count),
            ))]);
            let client = ArenaClient::with_transport(Arc::new(transport));
            let loader = PaginatedLoader::new(client, LoaderConfig { page_size: 10 });

            let outcome = loader.load_first_page("demo").await.expect("Page should load");

            assert_eq!(
                outcome,
                PageOutcome::Loaded {
                    page: 1,
                    added: count as usize,
                    total: count as usize,
                    has_more: expected,
                },
                "page of {} items",
                count
            );
            assert_eq!(loader.has_more(), expected);
        }
    }

    #[tokio::test]
    async fn test_sequential_pages_accumulate() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 25);
        let loader = loader_for(&arena, 10);
        loader.select_channel("demo");

        let mut progress = Vec::new();
        for _ in 0..3 {
            loader.load_next_page().await.expect("Page should load");
            progress.push((loader.items().len(), loader.has_more()));
        }

        assert_eq!(progress, vec![(10, true), (20, true), (25, false)]);
        assert_eq!(loader.load_next_page().await.unwrap(), PageOutcome::Skipped);
        assert_eq!(arena.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_overlapping_calls_issue_one_request() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 30);
        let loader = loader_for(&arena, 10);
        loader.select_channel("demo");

        let (first, second) = tokio::join!(loader.load_next_page(), loader.load_next_page());

        assert!(matches!(first.unwrap(), PageOutcome::Loaded { page: 1, .. }));
        assert_eq!(second.unwrap(), PageOutcome::Skipped);
        assert_eq!(arena.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_no_channel_is_a_noop() {
        let arena = MockArena::new();
        let loader = loader_for(&arena, 10);

        assert_eq!(loader.load_next_page().await.unwrap(), PageOutcome::Skipped);
        assert_eq!(loader.check_for_updates().await.unwrap(), UpdateCheck::Idle);
        assert!(arena.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_switch_discards_in_flight_page() {
        let arena = MockArena::new();
        arena.add_channel("first", "First", 10);
        arena.add_channel("second", "Second", 10);
        arena.set_latency(Duration::from_millis(200));
        let loader = loader_for(&arena, 5);

        let switcher = loader.clone();
        let (outcome, ()) = tokio::join!(loader.load_first_page("first"), async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            switcher.select_channel("second");
        });

        assert_eq!(outcome.unwrap(), PageOutcome::Superseded);
        let state = loader.state();
        assert_eq!(state.channel(), Some("second"));
        assert!(state.items().is_empty());
        assert!(!state.is_loading());
        assert!(state.has_more());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_page_failure_serves_stale_cache() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 4);
        let cache = ChannelCache::in_memory();
        let loader = loader_for(&arena, 10).with_cache(cache.clone());

        loader.load_first_page("demo").await.expect("Initial load should work");
        assert_eq!(cache.get("demo").map(|b| b.len()), Some(4));

        arena.fail_next(3, StatusCode::BAD_GATEWAY);
        let outcome = loader.load_first_page("demo").await.expect("Cache should cover the failure");

        assert!(matches!(outcome, PageOutcome::Stale { total: 4, .. }));
        let state = loader.state();
        assert!(state.is_stale());
        assert!(!state.has_more());
        assert_eq!(state.items().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_page_failure_without_cache_is_an_error() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 4);
        arena.fail_next(3, StatusCode::SERVICE_UNAVAILABLE);
        let loader = loader_for(&arena, 10).with_cache(ChannelCache::in_memory());

        let error = loader.load_first_page("demo").await.expect_err("Nothing to fall back to");

        assert!(matches!(error, ArenaError::RetriesExhausted { attempts: 3, .. }));
        assert!(!loader.has_more());
        assert!(!loader.state().is_loading());
        assert_eq!(arena.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_page_failure_ends_paging() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 25);
        let loader = loader_for(&arena, 10);
        loader.load_first_page("demo").await.unwrap();

        arena.fail_next(3, StatusCode::INTERNAL_SERVER_ERROR);
        let outcome = loader.load_next_page().await.expect("Later pages never error");

        assert!(matches!(outcome, PageOutcome::Ended { page: 2, .. }));
        assert!(!loader.has_more());
        assert_eq!(loader.items().len(), 10, "Loaded content is kept");
        assert_eq!(loader.load_next_page().await.unwrap(), PageOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_every_page_is_written_through() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 15);
        let cache = ChannelCache::in_memory();
        let loader = loader_for(&arena, 10).with_cache(cache.clone());

        loader.load_first_page("demo").await.unwrap();
        assert_eq!(cache.get("demo").map(|b| b.len()), Some(10));

        loader.load_next_page().await.unwrap();
        assert_eq!(cache.get("demo"), Some(loader.items()));
    }

    #[tokio::test]
    async fn test_shifted_pages_do_not_duplicate_blocks() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 10);
        let loader = loader_for(&arena, 5);
        loader.load_first_page("demo").await.unwrap();

        // Two new blocks push 7 and 6 onto page 2
        arena.connect_new_blocks("demo", 2);
        let outcome = loader.load_next_page().await.unwrap();

        assert!(matches!(outcome, PageOutcome::Loaded { added: 3, total: 8, .. }));
    }

    #[tokio::test]
    async fn test_check_for_updates_prepends_new_blocks() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 12);
        let cache = ChannelCache::in_memory();
        let loader = loader_for(&arena, 5).with_cache(cache.clone());
        loader.load_first_page("demo").await.unwrap();
        loader.load_next_page().await.unwrap();

        assert_eq!(loader.check_for_updates().await.unwrap(), UpdateCheck::UpToDate);

        let added = arena.connect_new_blocks("demo", 2);
        let check = loader.check_for_updates().await.unwrap();

        assert_eq!(
            check,
            UpdateCheck::Updated {
                added: 2,
                newest: added[0].clone(),
            }
        );
        let items = loader.items();
        assert_eq!(items.len(), 12);
        assert_eq!(items[0].id, added[0]);
        assert_eq!(cache.get("demo"), Some(items));
    }

    #[tokio::test]
    async fn test_cached_snapshot_for_active_channel() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 3);
        let cache = ChannelCache::in_memory();
        let loader = loader_for(&arena, 10).with_cache(cache.clone());

        assert!(loader.cached_snapshot().is_none());
        loader.load_first_page("demo").await.unwrap();

        loader.select_channel("demo");
        let snapshot = loader.cached_snapshot().expect("Snapshot should exist");
        assert_eq!(snapshot.items.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_does_not_block_paging() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 12);
        arena.set_latency(Duration::from_millis(500));
        let loader = loader_for(&arena, 5);
        loader.select_channel("demo");

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), loader.load_next_page()).await;

        assert!(timed_out.is_err());
        assert!(!loader.state().is_loading());
        let outcome = loader.load_next_page().await.expect("Page should load");
        assert!(matches!(outcome, PageOutcome::Loaded { page: 1, total: 5, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_leaves_newer_selection_alone() {
        let arena = MockArena::new();
        arena.add_channel("first", "First", 5);
        arena.set_latency(Duration::from_millis(500));
        let loader = loader_for(&arena, 5);
        loader.select_channel("first");

        let mut fetch = Box::pin(loader.load_next_page());
        assert!(tokio::time::timeout(Duration::from_millis(100), &mut fetch)
            .await
            .is_err());

        loader.select_channel("second");
        loader.lock().set_loading(true);
        drop(fetch);

        assert!(loader.state().is_loading(), "Only the abandoned selection is cleared");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_recovers_stale_session() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 12);
        let cache = ChannelCache::in_memory();
        let loader = loader_for(&arena, 5).with_cache(cache.clone());
        loader.load_first_page("demo").await.unwrap();

        arena.fail_next(3, StatusCode::BAD_GATEWAY);
        let outcome = loader.load_first_page("demo").await.unwrap();
        assert!(matches!(outcome, PageOutcome::Stale { total: 5, .. }));

        let added = arena.connect_new_blocks("demo", 2);
        let check = loader.check_for_updates().await.unwrap();

        assert_eq!(
            check,
            UpdateCheck::Reloaded {
                total: 5,
                has_more: true,
            }
        );
        let state = loader.state();
        assert!(!state.is_stale());
        assert!(state.has_more());
        assert_eq!(state.newest_id(), Some(&added[0]));
        assert_eq!(cache.get("demo"), Some(loader.items()));

        let outcome = loader.load_next_page().await.unwrap();
        assert!(matches!(outcome, PageOutcome::Loaded { page: 2, total: 10, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_reloads_stale_session_with_unchanged_newest() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 3);
        let loader = loader_for(&arena, 5).with_cache(ChannelCache::in_memory());
        loader.load_first_page("demo").await.unwrap();
        arena.fail_next(3, StatusCode::BAD_GATEWAY);
        loader.load_first_page("demo").await.unwrap();
        let before = arena.requests().len();

        let check = loader.check_for_updates().await.unwrap();

        assert_eq!(
            check,
            UpdateCheck::Reloaded {
                total: 3,
                has_more: false,
            }
        );
        assert!(!loader.state().is_stale());
        let requests = arena.requests();
        assert_eq!(requests.len(), before + 1, "Page 1 is fetched directly");
        assert!(requests[before].contains("per=5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loads_first_page_after_failed_open() {
        let arena = MockArena::new();
        arena.add_channel("demo", "Demo", 8);
        arena.fail_next(3, StatusCode::SERVICE_UNAVAILABLE);
        let loader = loader_for(&arena, 5);
        assert!(loader.load_first_page("demo").await.is_err());

        let check = loader.check_for_updates().await.unwrap();

        assert_eq!(
            check,
            UpdateCheck::Reloaded {
                total: 5,
                has_more: true,
            }
        );
        assert!(matches!(
            loader.load_next_page().await.unwrap(),
            PageOutcome::Loaded { page: 2, total: 8, has_more: false, .. }
        ));
    }
}
