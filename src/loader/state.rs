//! Paging state for the active channel

use std::collections::HashSet;

use crate::data::{Block, BlockId};

/// Per-selection paging state
///
/// A fresh state is created for every channel selection; `generation`
/// identifies the selection so late fetch results can be recognised.
#[derive(Debug, Clone)]
pub struct LoadState {
    channel: Option<String>,
    generation: u64,
    pages_loaded: u32,
    page_size: u32,
    has_more: bool,
    loading: bool,
    stale: bool,
    accumulated: Vec<Block>,
    seen: HashSet<BlockId>,
}

impl LoadState {
    /// An idle state with no channel selected
    pub fn new(page_size: u32) -> Self {
        Self {
            channel: None,
            generation: 0,
            pages_loaded: 0,
            page_size: page_size.max(1),
            has_more: false,
            loading: false,
            stale: false,
            accumulated: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Starts a new selection, dropping everything loaded so far
    pub(crate) fn reset(&mut self, channel: Option<String>) {
        self.has_more = channel.is_some();
        self.channel = channel;
        self.generation += 1;
        self.pages_loaded = 0;
        self.loading = false;
        self.stale = false;
        self.accumulated.clear();
        self.seen.clear();
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last page loaded, or 1 before anything has loaded
    pub fn current_page(&self) -> u32 {
        self.pages_loaded.max(1)
    }

    pub fn next_page(&self) -> u32 {
        self.pages_loaded + 1
    }

    pub fn pages_loaded(&self) -> u32 {
        self.pages_loaded
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the items were served from the cache after a failed load
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn items(&self) -> &[Block] {
        &self.accumulated
    }

    pub fn newest_id(&self) -> Option<&BlockId> {
        self.accumulated.first().map(|b| &b.id)
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub(crate) fn mark_exhausted(&mut self) {
        self.has_more = false;
    }

    /// Merges a fetched page, returning how many new blocks were added
    ///
    /// Page 1 replaces everything; later pages append. Blocks already present
    /// are skipped. `has_more` follows the raw page length.
    pub(crate) fn apply_page(&mut self, page: u32, items: Vec<Block>) -> usize {
        if page <= 1 {
            self.accumulated.clear();
            self.seen.clear();
        }
        self.has_more = items.len() as u32 >= self.page_size;
        self.pages_loaded = page;
        self.stale = false;

        let before = self.accumulated.len();
        for item in items {
            if self.seen.insert(item.id.clone()) {
                self.accumulated.push(item);
            }
        }
        self.accumulated.len() - before
    }

    /// Replaces everything with a cached snapshot after page 1 failed
    pub(crate) fn serve_stale(&mut self, items: Vec<Block>) {
        self.seen = items.iter().map(|b| b.id.clone()).collect();
        self.accumulated = items;
        self.has_more = false;
        self.stale = true;
    }

    /// Puts a freshly fetched first page in front of what is loaded
    ///
    /// Blocks from `head` that were already loaded further down are moved to
    /// the front. Returns how many blocks were not loaded before.
    pub(crate) fn replace_head(&mut self, head: Vec<Block>) -> usize {
        let mut head_ids = HashSet::with_capacity(head.len());
        let mut merged = Vec::with_capacity(head.len() + self.accumulated.len());
        let mut added = 0;

        for item in head {
            if head_ids.insert(item.id.clone()) {
                if !self.seen.contains(&item.id) {
                    added += 1;
                }
                merged.push(item);
            }
        }
        merged.extend(
            self.accumulated
                .drain(..)
                .filter(|b| !head_ids.contains(&b.id)),
        );

        self.seen = merged.iter().map(|b| b.id.clone()).collect();
        self.accumulated = merged;
        self.pages_loaded = self.pages_loaded.max(1);
        added
    }
}
