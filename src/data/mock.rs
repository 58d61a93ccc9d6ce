//! In-memory transports for tests
//!
//! [`ScriptedTransport`] replays a fixed list of responses. [`MockArena`]
//! imitates the Are.na endpoints used by this crate, serving paged contents
//! from channels registered in memory.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{StatusCode, Url};
use tokio::time::Instant;

use super::http::{HttpResponse, Transport, TransportError};
use super::{Block, BlockId, BlockKind, Channel};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replays canned responses in order
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// When each request was issued, on the tokio clock
    pub fn call_times(&self) -> Vec<Instant> {
        lock(&self.calls).iter().map(|(_, at)| *at).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(url, _)| url.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        lock(&self.calls).push((url.to_string(), Instant::now()));
        lock(&self.script).pop_front().unwrap_or_else(|| {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted").into())
        })
    }
}

#[derive(Debug, Default)]
struct MockChannel {
    title: String,
    blocks: Vec<Block>,
}

#[derive(Debug, Default)]
struct MockState {
    channels: HashMap<String, MockChannel>,
    requests: Vec<String>,
    failures: VecDeque<StatusCode>,
    latency: Option<Duration>,
    next_id: u64,
}

/// Fake Are.na server holding channels in memory
///
/// Blocks are generated newest first, so page 1 always holds the most
/// recently connected blocks.
#[derive(Debug, Clone, Default)]
pub struct MockArena {
    state: Arc<Mutex<MockState>>,
}

impl MockArena {
    pub fn new() -> Self {
        let arena = Self::default();
        lock(&arena.state).next_id = 1;
        arena
    }

    /// Registers a channel with `count` generated blocks
    pub fn add_channel(&self, slug: &str, title: &str, count: usize) {
        let mut state = lock(&self.state);
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            let id = state.next_id;
            state.next_id += 1;
            blocks.push(generated_block(id));
        }
        // Newest (highest id) first
        blocks.reverse();
        state.channels.insert(
            slug.to_string(),
            MockChannel {
                title: title.to_string(),
                blocks,
            },
        );
    }

    /// Connects `count` new blocks to the front of a channel
    pub fn connect_new_blocks(&self, slug: &str, count: usize) -> Vec<BlockId> {
        let mut state = lock(&self.state);
        let mut added = Vec::with_capacity(count);
        for _ in 0..count {
            let id = state.next_id;
            state.next_id += 1;
            added.push(generated_block(id));
        }
        added.reverse();
        let ids = added.iter().map(|b| b.id.clone()).collect();
        if let Some(channel) = state.channels.get_mut(slug) {
            added.append(&mut channel.blocks);
            channel.blocks = added;
        }
        ids
    }

    /// Makes the next `times` requests fail with `status`
    pub fn fail_next(&self, times: usize, status: StatusCode) {
        let mut state = lock(&self.state);
        state.failures.extend(std::iter::repeat(status).take(times));
    }

    /// Delays every response by `latency` on the tokio clock
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = Some(latency);
    }

    /// Every URL requested so far
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    fn respond(&self, url: &str) -> HttpResponse {
        let mut state = lock(&self.state);
        state.requests.push(url.to_string());

        if let Some(status) = state.failures.pop_front() {
            return HttpResponse::new(status, "");
        }

        let Ok(parsed) = Url::parse(url) else {
            return HttpResponse::new(StatusCode::BAD_REQUEST, "");
        };
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let Some(pos) = segments.iter().position(|s| *s == "channels") else {
            return HttpResponse::new(StatusCode::NOT_FOUND, "");
        };
        let Some(channel) = segments.get(pos + 1).and_then(|s| state.channels.get(*s)) else {
            return HttpResponse::new(StatusCode::NOT_FOUND, r#"{"message":"Not found"}"#);
        };

        match segments.get(pos + 2) {
            None => {
                let meta = Channel {
                    title: channel.title.clone(),
                    slug: segments[pos + 1].to_string(),
                    description: None,
                    length: channel.blocks.len() as u32,
                    user: None,
                    metadata: None,
                };
                json_response(&meta)
            }
            Some(&"contents") => {
                let query: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
                let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                let per: usize = query.get("per").and_then(|p| p.parse().ok()).unwrap_or(24);
                let start = page.saturating_sub(1).saturating_mul(per);
                let slice: Vec<&Block> = channel.blocks.iter().skip(start).take(per).collect();
                json_response(&serde_json::json!({ "contents": slice }))
            }
            Some(_) => HttpResponse::new(StatusCode::NOT_FOUND, ""),
        }
    }
}

#[async_trait]
impl Transport for MockArena {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let latency = lock(&self.state).latency;
        // Always suspend at least once, like a real request would
        tokio::task::yield_now().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.respond(url))
    }
}

fn json_response<T: serde::Serialize>(value: &T) -> HttpResponse {
    match serde_json::to_string(value) {
        Ok(body) => HttpResponse::new(StatusCode::OK, body),
        Err(e) => HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// A text block whose connection time grows with its id
pub fn generated_block(id: u64) -> Block {
    let connected_at = Utc
        .timestamp_opt(1_700_000_000 + (id as i64) * 3_600, 0)
        .single();
    Block {
        id: BlockId::Number(id),
        title: Some(format!("Block {}", id)),
        description: None,
        connected_at,
        kind: BlockKind::Text {
            content: Some(format!("content of block {}", id)),
        },
    }
}
