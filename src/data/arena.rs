//! Are.na API client
//!
//! Fetches channel metadata and paged channel contents from the public
//! Are.na v2 API, going through the retry policy for every request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::http::{ReqwestTransport, Transport, TransportError};
use super::retry::{get_with_retry, RetryPolicy};
use super::{Block, Channel};

/// Base URL for the Are.na API
pub const ARENA_BASE_URL: &str = "https://api.are.na/v2";

/// Errors that can occur when talking to Are.na
#[derive(Debug, Error)]
pub enum ArenaError {
    /// The request never produced a response
    #[error("HTTP request failed: {0}")]
    Request(#[from] TransportError),

    /// The server answered with a non-success status
    #[error("Unexpected status: {0}")]
    Status(StatusCode),

    /// The server answered 429
    #[error("Rate limited, retry after {}ms", .retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    /// The body did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Every attempt failed
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ArenaError> },
}

impl ArenaError {
    /// The failure that ended the request, looking through retries
    pub fn root(&self) -> &ArenaError {
        match self {
            ArenaError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Whether the channel does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), ArenaError::Status(StatusCode::NOT_FOUND))
    }

    /// Short, actionable message suitable for showing to a user
    pub fn user_message(&self) -> &'static str {
        match self.root() {
            ArenaError::Status(StatusCode::NOT_FOUND) => "Channel not found",
            ArenaError::Status(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                "This channel is private"
            }
            ArenaError::RateLimited { .. } => {
                "Are.na is rate limiting requests. Try again in a moment."
            }
            ArenaError::Malformed(_) => "Are.na sent an unexpected response. Try again later.",
            _ => "Couldn't reach Are.na. Check your connection and try again.",
        }
    }
}

/// Sort order for channel contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Manual channel order
    Position,
    /// Newest connection first
    #[default]
    ConnectedAt,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Position => "position",
            SortKey::ConnectedAt => "connected_at",
        }
    }

    /// Parses a sort key name as used on the command line
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "position" => Some(SortKey::Position),
            "connected_at" | "connected" | "recent" => Some(SortKey::ConnectedAt),
            _ => None,
        }
    }
}

/// Body of `GET /channels/{slug}/contents`
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    contents: Vec<Block>,
}

/// Client for the Are.na API
#[derive(Clone)]
pub struct ArenaClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    policy: RetryPolicy,
    sort: SortKey,
}

impl fmt::Debug for ArenaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .field("sort", &self.sort)
            .finish_non_exhaustive()
    }
}

impl Default for ArenaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaClient {
    /// Create a client for the public API using reqwest
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()))
    }

    /// Create a client over a custom transport
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: ARENA_BASE_URL.to_string(),
            policy: RetryPolicy::default(),
            sort: SortKey::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn channel_url(&self, slug: &str) -> String {
        format!("{}/channels/{}", self.base_url, slug)
    }

    pub fn contents_url(&self, slug: &str, page: u32, per: u32) -> String {
        format!(
            "{}/channels/{}/contents?page={}&per={}&sort={}&direction=desc",
            self.base_url,
            slug,
            page,
            per,
            self.sort.as_str()
        )
    }

    /// Fetch channel metadata
    pub async fn channel(&self, slug: &str) -> Result<Channel, ArenaError> {
        let response =
            get_with_retry(self.transport.as_ref(), &self.channel_url(slug), &self.policy).await?;
        serde_json::from_str(&response.body).map_err(ArenaError::Malformed)
    }

    /// Fetch one page of channel contents
    ///
    /// A body without a `contents` array is reported as [`ArenaError::Malformed`]
    /// and is not retried.
    pub async fn contents(&self, slug: &str, page: u32, per: u32) -> Result<Vec<Block>, ArenaError> {
        let url = self.contents_url(slug, page, per);
        let response = get_with_retry(self.transport.as_ref(), &url, &self.policy).await?;
        let parsed: ContentsResponse = serde_json::from_str(&response.body)
            .map_err(ArenaError::Malformed)?;
        Ok(parsed.contents)
    }
}
