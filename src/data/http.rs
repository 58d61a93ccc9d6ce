//! HTTP transport seam
//!
//! The Are.na client never talks to reqwest directly; it goes through the
//! [`Transport`] trait so retry and paging logic can be exercised against
//! scripted responses.

use std::io;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use thiserror::Error;

/// Header carrying the remaining request budget
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Header carrying the total request budget
pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with no headers
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Reads an integer header value, ignoring anything unparseable
    pub fn header_u64(&self, name: &str) -> Option<u64> {
        self.headers
            .get(name)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Rate-limit budget advertised by the server, if both headers are present
    pub fn rate_limit(&self) -> Option<RateLimit> {
        Some(RateLimit {
            remaining: self.header_u64(RATE_LIMIT_REMAINING)?,
            limit: self.header_u64(RATE_LIMIT_LIMIT)?,
        })
    }
}

/// Request budget reported through `X-RateLimit-*` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: u64,
    pub limit: u64,
}

impl RateLimit {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// A request that never produced a response
#[derive(Debug, Error)]
pub enum TransportError {
    /// reqwest failed to send the request or read the body
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// I/O failure outside reqwest
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Something that can perform a GET and hand back the whole response
///
/// Errors are transport-level failures (DNS, connection reset, timeout);
/// non-success statuses are returned as normal responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Create a transport with a default reqwest client
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("arenaview/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Create a transport with a custom reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
