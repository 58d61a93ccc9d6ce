//! Bounded retry with fixed backoff and rate-limit awareness

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use super::arena::ArenaError;
use super::http::{HttpResponse, Transport};

/// How to read an integer `Retry-After` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryAfterUnit {
    #[default]
    Millis,
    Seconds,
}

/// Retry configuration for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait after a failed attempt that was not rate-limited
    pub retry_delay: Duration,
    /// Wait after a 429 without a usable `Retry-After` header
    pub rate_limit_delay: Duration,
    /// Unit of the server-supplied `Retry-After` value
    pub retry_after_unit: RetryAfterUnit,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            rate_limit_delay: Duration::from_millis(1000),
            retry_after_unit: RetryAfterUnit::Millis,
        }
    }
}

impl RetryPolicy {
    /// Delay requested by a rate-limited response
    pub fn rate_limit_wait(&self, response: &HttpResponse) -> Duration {
        match response.header_u64("retry-after") {
            Some(value) => match self.retry_after_unit {
                RetryAfterUnit::Millis => Duration::from_millis(value),
                RetryAfterUnit::Seconds => Duration::from_secs(value),
            },
            None => self.rate_limit_delay,
        }
    }
}

/// Issues a GET, retrying transient failures up to `policy.max_attempts` times
///
/// Returns the first successful response. A 429 waits for the server's
/// `Retry-After`; any other failure waits `retry_delay`. Every failure counts
/// as an attempt, and there is no wait after the last one.
pub async fn get_with_retry(
    transport: &dyn Transport,
    url: &str,
    policy: &RetryPolicy,
) -> Result<HttpResponse, ArenaError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!(url, attempt, "GET");

        let (error, delay) = match transport.get(url).await {
            Ok(response) if response.status.is_success() => {
                if let Some(limit) = response.rate_limit() {
                    debug!(remaining = limit.remaining, limit = limit.limit, "rate limit");
                    if limit.is_exhausted() {
                        warn!(url, "rate limit budget exhausted");
                    }
                }
                return Ok(response);
            }
            Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                let wait = policy.rate_limit_wait(&response);
                (ArenaError::RateLimited { retry_after: wait }, wait)
            }
            Ok(response) => (ArenaError::Status(response.status), policy.retry_delay),
            Err(e) => (ArenaError::Request(e), policy.retry_delay),
        };

        if attempt >= attempts {
            warn!(url, attempt, error = %error, "request failed, giving up");
            return Err(ArenaError::RetriesExhausted {
                attempts,
                last: Box::new(error),
            });
        }

        warn!(url, attempt, error = %error, delay_ms = delay.as_millis() as u64, "request failed, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::ScriptedTransport;
    use reqwest::header::HeaderValue;
    use std::io;

    fn rate_limited(retry_after: Option<&'static str>) -> HttpResponse {
        let mut response = HttpResponse::new(StatusCode::TOO_MANY_REQUESTS, "");
        if let Some(value) = retry_after {
            response
                .headers
                .insert("retry-after", HeaderValue::from_static(value));
        }
        response
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay, Duration::from_millis(1000));
        assert_eq!(policy.rate_limit_delay, Duration::from_millis(1000));
        assert_eq!(policy.retry_after_unit, RetryAfterUnit::Millis);
    }

    #[test]
    fn test_rate_limit_wait_units() {
        let mut policy = RetryPolicy::default();
        let response = rate_limited(Some("2"));
        assert_eq!(policy.rate_limit_wait(&response), Duration::from_millis(2));

        policy.retry_after_unit = RetryAfterUnit::Seconds;
        assert_eq!(policy.rate_limit_wait(&response), Duration::from_secs(2));

        assert_eq!(
            policy.rate_limit_wait(&rate_limited(None)),
            Duration::from_millis(1000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_then_success_waits_retry_after() {
        let transport = ScriptedTransport::new(vec![
            Ok(rate_limited(Some("500"))),
            Ok(HttpResponse::new(StatusCode::OK, "ok")),
        ]);

        let response = get_with_retry(&transport, "http://test/x", &RetryPolicy::default())
            .await
            .expect("Second attempt should succeed");

        assert_eq!(response.body, "ok");
        let calls = transport.call_times();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(StatusCode::BAD_GATEWAY, "")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset").into()),
            Ok(HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE, "")),
            Ok(HttpResponse::new(StatusCode::OK, "too late")),
        ]);

        let error = get_with_retry(&transport, "http://test/x", &RetryPolicy::default())
            .await
            .expect_err("Three failures should exhaust the policy");

        match error {
            ArenaError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ArenaError::Status(StatusCode::SERVICE_UNAVAILABLE)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_failures() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "")),
            Ok(HttpResponse::new(StatusCode::OK, "ok")),
        ]);

        get_with_retry(&transport, "http://test/x", &RetryPolicy::default())
            .await
            .expect("Second attempt should succeed");

        let calls = transport.call_times();
        assert!(calls[1] - calls[0] >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_tries_once() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(StatusCode::OK, "ok"))]);
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };

        assert!(get_with_retry(&transport, "http://test/x", &policy).await.is_ok());
        assert_eq!(transport.call_count(), 1);
    }
}
