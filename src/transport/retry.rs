use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::sleep;
use tracing::warn;

use super::request::HttpRequest;
use super::response::{HeaderSet, HttpResponse};
use crate::webdav_debug;

/// Exponential backoff without jitter: the delay before retry `n` (n >= 1)
/// is `min(base_delay * 2^(n-1), max_delay)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(retry - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Statuses worth another attempt: rate limiting and transient gateway trouble.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Dns,
    Proxy,
    Timeout,
    Send,
    Receive,
    Truncated,
    EmptyResponse,
    TooManyRedirects,
    Other,
}

impl TransportErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            TransportErrorKind::TooManyRedirects | TransportErrorKind::Other
        )
    }

    /// Maps a reqwest failure onto the transport taxonomy, looking through the
    /// source chain for the resolver, proxy and early-close cases reqwest folds
    /// into broader categories.
    pub fn classify(err: &reqwest::Error, proxied: bool) -> Self {
        let chain = error_chain(err).to_lowercase();
        if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_redirect() {
            TransportErrorKind::TooManyRedirects
        } else if err.is_connect() {
            if chain.contains("dns") || chain.contains("failed to lookup address") {
                TransportErrorKind::Dns
            } else if proxied && chain.contains("proxy") {
                TransportErrorKind::Proxy
            } else {
                TransportErrorKind::Connect
            }
        } else if chain.contains("connection closed before message completed") {
            TransportErrorKind::EmptyResponse
        } else if chain.contains("end of file before message length reached")
            || chain.contains("unexpected eof")
        {
            TransportErrorKind::Truncated
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Receive
        } else if err.is_request() {
            TransportErrorKind::Send
        } else {
            TransportErrorKind::Other
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Connect => "connection failed",
            TransportErrorKind::Dns => "could not resolve host",
            TransportErrorKind::Proxy => "proxy failure",
            TransportErrorKind::Timeout => "operation timed out",
            TransportErrorKind::Send => "failed sending data",
            TransportErrorKind::Receive => "failed receiving data",
            TransportErrorKind::Truncated => "partial response body",
            TransportErrorKind::EmptyResponse => "server returned nothing",
            TransportErrorKind::TooManyRedirects => "too many redirects",
            TransportErrorKind::Other => "transport error",
        };
        f.write_str(label)
    }
}

pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// A failed exchange: no usable HTTP response was obtained.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Hops that were received before the failure, if any
    pub header_sets: Vec<HeaderSet>,
}

impl TransportFailure {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            header_sets: Vec::new(),
        }
    }

    /// The error text prefers the last status line seen on the wire.
    pub fn into_response(self, url: String, attempts: u32) -> HttpResponse {
        let status = self.header_sets.last().map_or(0, |set| set.status);
        let error = match self.header_sets.last() {
            Some(set) => set.status_line.clone(),
            None => format!("{}: {}", self.kind, self.message),
        };
        HttpResponse {
            status,
            header_sets: self.header_sets,
            body: Bytes::new(),
            url,
            transport_error: Some(error),
            attempts,
        }
    }
}

/// One request/response exchange against the network, redirects included.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

/// Re-runs an exchange on transient failures with exponential backoff.
pub struct RetryingExecutor<E> {
    inner: E,
    policy: RetryPolicy,
    debug: bool,
}

impl<E: Exchange> RetryingExecutor<E> {
    pub fn new(inner: E, policy: RetryPolicy, debug: bool) -> Self {
        Self {
            inner,
            policy,
            debug,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Returns the first non-retryable outcome, or the last outcome once the
    /// attempts are exhausted. The request is replayed unchanged each time.
    pub async fn execute(&self, request: &HttpRequest) -> HttpResponse {
        let url = request.target_url();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            let outcome = self.inner.exchange(request).await;
            let retry_reason = match &outcome {
                Ok(response) if is_retryable_status(response.status) => {
                    Some(format!("HTTP {}", response.status))
                }
                Ok(_) => None,
                Err(failure) if failure.kind.is_retryable() => {
                    Some(format!("{} ({})", failure.kind, failure.message))
                }
                Err(_) => None,
            };

            match retry_reason {
                Some(reason) if attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "🔄 {} {} failed with {}, retrying in {}ms (attempt {}/{})",
                        request.method,
                        url,
                        reason,
                        delay.as_millis(),
                        attempt,
                        max_attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                _ => {
                    webdav_debug!(
                        self.debug,
                        "retry",
                        "{} {} finished after {} attempt(s)",
                        request.method,
                        url,
                        attempt
                    );
                    return match outcome {
                        Ok(mut response) => {
                            response.attempts = attempt;
                            response
                        }
                        Err(failure) => failure.into_response(url, attempt),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Scripted {
        Status(u16),
        Fail(TransportErrorKind),
    }

    struct ScriptedExchange {
        script: Mutex<VecDeque<Scripted>>,
        calls: AtomicU32,
    }

    impl ScriptedExchange {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Exchange for ScriptedExchange {
        async fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Scripted::Status(200));
            match next {
                Scripted::Status(status) => Ok(HttpResponse {
                    status,
                    header_sets: Vec::new(),
                    body: Bytes::from_static(b"ok"),
                    url: request.url.clone(),
                    transport_error: None,
                    attempts: 0,
                }),
                Scripted::Fail(kind) => Err(TransportFailure::new(kind, "scripted")),
            }
        }
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(7), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status));
        }
        for status in [200, 207, 400, 401, 403, 404, 409, 501, 507] {
            assert!(!is_retryable_status(status));
        }
        assert!(TransportErrorKind::Dns.is_retryable());
        assert!(TransportErrorKind::EmptyResponse.is_retryable());
        assert!(!TransportErrorKind::TooManyRedirects.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_503_then_succeeds_with_backoff() {
        let executor = RetryingExecutor::new(
            ScriptedExchange::new(vec![Scripted::Status(503), Scripted::Status(503)]),
            RetryPolicy::default(),
            false,
        );
        let started = Instant::now();
        let response = executor.execute(&HttpRequest::get("https://h/x")).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.attempts, 3);
        assert_eq!(executor.inner().calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_status_returns_immediately() {
        let executor = RetryingExecutor::new(
            ScriptedExchange::new(vec![Scripted::Status(403)]),
            RetryPolicy::default(),
            false,
        );
        let started = Instant::now();
        let response = executor.execute(&HttpRequest::get("https://h/x")).await;

        assert_eq!(response.status, 403);
        assert_eq!(executor.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_exhaust_attempts() {
        let executor = RetryingExecutor::new(
            ScriptedExchange::new(vec![
                Scripted::Fail(TransportErrorKind::Connect),
                Scripted::Fail(TransportErrorKind::Timeout),
                Scripted::Fail(TransportErrorKind::Connect),
            ]),
            RetryPolicy {
                max_retries: 2,
                ..RetryPolicy::default()
            },
            false,
        );
        let response = executor.execute(&HttpRequest::get("https://h/x")).await;

        assert_eq!(executor.inner().calls.load(Ordering::SeqCst), 3);
        assert_eq!(response.status, 0);
        assert!(response.body.is_empty());
        assert!(response
            .transport_error
            .as_deref()
            .unwrap()
            .contains("connection failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_transport_error_is_not_retried() {
        let executor = RetryingExecutor::new(
            ScriptedExchange::new(vec![Scripted::Fail(TransportErrorKind::Other)]),
            RetryPolicy::default(),
            false,
        );
        let response = executor.execute(&HttpRequest::get("https://h/x")).await;
        assert_eq!(executor.inner().calls.load(Ordering::SeqCst), 1);
        assert!(response.transport_error.is_some());
    }
}
