use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;

use super::connection::HttpConnection;
use super::request::HttpRequest;
use super::response::HttpResponse;
use super::retry::RetryingExecutor;
use super::stats::HttpStats;
use crate::config::WebDavSettings;
use crate::errors::Result;
use crate::webdav_debug;

/// Anything that can carry a request to a server and bring back a response.
/// Failures below HTTP come back as a response with `transport_error` set.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> HttpResponse;

    /// Capability check for streaming request bodies from local files.
    fn file_upload(&self) -> Option<&dyn SupportsFileUpload> {
        None
    }
}

/// Transports that can stream a PUT body straight from a local file.
#[async_trait]
pub trait SupportsFileUpload: Send + Sync {
    async fn upload_file(&self, request: HttpRequest, path: &Path, size: u64) -> HttpResponse;
}

/// Verb-level HTTP session: retries, default headers, bearer auth and
/// statistics on top of a single connection.
pub struct TransportSession {
    executor: RetryingExecutor<HttpConnection>,
    bearer_token: Option<String>,
    stats: Option<Arc<HttpStats>>,
    debug: bool,
}

impl TransportSession {
    pub fn new(settings: &WebDavSettings) -> Result<Self> {
        let connection = HttpConnection::new(settings)?;
        Ok(Self {
            executor: RetryingExecutor::new(
                connection,
                settings.retry_policy(),
                settings.debug_logging,
            ),
            bearer_token: settings.bearer_token.clone(),
            stats: None,
            debug: settings.debug_logging,
        })
    }

    pub fn with_stats(mut self, stats: Arc<HttpStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub async fn get(&self, request: HttpRequest) -> HttpResponse {
        self.send(HttpRequest { method: Method::GET, ..request }).await
    }

    pub async fn head(&self, request: HttpRequest) -> HttpResponse {
        self.send(HttpRequest { method: Method::HEAD, ..request }).await
    }

    pub async fn put(&self, request: HttpRequest) -> HttpResponse {
        self.send(HttpRequest { method: Method::PUT, ..request }).await
    }

    /// POST or any extension verb carried in `method`
    pub async fn custom(&self, method: Method, request: HttpRequest) -> HttpResponse {
        self.send(HttpRequest { method, ..request }).await
    }

    fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        let carries_body = request.method != Method::GET
            && request.method != Method::HEAD
            && request.method != Method::DELETE;
        if carries_body && !request.has_header(CONTENT_TYPE.as_str()) {
            request = request.header(CONTENT_TYPE.as_str(), "application/octet-stream");
        }
        if let Some(token) = &self.bearer_token {
            if !request.has_header(AUTHORIZATION.as_str()) {
                request = request.header(AUTHORIZATION.as_str(), &format!("Bearer {}", token));
            }
        }
        request
    }
}

#[async_trait]
impl HttpTransport for TransportSession {
    async fn send(&self, request: HttpRequest) -> HttpResponse {
        let request = self.prepare(request);
        let sent = request.body.len();
        let response = self.executor.execute(&request).await;

        webdav_debug!(
            self.debug,
            "http",
            "{} {} -> {} ({} bytes, {} attempt(s))",
            request.method,
            request.url,
            response.status,
            response.body.len(),
            response.attempts
        );
        if let Some(stats) = &self.stats {
            stats.record(&request.method, sent, response.body.len() as u64);
        }
        response
    }

    fn file_upload(&self) -> Option<&dyn SupportsFileUpload> {
        Some(self)
    }
}

#[async_trait]
impl SupportsFileUpload for TransportSession {
    async fn upload_file(&self, request: HttpRequest, path: &Path, size: u64) -> HttpResponse {
        self.put(request.file_body(path, size)).await
    }
}
