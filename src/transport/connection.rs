use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, AUTHORIZATION, CONTENT_LENGTH, COOKIE, EXPECT, LOCATION, PROXY_AUTHORIZATION,
};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Proxy, StatusCode};
use url::Url;

use super::request::{BodySource, HttpRequest};
use super::response::{HeaderSet, HttpResponse};
use super::retry::{error_chain, Exchange, TransportErrorKind, TransportFailure};
use super::runtime;
use super::upload::open_body;
use crate::config::WebDavSettings;
use crate::errors::{Result, WebDavError};
use crate::webdav_debug;

pub const MAX_REDIRECTS: usize = 10;
/// Bodies above this size get the long upload timeout.
pub const LARGE_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const LARGE_UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// A configured reqwest client performing single exchanges. Redirects are
/// followed here rather than inside reqwest so every hop's headers are kept.
pub struct HttpConnection {
    client: Client,
    timeout: Duration,
    proxied: bool,
    debug: bool,
}

impl HttpConnection {
    pub fn new(settings: &WebDavSettings) -> Result<Self> {
        settings.validate()?;
        let roots = runtime::acquire(settings.ca_cert_path.as_deref())?;

        match Self::build_client(settings, roots) {
            Ok(client) => Ok(Self {
                client,
                timeout: settings.timeout(),
                proxied: settings.proxy.is_some(),
                debug: settings.debug_logging,
            }),
            Err(e) => {
                runtime::release();
                Err(e)
            }
        }
    }

    fn build_client(settings: &WebDavSettings, roots: Vec<reqwest::Certificate>) -> Result<Client> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(settings.timeout())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .zstd(true);

        if settings.keep_alive {
            builder = builder
                .tcp_keepalive(Duration::from_secs(60))
                .pool_max_idle_per_host(10);
        } else {
            builder = builder.pool_max_idle_per_host(0);
        }

        if !settings.verify_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        for root in roots {
            builder = builder.add_root_certificate(root);
        }

        builder = match &settings.proxy {
            Some(proxy_settings) => {
                let mut proxy = Proxy::all(proxy_settings.proxy_url()).map_err(|e| {
                    WebDavError::Configuration {
                        details: format!("invalid proxy '{}': {}", proxy_settings.host, e),
                    }
                })?;
                if let Some(username) = &proxy_settings.username {
                    proxy = proxy.basic_auth(
                        username,
                        proxy_settings.password.as_deref().unwrap_or_default(),
                    );
                }
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        builder.build().map_err(|e| WebDavError::Configuration {
            details: format!("failed to build HTTP client: {}", error_chain(&e)),
        })
    }

    fn failure(&self, err: reqwest::Error, header_sets: Vec<HeaderSet>) -> TransportFailure {
        TransportFailure {
            kind: TransportErrorKind::classify(&err, self.proxied),
            message: error_chain(&err),
            header_sets,
        }
    }

    fn request_timeout(&self, body: &BodySource) -> Duration {
        if body.len() > LARGE_UPLOAD_BYTES {
            LARGE_UPLOAD_TIMEOUT.max(self.timeout)
        } else {
            self.timeout
        }
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        runtime::release();
    }
}

#[async_trait]
impl Exchange for HttpConnection {
    async fn exchange(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportFailure> {
        let mut url = request.target_url();
        let mut method = request.method.clone();
        let mut body = request.body.clone();
        let mut headers = request.headers.clone();
        let mut header_sets = Vec::new();

        // The client never sends "Expect: 100-continue" on its own; drop any caller-supplied one.
        headers.remove(EXPECT);

        loop {
            let mut builder = self
                .client
                .request(method.clone(), &url)
                .headers(headers.clone())
                .timeout(self.request_timeout(&body));

            let opened = open_body(&body).await.map_err(|e| {
                TransportFailure::new(
                    TransportErrorKind::Other,
                    format!("failed to open request body: {}", e),
                )
            })?;
            if let Some(stream_body) = opened {
                builder = builder
                    .header(CONTENT_LENGTH, body.len())
                    .body(stream_body);
            }

            webdav_debug!(self.debug, "http", "{} {} ({} body bytes)", method, url, body.len());
            let response = builder
                .send()
                .await
                .map_err(|e| self.failure(e, header_sets.clone()))?;
            header_sets.push(HeaderSet::from_response(&response));

            let status = response.status();
            if status.is_redirection() {
                if let Some(next) = redirect_target(&url, response.headers()) {
                    if header_sets.len() > MAX_REDIRECTS {
                        let mut failure = TransportFailure::new(
                            TransportErrorKind::TooManyRedirects,
                            format!("more than {} redirects starting at {}", MAX_REDIRECTS, request.url),
                        );
                        failure.header_sets = header_sets;
                        return Err(failure);
                    }
                    webdav_debug!(self.debug, "http", "{} redirect to {}", status, next);
                    if status == StatusCode::SEE_OTHER && method != Method::HEAD {
                        method = Method::GET;
                        body = BodySource::Empty;
                        headers.remove(CONTENT_LENGTH);
                    }
                    if !same_origin(&url, &next) {
                        for name in [AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION] {
                            headers.remove(name);
                        }
                    }
                    url = next;
                    continue;
                }
            }

            let final_url = response.url().to_string();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.failure(e, header_sets.clone()))?;

            return Ok(HttpResponse {
                status: status.as_u16(),
                header_sets,
                body: bytes,
                url: final_url,
                transport_error: None,
                attempts: 1,
            });
        }
    }
}

fn redirect_target(current: &str, headers: &HeaderMap) -> Option<String> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    let base = Url::parse(current).ok()?;
    base.join(location).ok().map(String::from)
}

/// Scheme, host and port all match. Credentials only follow redirects that do.
fn same_origin(current: &str, next: &str) -> bool {
    match (Url::parse(current), Url::parse(next)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}
