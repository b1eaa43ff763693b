use std::path::PathBuf;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;

/// Where a request body comes from. Every attempt and redirect hop re-opens
/// the source, so a body can be replayed any number of times.
#[derive(Debug, Clone, Default)]
pub enum BodySource {
    #[default]
    Empty,
    Buffer(Bytes),
    File { path: PathBuf, size: u64 },
}

impl BodySource {
    pub fn len(&self) -> u64 {
        match self {
            BodySource::Empty => 0,
            BodySource::Buffer(bytes) => bytes.len() as u64,
            BodySource::File { size, .. } => *size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_file(&self) -> bool {
        matches!(self, BodySource::File { .. })
    }
}

/// A single logical HTTP call. The verb travels with the request itself.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: BodySource,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: BodySource::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Adds a header; values that are not valid header text are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = BodySource::Buffer(bytes.into());
        self
    }

    /// Streams the body from a local file. Replaces any in-memory body.
    pub fn file_body(mut self, path: impl Into<PathBuf>, size: u64) -> Self {
        self.body = BodySource::File {
            path: path.into(),
            size,
        };
        self
    }

    /// Target URL with the query parameters percent-encoded and appended.
    pub fn target_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let encoded = self
            .query
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, encoded)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }
}
