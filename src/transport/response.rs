use bytes::Bytes;
use reqwest::header::HeaderMap;

/// Status line and headers received for one hop of a (possibly redirected) exchange.
#[derive(Debug, Clone)]
pub struct HeaderSet {
    pub status_line: String,
    pub status: u16,
    pub headers: HeaderMap,
}

impl HeaderSet {
    pub fn from_response(response: &reqwest::Response) -> Self {
        Self {
            status_line: format!("{:?} {}", response.version(), response.status()),
            status: response.status().as_u16(),
            headers: response.headers().clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final status code; 0 when no response was ever received
    pub status: u16,
    /// One entry per hop, in order; the last one belongs to the final response
    pub header_sets: Vec<HeaderSet>,
    pub body: Bytes,
    pub url: String,
    /// Set when the exchange failed below HTTP. The body is empty in that case.
    pub transport_error: Option<String>,
    pub attempts: u32,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.transport_error.is_none() && (200..300).contains(&self.status)
    }

    pub fn has_status(&self, accepted: &[u16]) -> bool {
        self.transport_error.is_none() && accepted.contains(&self.status)
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.header_sets.last().map(|set| &set.headers)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .and_then(|headers| headers.get(name))
            .and_then(|value| value.to_str().ok())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
