use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Method;
use serde::Serialize;

/// Per-verb call counts and byte totals, shared by every session that was
/// handed the same sink.
#[derive(Debug, Default)]
pub struct HttpStats {
    get_count: AtomicU64,
    head_count: AtomicU64,
    put_count: AtomicU64,
    delete_count: AtomicU64,
    post_count: AtomicU64,
    total_bytes_sent: AtomicU64,
    total_bytes_received: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HttpStatsSnapshot {
    pub get_count: u64,
    pub head_count: u64,
    pub put_count: u64,
    pub delete_count: u64,
    /// POST and the WebDAV extension verbs
    pub post_count: u64,
    pub total_bytes_sent: u64,
    pub total_bytes_received: u64,
}

impl HttpStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, method: &Method, bytes_sent: u64, bytes_received: u64) {
        let counter = if method == Method::GET {
            &self.get_count
        } else if method == Method::HEAD {
            &self.head_count
        } else if method == Method::PUT {
            &self.put_count
        } else if method == Method::DELETE {
            &self.delete_count
        } else {
            &self.post_count
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_sent.fetch_add(bytes_sent, Ordering::Relaxed);
        self.total_bytes_received
            .fetch_add(bytes_received, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HttpStatsSnapshot {
        HttpStatsSnapshot {
            get_count: self.get_count.load(Ordering::Relaxed),
            head_count: self.head_count.load(Ordering::Relaxed),
            put_count: self.put_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            post_count: self.post_count.load(Ordering::Relaxed),
            total_bytes_sent: self.total_bytes_sent.load(Ordering::Relaxed),
            total_bytes_received: self.total_bytes_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_verbs_count_as_post() {
        let stats = HttpStats::new();
        stats.record(&Method::GET, 0, 100);
        stats.record(&Method::PUT, 50, 0);
        stats.record(&Method::from_bytes(b"PROPFIND").unwrap(), 120, 900);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.get_count, 1);
        assert_eq!(snapshot.put_count, 1);
        assert_eq!(snapshot.post_count, 1);
        assert_eq!(snapshot.total_bytes_sent, 170);
        assert_eq!(snapshot.total_bytes_received, 1000);
    }
}
