use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;
use tracing::info;

use super::request::BodySource;

const CHUNK_SIZE: usize = 64 * 1024;
const MIB: f64 = 1024.0 * 1024.0;
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Serves an in-memory body in chunks, tracking the read position.
#[derive(Debug, Clone)]
pub struct BufferProvider {
    data: Bytes,
    position: usize,
}

impl BufferProvider {
    pub fn new(data: Bytes) -> Self {
        Self { data, position: 0 }
    }

    pub fn total_size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Next slice of at most `max` bytes; `None` once everything was handed out.
    pub fn next_chunk(&mut self, max: usize) -> Option<Bytes> {
        if self.position >= self.data.len() || max == 0 {
            return None;
        }
        let end = (self.position + max).min(self.data.len());
        let chunk = self.data.slice(self.position..end);
        self.position = end;
        Some(chunk)
    }

    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::unfold(self, |mut provider| async move {
            provider
                .next_chunk(CHUNK_SIZE)
                .map(|chunk| (Ok(chunk), provider))
        })
    }
}

/// Streams a local file of known size, logging progress as bytes go out.
#[derive(Debug)]
pub struct FileProvider {
    path: PathBuf,
    file: tokio::fs::File,
    size: u64,
}

impl FileProvider {
    pub async fn open(path: &Path, size: u64) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.size
    }

    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let mut progress = UploadProgress::new(self.size);
        let label = self.path.display().to_string();
        ReaderStream::with_capacity(self.file.take(self.size), CHUNK_SIZE).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                if let Some(report) = progress.record(bytes.len() as u64, Instant::now()) {
                    report.log(&label);
                }
            }
            chunk
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub percent: u64,
    pub bytes_uploaded: u64,
    pub total_size: u64,
    pub mib_per_second: Option<f64>,
}

impl ProgressReport {
    pub fn log(&self, label: &str) {
        let done = self.bytes_uploaded as f64 / MIB;
        let total = self.total_size as f64 / MIB;
        match self.mib_per_second {
            Some(speed) => info!(
                "📤 Upload progress for {}: {}% ({:.1}/{:.1} MiB) - {:.2} MiB/s",
                label, self.percent, done, total, speed
            ),
            None => info!(
                "📤 Upload progress for {}: {}% ({:.1}/{:.1} MiB)",
                label, self.percent, done, total
            ),
        }
    }
}

/// Decides when an upload is worth a progress line: every 5% step, or when
/// two seconds passed since the last line, and never twice for one percentage.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    total_size: u64,
    bytes_uploaded: u64,
    last_percent: Option<u64>,
    started: Option<Instant>,
    last_report: Option<Instant>,
}

impl UploadProgress {
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            bytes_uploaded: 0,
            last_percent: None,
            started: None,
            last_report: None,
        }
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    pub fn record(&mut self, delivered: u64, now: Instant) -> Option<ProgressReport> {
        if delivered == 0 || self.total_size == 0 {
            return None;
        }
        let started = *self.started.get_or_insert(now);
        let last_report = *self.last_report.get_or_insert(now);
        self.bytes_uploaded = (self.bytes_uploaded + delivered).min(self.total_size);

        let percent = self.bytes_uploaded * 100 / self.total_size;
        if self.last_percent == Some(percent) {
            return None;
        }
        let interval_elapsed = now.duration_since(last_report) >= REPORT_INTERVAL;
        if percent % 5 != 0 && !interval_elapsed {
            return None;
        }

        self.last_percent = Some(percent);
        self.last_report = Some(now);
        let elapsed = now.duration_since(started).as_secs_f64();
        let mib_per_second =
            (elapsed > 0.0).then(|| self.bytes_uploaded as f64 / MIB / elapsed);
        Some(ProgressReport {
            percent,
            bytes_uploaded: self.bytes_uploaded,
            total_size: self.total_size,
            mib_per_second,
        })
    }
}

/// Builds a fresh reqwest body from a source, for one attempt or redirect hop.
pub async fn open_body(source: &BodySource) -> io::Result<Option<reqwest::Body>> {
    match source {
        BodySource::Empty => Ok(None),
        BodySource::Buffer(bytes) if bytes.is_empty() => Ok(Some(reqwest::Body::from(Bytes::new()))),
        BodySource::Buffer(bytes) => Ok(Some(reqwest::Body::wrap_stream(
            BufferProvider::new(bytes.clone()).into_stream(),
        ))),
        BodySource::File { path, size } => {
            let provider = FileProvider::open(path, *size).await?;
            Ok(Some(reqwest::Body::wrap_stream(provider.into_stream())))
        }
    }
}
