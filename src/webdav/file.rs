use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::client::{response_error, WebDavClient};
use super::directory::create_recursive;
use super::url::{parent_url, ParsedUrl};
use crate::errors::{Result, WebDavError};
use crate::transport::HttpResponse;
use crate::{webdav_debug, webdav_warn};

/// How a file is opened. Read and write are exclusive and append is not
/// possible over WebDAV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub append: bool,
}

impl OpenFlags {
    pub const READ: OpenFlags = OpenFlags {
        read: true,
        write: false,
        create: false,
        append: false,
    };

    pub const WRITE: OpenFlags = OpenFlags {
        read: false,
        write: true,
        create: true,
        append: false,
    };

    fn validate(&self, path: &str) -> Result<()> {
        let reason = if self.read && self.write {
            "files cannot be opened for reading and writing at the same time"
        } else if self.append {
            "appending to remote files is not supported"
        } else if !self.read && !self.write {
            "neither read nor write access was requested"
        } else {
            return Ok(());
        };
        Err(WebDavError::UnsupportedOpenMode {
            path: path.to_string(),
            reason: reason.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Empty,
    Buffering,
    Spilled,
    Flushed,
}

#[derive(Debug)]
struct SpillFile {
    file: tokio::fs::File,
    path: TempPath,
}

/// What a flush has to upload
#[derive(Debug, Clone)]
enum UploadBody {
    Memory(Bytes),
    File { path: PathBuf, size: u64 },
}

/// Sequential write buffer for one remote file. Data stays in memory until
/// it would pass the spill threshold, then moves to a local temp file which
/// is removed when the session ends.
#[derive(Debug)]
pub struct WriteSession {
    path: String,
    buffer: Vec<u8>,
    spill: Option<SpillFile>,
    threshold: u64,
    length: u64,
    dirty: bool,
    flushed: bool,
    debug: bool,
}

impl WriteSession {
    pub fn new(path: impl Into<String>, threshold: u64, debug: bool) -> Self {
        Self {
            path: path.into(),
            buffer: Vec::new(),
            spill: None,
            threshold,
            length: 0,
            dirty: false,
            flushed: false,
            debug,
        }
    }

    pub fn state(&self) -> WriteState {
        if self.flushed {
            WriteState::Flushed
        } else if self.spill.is_some() {
            WriteState::Spilled
        } else if self.length > 0 || self.dirty {
            WriteState::Buffering
        } else {
            WriteState::Empty
        }
    }

    /// Logical file length so far
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn spill_path(&self) -> Option<&Path> {
        self.spill.as_ref().map(|spill| spill.path.as_ref())
    }

    /// Appends `data`, which must start exactly at the current end of file.
    pub async fn write(&mut self, data: &[u8], location: u64) -> Result<()> {
        if self.flushed {
            return Err(WebDavError::WriteAfterFlush {
                path: self.path.clone(),
            });
        }
        if location != self.length {
            return Err(WebDavError::NonSequentialWrite {
                expected: self.length,
                actual: location,
            });
        }

        if self.spill.is_none() && (self.buffer.len() + data.len()) as u64 > self.threshold {
            self.spill_to_disk().await?;
        }

        match &mut self.spill {
            Some(spill) => spill
                .file
                .write_all(data)
                .await
                .map_err(|e| WebDavError::local_io(spill.path.display().to_string(), e))?,
            None => self.buffer.extend_from_slice(data),
        }
        self.length += data.len() as u64;
        self.dirty = true;
        webdav_debug!(self.debug, "write", "{} bytes at {} for {}", data.len(), location, self.path);
        Ok(())
    }

    async fn spill_to_disk(&mut self) -> Result<()> {
        let temp = tempfile::Builder::new()
            .prefix("webdav_upload_")
            .tempfile()
            .map_err(|e| WebDavError::local_io(std::env::temp_dir().display().to_string(), e))?;
        let (file, path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        file.write_all(&self.buffer)
            .await
            .map_err(|e| WebDavError::local_io(path.display().to_string(), e))?;

        info!(
            "💾 Write buffer for {} passed {} MiB, spilling {} bytes to {}",
            self.path,
            self.threshold / (1024 * 1024),
            self.buffer.len(),
            path.display()
        );
        self.buffer = Vec::new();
        self.spill = Some(SpillFile { file, path });
        Ok(())
    }

    /// Everything written so far, ready to upload. `None` when nothing is pending.
    async fn upload_body(&mut self) -> Result<Option<UploadBody>> {
        if !self.dirty && self.spill.is_none() {
            return Ok(None);
        }
        match &mut self.spill {
            Some(spill) => {
                let display = spill.path.display().to_string();
                spill
                    .file
                    .flush()
                    .await
                    .map_err(|e| WebDavError::local_io(display.clone(), e))?;
                let size = tokio::fs::metadata(&spill.path)
                    .await
                    .map_err(|e| WebDavError::local_io(display, e))?
                    .len();
                Ok(Some(UploadBody::File {
                    path: spill.path.to_path_buf(),
                    size,
                }))
            }
            None => Ok(Some(UploadBody::Memory(Bytes::copy_from_slice(&self.buffer)))),
        }
    }

    fn mark_flushed(&mut self) {
        self.buffer = Vec::new();
        self.dirty = false;
        self.flushed = true;
        // dropping the TempPath deletes the spill file
        self.spill = None;
    }

    fn discard(&mut self) {
        self.buffer = Vec::new();
        self.dirty = false;
        self.spill = None;
    }
}

async fn put_body(client: &WebDavClient, url: &str, body: &UploadBody) -> Result<HttpResponse> {
    match body {
        UploadBody::Memory(bytes) => Ok(client.put(url, bytes.clone()).await),
        UploadBody::File { path, size } => client.put_file(url, path, *size).await,
    }
}

/// Uploads the session's content with a single PUT. When the server reports
/// a missing parent (400/404/409), the parent tree is created and the PUT
/// retried once; the outcome of the retry is final.
pub async fn flush_session(client: &WebDavClient, session: &mut WriteSession) -> Result<()> {
    let Some(body) = session.upload_body().await? else {
        return Ok(());
    };
    let path = session.path.clone();
    let url = ParsedUrl::parse(&path)?.http_url();

    let mut response = put_body(client, &url, &body).await?;
    if response.transport_error.is_none() && matches!(response.status, 400 | 404 | 409) {
        if let Some(parent) = parent_url(&path) {
            debug!(
                "📁 PUT {} returned {}, creating parent directories {}",
                path, response.status, parent
            );
            match create_recursive(client, &parent).await {
                Ok(()) => response = put_body(client, &url, &body).await?,
                Err(e) => webdav_warn!(
                    client.debug_enabled(),
                    "flush",
                    "could not create parent directories for {}: {}",
                    path,
                    e
                ),
            }
        }
    }

    if response.has_status(&[200, 201, 204]) {
        info!("✅ Uploaded {} ({} bytes)", path, session.len());
        session.mark_flushed();
        Ok(())
    } else {
        Err(response_error("write", &path, &response))
    }
}

#[derive(Debug)]
enum HandleMode {
    Read { length: u64 },
    Write(WriteSession),
}

/// An open remote file, either for sequential writing or for ranged reads.
pub struct WebDavFileHandle {
    path: String,
    url: String,
    client: WebDavClient,
    mode: HandleMode,
    closed: bool,
}

impl WebDavFileHandle {
    pub async fn open(
        client: WebDavClient,
        path: &str,
        flags: OpenFlags,
        spill_threshold: u64,
    ) -> Result<Self> {
        flags.validate(path)?;
        let url = ParsedUrl::parse(path)?.http_url();

        let mode = if flags.write {
            webdav_debug!(client.debug_enabled(), "open", "{} for writing", path);
            HandleMode::Write(WriteSession::new(path, spill_threshold, client.debug_enabled()))
        } else {
            let response = client.head(&url).await;
            if !response.is_success() {
                return Err(response_error("open", path, &response));
            }
            let length = response.content_length().unwrap_or(0);
            webdav_debug!(client.debug_enabled(), "open", "{} for reading, {} bytes", path, length);
            HandleMode::Read { length }
        };

        Ok(Self {
            path: path.to_string(),
            url,
            client,
            mode,
            closed: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        match &self.mode {
            HandleMode::Read { length } => *length,
            HandleMode::Write(session) => session.len(),
        }
    }

    pub fn write_session(&self) -> Option<&WriteSession> {
        match &self.mode {
            HandleMode::Write(session) => Some(session),
            HandleMode::Read { .. } => None,
        }
    }

    pub async fn write(&mut self, data: &[u8], location: u64) -> Result<()> {
        match &mut self.mode {
            HandleMode::Write(session) => session.write(data, location).await,
            HandleMode::Read { .. } => Err(WebDavError::UnsupportedOpenMode {
                path: self.path.clone(),
                reason: "file was opened for reading".to_string(),
            }),
        }
    }

    /// Reads up to `buf.len()` bytes at `location`; returns the count read.
    pub async fn read(&mut self, buf: &mut [u8], location: u64) -> Result<usize> {
        let length = match &self.mode {
            HandleMode::Read { length } => *length,
            HandleMode::Write(_) => {
                return Err(WebDavError::UnsupportedOpenMode {
                    path: self.path.clone(),
                    reason: "file was opened for writing".to_string(),
                })
            }
        };
        if buf.is_empty() || location >= length {
            return Ok(0);
        }
        let wanted = (buf.len() as u64).min(length - location);
        let response = self.client.get_range(&self.url, location, wanted).await;

        let data = match response.status {
            206 if response.transport_error.is_none() => response.body,
            // server ignored the range and sent the whole file
            200 if response.transport_error.is_none() => {
                let start = (location as usize).min(response.body.len());
                response.body.slice(start..)
            }
            _ => return Err(response_error("read", &self.path, &response)),
        };
        let count = data.len().min(wanted as usize);
        buf[..count].copy_from_slice(&data[..count]);
        Ok(count)
    }

    /// Reads the whole file into memory.
    pub async fn read_all(&mut self) -> Result<Bytes> {
        let response = self.client.get(&self.url).await;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(response_error("read", &self.path, &response))
        }
    }

    /// Uploads pending data; a no-op for read handles and clean sessions.
    pub async fn sync(&mut self) -> Result<()> {
        match &mut self.mode {
            HandleMode::Write(session) => flush_session(&self.client, session).await,
            HandleMode::Read { .. } => Ok(()),
        }
    }

    /// Flushes and releases the handle. Any spill file is removed whatever the outcome.
    pub async fn close(mut self) -> Result<()> {
        let result = self.sync().await;
        if let HandleMode::Write(session) = &mut self.mode {
            session.discard();
        }
        self.closed = true;
        result
    }
}

impl Drop for WebDavFileHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let HandleMode::Write(session) = &self.mode {
            if session.is_dirty() {
                warn!(
                    "⚠️ {} dropped with {} unflushed bytes; call close() to upload",
                    self.path,
                    session.len()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    #[tokio::test]
    async fn test_sequential_writes_stay_in_memory() {
        let mut session = WriteSession::new("webdav://h/a.csv", 100, false);
        assert_eq!(session.state(), WriteState::Empty);
        session.write(b"hello ", 0).await.unwrap();
        session.write(b"world", 6).await.unwrap();
        assert_eq!(session.state(), WriteState::Buffering);
        assert_eq!(session.len(), 11);
        assert!(session.spill_path().is_none());
    }

    #[tokio::test]
    async fn test_non_sequential_write_is_rejected() {
        let mut session = WriteSession::new("webdav://h/a.csv", 100, false);
        session.write(&[0u8; 100], 0).await.unwrap();
        let err = session.write(b"x", 50).await.unwrap_err();
        match err {
            WebDavError::NonSequentialWrite { expected, actual } => {
                assert_eq!(expected, 100);
                assert_eq!(actual, 50);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(session.len(), 100);
    }

    #[tokio::test]
    async fn test_write_past_the_end_is_rejected() {
        let mut session = WriteSession::new("webdav://h/a.csv", 100, false);
        session.write(&[0u8; 50], 0).await.unwrap();
        let err = session.write(b"x", 100).await.unwrap_err();
        assert!(matches!(
            err,
            WebDavError::NonSequentialWrite {
                expected: 50,
                actual: 100
            }
        ));
        assert_eq!(session.len(), 50);
    }

    #[tokio::test]
    async fn test_spills_when_threshold_would_be_crossed() {
        let mut session = WriteSession::new("webdav://h/big.bin", 50 * MIB as u64, false);
        session.write(&vec![1u8; 10 * MIB], 0).await.unwrap();
        session.write(&vec![2u8; 10 * MIB], 10 * MIB as u64).await.unwrap();
        assert_eq!(session.state(), WriteState::Buffering);

        session.write(&vec![3u8; 35 * MIB], 20 * MIB as u64).await.unwrap();
        assert_eq!(session.state(), WriteState::Spilled);
        assert_eq!(session.len(), 55 * MIB as u64);

        let spill = session.spill_path().unwrap().to_path_buf();
        match session.upload_body().await.unwrap() {
            Some(UploadBody::File { size, .. }) => assert_eq!(size, 55 * MIB as u64),
            other => panic!("expected file body, got {:?}", other),
        }

        session.discard();
        assert!(!spill.exists());
    }

    #[tokio::test]
    async fn test_clean_session_has_nothing_to_upload() {
        let mut session = WriteSession::new("webdav://h/a.csv", 100, false);
        assert!(session.upload_body().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_after_flush_is_rejected() {
        let mut session = WriteSession::new("webdav://h/a.csv", 100, false);
        session.write(b"abc", 0).await.unwrap();
        session.mark_flushed();
        assert_eq!(session.state(), WriteState::Flushed);
        assert!(matches!(
            session.write(b"d", 3).await,
            Err(WebDavError::WriteAfterFlush { .. })
        ));
    }

    #[test]
    fn test_open_flags_validation() {
        assert!(OpenFlags::READ.validate("p").is_ok());
        assert!(OpenFlags::WRITE.validate("p").is_ok());
        let both = OpenFlags {
            read: true,
            write: true,
            ..OpenFlags::default()
        };
        assert!(matches!(
            both.validate("p"),
            Err(WebDavError::UnsupportedOpenMode { .. })
        ));
        let append = OpenFlags {
            append: true,
            ..OpenFlags::WRITE
        };
        assert!(append.validate("p").is_err());
    }
}
