use std::sync::Arc;

use tracing::{debug, info};

use super::client::{response_error, WebDavClient};
use super::credentials::CredentialProvider;
use super::directory;
use super::file::{OpenFlags, WebDavFileHandle};
use super::listing;
use super::pattern::first_wildcard;
use super::url::{is_webdav_target, ParsedUrl};
use crate::config::WebDavSettings;
use crate::errors::Result;
use crate::transport::HttpStats;

/// Filesystem operations over WebDAV locations such as `webdav://host/dir/file`,
/// `webdavs://…` and `storagebox://u123456/…`.
///
/// Each operation opens its own transport session, authenticated with the
/// credentials the provider returns for the caller's URL.
pub struct WebDavFileSystem {
    settings: WebDavSettings,
    credentials: Arc<dyn CredentialProvider>,
    stats: Option<Arc<HttpStats>>,
}

impl WebDavFileSystem {
    pub fn new(settings: WebDavSettings, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            credentials,
            stats: None,
        })
    }

    /// Accumulates HTTP call counts and byte totals into `stats`.
    pub fn with_stats(mut self, stats: Arc<HttpStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn settings(&self) -> &WebDavSettings {
        &self.settings
    }

    pub fn can_handle(&self, url: &str) -> bool {
        is_webdav_target(url)
    }

    fn client_for(&self, url: &str) -> Result<WebDavClient> {
        WebDavClient::connect(
            &self.settings,
            self.credentials.credentials_for(url),
            self.stats.clone(),
        )
    }

    pub async fn open(&self, path: &str, flags: OpenFlags) -> Result<WebDavFileHandle> {
        let client = self.client_for(path)?;
        WebDavFileHandle::open(client, path, flags, self.settings.spill_threshold_bytes()).await
    }

    /// True for an existing file; directories and unreachable paths read as false.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let url = ParsedUrl::parse(path)?.http_url();
        let client = self.client_for(path)?;
        if !client.head(&url).await.is_success() {
            return Ok(false);
        }
        Ok(!self.is_directory(path).await?)
    }

    pub async fn is_directory(&self, path: &str) -> Result<bool> {
        let url = ParsedUrl::parse(path)?.collection_url();
        let response = self.client_for(path)?.head(&url).await;
        Ok(response.has_status(&[200, 204]))
    }

    pub async fn create_directory(&self, path: &str) -> Result<()> {
        let client = self.client_for(path)?;
        directory::create_directory(&client, path).await
    }

    /// Creates `path` and every missing ancestor; only a full store is fatal.
    pub async fn create_directory_recursive(&self, path: &str) -> Result<()> {
        let client = self.client_for(path)?;
        directory::create_recursive(&client, path).await
    }

    pub async fn remove_file(&self, path: &str) -> Result<()> {
        let url = ParsedUrl::parse(path)?.http_url();
        let response = self.client_for(path)?.delete(&url).await;
        if response.has_status(&[200, 202, 204]) {
            info!("🗑️ Deleted {}", path);
            Ok(())
        } else {
            Err(response_error("delete", path, &response))
        }
    }

    pub async fn remove_directory(&self, path: &str) -> Result<()> {
        self.remove_file(path).await
    }

    pub async fn move_file(&self, source: &str, target: &str) -> Result<()> {
        let source_url = ParsedUrl::parse(source)?.http_url();
        let target_url = ParsedUrl::parse(target)?.http_url();
        let response = self
            .client_for(source)?
            .move_resource(&source_url, &target_url)
            .await?;
        if response.has_status(&[200, 201, 204]) {
            info!("🚚 Moved {} to {}", source, target);
            Ok(())
        } else {
            Err(response_error("move", source, &response))
        }
    }

    /// Stores a custom property on the remote resource.
    pub async fn set_property(&self, path: &str, name: &str, value: &str) -> Result<()> {
        let url = ParsedUrl::parse(path)?.http_url();
        let response = self.client_for(path)?.proppatch(&url, name, value).await?;
        if response.has_status(&[200, 207]) {
            debug!("🏷️ Set property {} on {}", name, path);
            Ok(())
        } else {
            Err(response_error("set property", path, &response))
        }
    }

    pub async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let Some(wildcard) = first_wildcard(pattern) else {
            return Ok(vec![pattern.to_string()]);
        };
        // credentials follow the part of the URL the caller spelled out
        let client = self.client_for(&pattern[..wildcard])?;
        listing::glob(&client, pattern).await
    }

    pub async fn list_files<F>(&self, directory: &str, callback: F) -> Result<bool>
    where
        F: FnMut(&str),
    {
        let client = self.client_for(directory)?;
        listing::list_files(&client, directory, callback).await
    }
}
