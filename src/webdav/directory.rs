use tracing::{debug, info};

use super::client::{response_error, WebDavClient};
use super::pattern::split_segments;
use super::url::{original_prefix, parent_url, ParsedUrl};
use crate::errors::{Result, WebDavError};
use crate::webdav_debug;

/// Creates one collection. The caller-form `url` is used for error messages.
///
/// 405 means the collection already exists and counts as success; 507 stops
/// with `StorageExhausted`. A missing parent (404/409) is built first and the
/// MKCOL retried once.
pub async fn create_directory(client: &WebDavClient, url: &str) -> Result<()> {
    let parsed = ParsedUrl::parse(url)?;
    let target = parsed.collection_url();

    let response = client.mkcol(&target).await?;
    let response = match response.status {
        507 if response.transport_error.is_none() => {
            return Err(WebDavError::from_status("create directory", url, 507));
        }
        404 | 409 if response.transport_error.is_none() => match nested_parent(url) {
            Some(parent) => {
                debug!("📁 Parent of {} is missing, creating {}", url, parent);
                create_recursive(client, &parent).await?;
                client.mkcol(&target).await?
            }
            None => response,
        },
        _ => response,
    };

    match response.status {
        200 | 201 | 204 if response.transport_error.is_none() => {
            info!("📁 Created directory {}", url);
            Ok(())
        }
        405 if response.transport_error.is_none() => {
            webdav_debug!(client.debug_enabled(), "MKCOL", "{} already exists", url);
            Ok(())
        }
        _ => Err(response_error("create directory", url, &response)),
    }
}

/// Creates every ancestor level of `url` and `url` itself, root first.
///
/// Levels are created independently: failures other than a full store are
/// logged and skipped, since the level may already exist or a later level may
/// still succeed. Not atomic.
pub async fn create_recursive(client: &WebDavClient, url: &str) -> Result<()> {
    let parsed = ParsedUrl::parse(url)?;
    let prefix = original_prefix(url);
    let mut current = String::new();

    for segment in split_segments(&parsed.path) {
        current.push('/');
        current.push_str(segment);
        let level_url = format!("{}{}", prefix, current);

        match create_level(client, &level_url).await {
            Ok(()) => {}
            Err(err) if err.is_storage_exhausted() => return Err(err),
            Err(err) => {
                webdav_debug!(
                    client.debug_enabled(),
                    "MKCOL",
                    "ignoring failure creating {}: {}",
                    level_url,
                    err
                );
            }
        }
    }
    Ok(())
}

/// Parent of `url` when it lies below the host root.
fn nested_parent(url: &str) -> Option<String> {
    parent_url(url).filter(|parent| {
        ParsedUrl::parse(parent)
            .map(|parsed| parsed.path != "/")
            .unwrap_or(false)
    })
}

async fn create_level(client: &WebDavClient, url: &str) -> Result<()> {
    let target = ParsedUrl::parse(url)?.collection_url();
    let response = client.mkcol(&target).await?;
    if response.has_status(&[200, 201, 204, 405]) {
        Ok(())
    } else {
        Err(response_error("create directory", url, &response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_parent_stops_at_host_root() {
        assert_eq!(
            nested_parent("webdav://h/a/b/new").as_deref(),
            Some("webdav://h/a/b")
        );
        assert_eq!(nested_parent("webdav://h/top"), None);
        assert_eq!(nested_parent("webdav://h/top/"), None);
    }
}
