use std::collections::HashSet;

use tracing::{debug, warn};

use super::client::WebDavClient;
use super::href::extract_hrefs;
use super::pattern::{first_wildcard, GlobPattern};
use super::url::{escape_path_delimiters, rebuild_original, ParsedUrl};
use crate::errors::Result;
use crate::webdav_debug;

/// Expands a wildcard URL such as `storagebox://u1/data/**/*.parquet` into
/// the matching file URLs, written in the caller's URL form.
///
/// A pattern without wildcards is returned as-is, with no network traffic.
/// Listing failures are not errors: an unreadable directory contributes
/// nothing. Only directories that could hold a match are listed.
pub async fn glob(client: &WebDavClient, pattern: &str) -> Result<Vec<String>> {
    let Some(wildcard) = first_wildcard(pattern) else {
        return Ok(vec![pattern.to_string()]);
    };

    let parsed = ParsedUrl::parse(pattern)?;
    let root = listing_root(&pattern[..wildcard]);
    let root_url = parsed.with_path(&ParsedUrl::parse(&root)?.path);
    let matcher = GlobPattern::new(&parsed.path);

    let mut results = Vec::new();
    let mut seen_files = HashSet::new();
    let mut visited = HashSet::new();
    // raw (still encoded) path to request, paired with its decoded form
    let mut pending = vec![(root_url.path.clone(), root_url.path.clone())];

    while let Some((raw_dir, dir)) = pending.pop() {
        if !visited.insert(dir.trim_end_matches('/').to_string()) {
            continue;
        }
        let Some(body) = list_directory(client, &root_url.with_path(&raw_dir)).await? else {
            continue;
        };

        let mut subdirectories = Vec::new();
        for href in extract_hrefs(&body) {
            if href.trimmed() == dir.trim_end_matches('/') || href.trimmed() == "/" {
                continue;
            }
            if href.is_collection() {
                if matcher.could_match_below(href.trimmed()) {
                    subdirectories.push((href.raw.clone(), href.path.clone()));
                }
            } else if matcher.matches(&href.path) && seen_files.insert(href.path.clone()) {
                results.push(rebuild_original(pattern, &escape_path_delimiters(&href.path)));
            }
        }
        // reversed so the first subdirectory is listed next
        pending.extend(subdirectories.into_iter().rev());
    }

    debug!("🔍 Glob {} matched {} file(s)", pattern, results.len());
    Ok(results)
}

/// Calls `callback(url)` for every file at any depth below `directory`.
/// Collections are walked, not reported. Returns whether anything was found.
pub async fn list_files<F>(client: &WebDavClient, directory: &str, mut callback: F) -> Result<bool>
where
    F: FnMut(&str),
{
    let pattern = format!("{}/**", directory.trim_end_matches('/'));
    let files = glob(client, &pattern).await?;
    for file in &files {
        callback(file);
    }
    Ok(!files.is_empty())
}

/// The directory part of the text before the first wildcard.
fn listing_root(before_wildcard: &str) -> String {
    match before_wildcard.rfind('/') {
        Some(index) => before_wildcard[..=index].to_string(),
        None => before_wildcard.to_string(),
    }
}

/// Depth-1 PROPFIND; `None` when the server did not answer with a listing.
async fn list_directory(client: &WebDavClient, dir: &ParsedUrl) -> Result<Option<String>> {
    let url = dir.collection_url();
    let response = client.propfind(&url, 1).await?;
    if response.has_status(&[200, 207]) {
        webdav_debug!(client.debug_enabled(), "PROPFIND", "{} returned {} bytes", url, response.body.len());
        Ok(Some(response.text()))
    } else {
        warn!(
            "📂 Listing {} failed with {}",
            url,
            response
                .transport_error
                .clone()
                .unwrap_or_else(|| format!("HTTP {}", response.status))
        );
        Ok(None)
    }
}
