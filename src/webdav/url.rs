use crate::errors::{Result, WebDavError};

const STORAGEBOX_SUFFIX: &str = ".your-storagebox.de";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpScheme {
    Http,
    Https,
}

impl HttpScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpScheme::Http => "http",
            HttpScheme::Https => "https",
        }
    }
}

/// A WebDAV location resolved to the HTTP endpoint that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: HttpScheme,
    /// Host, with port when one was given
    pub host: String,
    /// Absolute path, always starting with `/`
    pub path: String,
}

impl ParsedUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest, storagebox) = if let Some(rest) = url.strip_prefix("storagebox://") {
            (HttpScheme::Https, rest, true)
        } else if let Some(rest) = url.strip_prefix("webdavs://") {
            (HttpScheme::Https, rest, false)
        } else if let Some(rest) = url.strip_prefix("webdav://") {
            (HttpScheme::Http, rest, false)
        } else if let Some(rest) = url.strip_prefix("https://") {
            (HttpScheme::Https, rest, false)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (HttpScheme::Http, rest, false)
        } else {
            return Err(WebDavError::InvalidUrl {
                url: url.to_string(),
            });
        };

        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(WebDavError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let host = if storagebox {
            format!("{}{}", authority, STORAGEBOX_SUFFIX)
        } else {
            authority.to_string()
        };

        Ok(Self {
            scheme,
            host,
            path: path.to_string(),
        })
    }

    pub fn http_url(&self) -> String {
        format!("{}://{}{}", self.scheme.as_str(), self.host, self.path)
    }

    /// Same endpoint, different absolute path.
    pub fn with_path(&self, path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Self {
            scheme: self.scheme,
            host: self.host.clone(),
            path,
        }
    }

    pub fn collection_url(&self) -> String {
        let url = self.http_url();
        if url.ends_with('/') {
            url
        } else {
            format!("{}/", url)
        }
    }
}

/// Whether the URL names a location this filesystem serves.
pub fn is_webdav_target(url: &str) -> bool {
    if url.starts_with("webdav://") || url.starts_with("webdavs://") || url.starts_with("storagebox://") {
        return true;
    }
    (url.starts_with("https://") || url.starts_with("http://"))
        && url.contains(&format!("{}/", STORAGEBOX_SUFFIX))
}

/// Scheme and authority of the caller's URL, exactly as the caller wrote it,
/// e.g. `storagebox://u1` or `webdav://host:8080`.
pub fn original_prefix(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(index) => index + 3,
        None => return "",
    };
    match url[after_scheme..].find('/') {
        Some(index) => &url[..after_scheme + index],
        None => url,
    }
}

/// Caller-form URL of `path` on the same endpoint as `url`.
pub fn rebuild_original(url: &str, path: &str) -> String {
    let prefix = original_prefix(url);
    if path.starts_with('/') {
        format!("{}{}", prefix, path)
    } else {
        format!("{}/{}", prefix, path)
    }
}

/// Re-escapes the characters that would end the path part of a URL, so a
/// decoded server path such as `/dir/a#b.csv` can be put back into one.
pub fn escape_path_delimiters(path: &str) -> String {
    path.replace('%', "%25")
        .replace('#', "%23")
        .replace('?', "%3F")
}

/// Caller-form URL of the parent directory, or `None` when `url` sits at the root.
pub fn parent_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let prefix_len = original_prefix(trimmed).len();
    let index = trimmed.rfind('/')?;
    (index >= prefix_len).then(|| trimmed[..index].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storagebox_shorthand() {
        let parsed = ParsedUrl::parse("storagebox://u123456/data/file.parquet").unwrap();
        assert_eq!(parsed.scheme, HttpScheme::Https);
        assert_eq!(parsed.host, "u123456.your-storagebox.de");
        assert_eq!(parsed.path, "/data/file.parquet");
        assert_eq!(
            parsed.http_url(),
            "https://u123456.your-storagebox.de/data/file.parquet"
        );
    }

    #[test]
    fn test_parse_without_path_defaults_to_root() {
        assert_eq!(ParsedUrl::parse("storagebox://u1").unwrap().path, "/");
        assert_eq!(ParsedUrl::parse("webdav://host:8080").unwrap().path, "/");
    }

    #[test]
    fn test_parse_webdav_schemes() {
        let plain = ParsedUrl::parse("webdav://host:8080/dav/a.csv").unwrap();
        assert_eq!(plain.http_url(), "http://host:8080/dav/a.csv");
        let secure = ParsedUrl::parse("webdavs://host/dav/").unwrap();
        assert_eq!(secure.http_url(), "https://host/dav/");
        let https = ParsedUrl::parse("https://u1.your-storagebox.de/x").unwrap();
        assert_eq!(https.host, "u1.your-storagebox.de");
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(matches!(
            ParsedUrl::parse("ftp://host/file"),
            Err(WebDavError::InvalidUrl { .. })
        ));
        assert!(ParsedUrl::parse("webdav:///nohost").is_err());
    }

    #[test]
    fn test_is_webdav_target() {
        assert!(is_webdav_target("webdav://h/x"));
        assert!(is_webdav_target("webdavs://h/x"));
        assert!(is_webdav_target("storagebox://u1/x"));
        assert!(is_webdav_target("https://u1.your-storagebox.de/x"));
        assert!(!is_webdav_target("https://example.com/x"));
        assert!(!is_webdav_target("s3://bucket/x"));
    }

    #[test]
    fn test_original_prefix_and_rebuild() {
        assert_eq!(original_prefix("storagebox://u1/data/a.csv"), "storagebox://u1");
        assert_eq!(original_prefix("webdav://h:81"), "webdav://h:81");
        assert_eq!(
            rebuild_original("storagebox://u1/data/*.csv", "/data/b.csv"),
            "storagebox://u1/data/b.csv"
        );
    }

    #[test]
    fn test_escape_path_delimiters() {
        assert_eq!(escape_path_delimiters("/dir/a#b?.csv"), "/dir/a%23b%3F.csv");
        assert_eq!(escape_path_delimiters("/dir/100%.csv"), "/dir/100%25.csv");
        assert_eq!(escape_path_delimiters("/dir/my file.csv"), "/dir/my file.csv");
    }

    #[test]
    fn test_parent_url() {
        assert_eq!(
            parent_url("storagebox://u1/a/b/c.csv").as_deref(),
            Some("storagebox://u1/a/b")
        );
        assert_eq!(parent_url("webdav://h/file.txt").as_deref(), Some("webdav://h"));
        assert_eq!(parent_url("webdav://h"), None);
        assert_eq!(parent_url("webdav://h/dir/").as_deref(), Some("webdav://h"));
    }

    #[test]
    fn test_collection_url_has_trailing_slash() {
        let parsed = ParsedUrl::parse("webdav://h/a/b").unwrap();
        assert_eq!(parsed.collection_url(), "http://h/a/b/");
        assert_eq!(parsed.with_path("c").http_url(), "http://h/c");
    }
}
