use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebDavError>;

/// Errors raised by the WebDAV filesystem and its transport
#[derive(Error, Debug)]
pub enum WebDavError {
    #[error("Invalid WebDAV URL: {url}")]
    InvalidUrl { url: String },

    #[error("WebDAV does not support non-sequential writes. Expected location {expected} but got {actual}")]
    NonSequentialWrite { expected: u64, actual: u64 },

    #[error("'{path}' was already flushed; WebDAV cannot append to an uploaded file")]
    WriteAfterFlush { path: String },

    #[error("Transport error during {operation} on '{url}': {message}")]
    Transport {
        operation: String,
        url: String,
        message: String,
    },

    #[error("{operation} failed for '{path}': HTTP {status}{}", guidance_suffix(*.status))]
    RemoteProtocol {
        operation: String,
        path: String,
        status: u16,
    },

    #[error("{operation} failed for '{path}': HTTP 507 Insufficient Storage{}", guidance_suffix(507))]
    StorageExhausted { operation: String, path: String },

    #[error("{operation} failed for '{path}': HTTP 401 Unauthorized{}", guidance_suffix(401))]
    Authentication { operation: String, path: String },

    #[error("{operation} failed for '{path}': HTTP 409 Conflict{}", guidance_suffix(409))]
    Conflict { operation: String, path: String },

    #[error("Unsupported open mode for '{path}': {reason}")]
    UnsupportedOpenMode { path: String, reason: String },

    #[error("Invalid property name '{name}': only letters, digits, '-', '_' and '.' are allowed")]
    InvalidPropertyName { name: String },

    #[error("Invalid HTTP method '{method}'")]
    InvalidMethod { method: String },

    #[error("Local I/O error on '{path}': {source}")]
    LocalIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {details}")]
    Configuration { details: String },
}

impl WebDavError {
    /// Classifies a failed HTTP status into the matching error kind.
    pub fn from_status(operation: &str, path: &str, status: u16) -> Self {
        let operation = operation.to_string();
        let path = path.to_string();
        match status {
            401 => WebDavError::Authentication { operation, path },
            409 => WebDavError::Conflict { operation, path },
            507 => WebDavError::StorageExhausted { operation, path },
            _ => WebDavError::RemoteProtocol {
                operation,
                path,
                status,
            },
        }
    }

    pub fn local_io(path: impl Into<String>, source: std::io::Error) -> Self {
        WebDavError::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by the error, if it came from the server
    pub fn status(&self) -> Option<u16> {
        match self {
            WebDavError::RemoteProtocol { status, .. } => Some(*status),
            WebDavError::StorageExhausted { .. } => Some(507),
            WebDavError::Authentication { .. } => Some(401),
            WebDavError::Conflict { .. } => Some(409),
            _ => None,
        }
    }

    pub fn is_storage_exhausted(&self) -> bool {
        matches!(self, WebDavError::StorageExhausted { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            WebDavError::InvalidUrl { .. } => "WEBDAV_INVALID_URL",
            WebDavError::NonSequentialWrite { .. } => "WEBDAV_NON_SEQUENTIAL_WRITE",
            WebDavError::WriteAfterFlush { .. } => "WEBDAV_WRITE_AFTER_FLUSH",
            WebDavError::Transport { .. } => "WEBDAV_TRANSPORT",
            WebDavError::RemoteProtocol { .. } => "WEBDAV_REMOTE_PROTOCOL",
            WebDavError::StorageExhausted { .. } => "WEBDAV_STORAGE_EXHAUSTED",
            WebDavError::Authentication { .. } => "WEBDAV_AUTHENTICATION",
            WebDavError::Conflict { .. } => "WEBDAV_CONFLICT",
            WebDavError::UnsupportedOpenMode { .. } => "WEBDAV_UNSUPPORTED_OPEN_MODE",
            WebDavError::InvalidPropertyName { .. } => "WEBDAV_INVALID_PROPERTY_NAME",
            WebDavError::InvalidMethod { .. } => "WEBDAV_INVALID_METHOD",
            WebDavError::LocalIo { .. } => "WEBDAV_LOCAL_IO",
            WebDavError::Configuration { .. } => "WEBDAV_CONFIGURATION",
        }
    }

    pub fn suggested_action(&self) -> Option<String> {
        match self {
            WebDavError::NonSequentialWrite { .. } | WebDavError::WriteAfterFlush { .. } => Some(
                "Write the file front to back in a single pass, then close it".to_string(),
            ),
            WebDavError::Transport { .. } => {
                Some("Check network connectivity, proxy and TLS settings".to_string())
            }
            WebDavError::UnsupportedOpenMode { .. } => {
                Some("Open the file either for reading or for writing, without append".to_string())
            }
            WebDavError::LocalIo { .. } => {
                Some("Check free space and permissions of the temp directory".to_string())
            }
            _ => self.status().and_then(guidance).map(str::to_string),
        }
    }
}

/// Remediation text for statuses users commonly hit against hosted WebDAV.
pub fn guidance(status: u16) -> Option<&'static str> {
    match status {
        401 => Some(
            "Authentication failed. Check the username and password configured for this WebDAV location.",
        ),
        403 => Some(
            "Access forbidden. Check that WebDAV access is enabled on the server, that the user may access this path and that the path lies inside the allowed scope.",
        ),
        404 => Some(
            "Not found. For writes the parent directory must exist; create it first.",
        ),
        405 => Some(
            "Method not allowed. The server does not support this WebDAV operation on this path.",
        ),
        409 => Some(
            "Conflict. The parent directory probably does not exist; create parent directories first.",
        ),
        507 => Some(
            "Storage is full. Free up space by deleting files or upgrade the storage plan.",
        ),
        _ => None,
    }
}

fn guidance_suffix(status: u16) -> String {
    guidance(status)
        .map(|text| format!("\n\n{}", text))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_picks_dedicated_kinds() {
        assert!(matches!(
            WebDavError::from_status("write", "/a", 401),
            WebDavError::Authentication { .. }
        ));
        assert!(matches!(
            WebDavError::from_status("write", "/a", 409),
            WebDavError::Conflict { .. }
        ));
        assert!(WebDavError::from_status("mkdir", "/a", 507).is_storage_exhausted());
        assert_eq!(WebDavError::from_status("rm", "/a", 418).status(), Some(418));
    }

    #[test]
    fn test_display_carries_operation_path_status_and_guidance() {
        let err = WebDavError::from_status("write", "storagebox://u1/data/x.parquet", 403);
        let text = err.to_string();
        assert!(text.contains("write"));
        assert!(text.contains("storagebox://u1/data/x.parquet"));
        assert!(text.contains("403"));
        assert!(text.contains("Access forbidden"));

        let full = WebDavError::from_status("mkdir", "webdav://h/d", 507).to_string();
        assert!(full.contains("Storage is full"));
    }

    #[test]
    fn test_unknown_status_has_no_guidance() {
        let err = WebDavError::from_status("delete", "/x", 500);
        assert!(!err.to_string().contains("\n\n"));
        assert_eq!(err.suggested_action(), None);
    }
}
