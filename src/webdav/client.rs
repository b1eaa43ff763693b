use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use tracing::debug;

use super::credentials::Credentials;
use crate::config::WebDavSettings;
use crate::errors::{Result, WebDavError};
use crate::transport::{HttpRequest, HttpResponse, HttpStats, HttpTransport, TransportSession};
use crate::webdav_debug;

/// Namespace for properties written with PROPPATCH
pub const PROPERTY_NAMESPACE: &str = "urn:x-webdavfs:properties";

const PROPFIND_BODY: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8"?>"#,
    r#"<D:propfind xmlns:D="DAV:"><D:prop>"#,
    "<D:resourcetype/><D:getcontentlength/><D:getlastmodified/>",
    "</D:prop></D:propfind>"
);

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

fn extension_method(name: &str) -> Result<Method> {
    Method::from_bytes(name.as_bytes()).map_err(|_| WebDavError::InvalidMethod {
        method: name.to_string(),
    })
}

/// WebDAV verbs over an HTTP transport. Every request carries Basic auth
/// when credentials are present.
#[derive(Clone)]
pub struct WebDavClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Option<Credentials>,
    debug: bool,
}

impl WebDavClient {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: Option<Credentials>, debug: bool) -> Self {
        Self {
            transport,
            credentials,
            debug,
        }
    }

    /// Client over a fresh transport session built from settings.
    pub fn connect(
        settings: &WebDavSettings,
        credentials: Option<Credentials>,
        stats: Option<Arc<HttpStats>>,
    ) -> Result<Self> {
        let mut session = TransportSession::new(settings)?;
        if let Some(stats) = stats {
            session = session.with_stats(stats);
        }
        Ok(Self::new(Arc::new(session), credentials, settings.debug_logging))
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        match self.credentials.as_ref().and_then(Credentials::basic_auth_header) {
            Some(value) => request.header(AUTHORIZATION.as_str(), &value),
            None => request,
        }
    }

    pub async fn send(&self, request: HttpRequest) -> HttpResponse {
        self.transport.send(self.authorize(request)).await
    }

    /// Lists `url` (a collection, with trailing slash) to the given depth.
    pub async fn propfind(&self, url: &str, depth: u32) -> Result<HttpResponse> {
        webdav_debug!(self.debug, "PROPFIND", "{} depth={}", url, depth);
        let request = HttpRequest::new(extension_method("PROPFIND")?, url)
            .header("Depth", &depth.to_string())
            .header("Content-Type", XML_CONTENT_TYPE)
            .body(Bytes::from_static(PROPFIND_BODY.as_bytes()));
        Ok(self.send(request).await)
    }

    /// Sets one custom property in the private namespace.
    pub async fn proppatch(&self, url: &str, name: &str, value: &str) -> Result<HttpResponse> {
        if !is_xml_name(name) {
            return Err(WebDavError::InvalidPropertyName {
                name: name.to_string(),
            });
        }
        let body = format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<D:propertyupdate xmlns:D="DAV:" xmlns:C="{ns}">"#,
                "<D:set><D:prop><C:{name}>{value}</C:{name}></D:prop></D:set>",
                "</D:propertyupdate>"
            ),
            ns = PROPERTY_NAMESPACE,
            name = name,
            value = quick_xml::escape::escape(value),
        );
        webdav_debug!(self.debug, "PROPPATCH", "{} {}", url, name);
        let request = HttpRequest::new(extension_method("PROPPATCH")?, url)
            .header("Content-Type", XML_CONTENT_TYPE)
            .body(body);
        Ok(self.send(request).await)
    }

    pub async fn mkcol(&self, url: &str) -> Result<HttpResponse> {
        webdav_debug!(self.debug, "MKCOL", "{}", url);
        let request = HttpRequest::new(extension_method("MKCOL")?, url);
        Ok(self.send(request).await)
    }

    /// Moves `source` to `destination` (both resolved HTTP URLs), overwriting.
    pub async fn move_resource(&self, source: &str, destination: &str) -> Result<HttpResponse> {
        debug!("🚚 MOVE {} -> {}", source, destination);
        let request = HttpRequest::new(extension_method("MOVE")?, source)
            .header("Destination", destination)
            .header("Overwrite", "T");
        Ok(self.send(request).await)
    }

    pub async fn head(&self, url: &str) -> HttpResponse {
        self.send(HttpRequest::head(url)).await
    }

    pub async fn get(&self, url: &str) -> HttpResponse {
        self.send(HttpRequest::get(url)).await
    }

    /// Inclusive byte range `offset..offset+len`.
    pub async fn get_range(&self, url: &str, offset: u64, len: u64) -> HttpResponse {
        let last = offset + len.max(1) - 1;
        let request = HttpRequest::get(url).header("Range", &format!("bytes={}-{}", offset, last));
        self.send(request).await
    }

    pub async fn put(&self, url: &str, body: Bytes) -> HttpResponse {
        debug!("⬆️ PUT {} ({} bytes from memory)", url, body.len());
        self.send(HttpRequest::put(url).body(body)).await
    }

    /// Streams the body from a local file; needs a transport with file upload support.
    pub async fn put_file(&self, url: &str, path: &Path, size: u64) -> Result<HttpResponse> {
        let uploader = self
            .transport
            .file_upload()
            .ok_or_else(|| WebDavError::Configuration {
                details: "transport cannot stream uploads from local files".to_string(),
            })?;
        debug!("⬆️ PUT {} ({} bytes from {})", url, size, path.display());
        let request = self.authorize(HttpRequest::put(url));
        Ok(uploader.upload_file(request, path, size).await)
    }

    pub async fn delete(&self, url: &str) -> HttpResponse {
        webdav_debug!(self.debug, "DELETE", "{}", url);
        self.send(HttpRequest::delete(url)).await
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Turns a completed exchange into the right error for `operation` on `path`.
pub fn response_error(operation: &str, path: &str, response: &HttpResponse) -> WebDavError {
    match &response.transport_error {
        Some(message) => WebDavError::Transport {
            operation: operation.to_string(),
            url: path.to_string(),
            message: message.clone(),
        },
        None => WebDavError::from_status(operation, path, response.status),
    }
}
