use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{Result, WebDavError};
use crate::transport::retry::RetryPolicy;

const MIB: u64 = 1024 * 1024;

/// HTTP proxy used for every WebDAV request when configured
#[derive(Clone)]
pub struct ProxySettings {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    pub fn proxy_url(&self) -> String {
        let host = if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("http://{}", self.host)
        };
        match self.port {
            Some(port) => format!("{}:{}", host.trim_end_matches('/'), port),
            None => host,
        }
    }

    /// True when a port is set, either separately or after the host.
    pub fn has_port(&self) -> bool {
        if self.port.is_some() {
            return true;
        }
        let rest = self.host.split_once("://").map_or(self.host.as_str(), |(_, rest)| rest);
        let authority = rest.split('/').next().unwrap_or_default();
        let host_port = authority.rsplit('@').next().unwrap_or_default();
        // skip past a bracketed IPv6 literal
        let after_host = match host_port.rfind(']') {
            Some(index) => &host_port[index + 1..],
            None => host_port,
        };
        after_host
            .rsplit_once(':')
            .is_some_and(|(_, port)| port.parse::<u16>().is_ok())
    }
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "redacted"))
            .finish()
    }
}

/// Settings shared by every WebDAV filesystem operation
#[derive(Clone)]
pub struct WebDavSettings {
    pub debug_logging: bool,
    pub max_retries: u32,
    /// Write buffers larger than this spill to a local temp file
    pub streaming_threshold_mb: u64,
    pub verify_tls: bool,
    pub ca_cert_path: Option<PathBuf>,
    pub proxy: Option<ProxySettings>,
    pub bearer_token: Option<String>,
    pub keep_alive: bool,
    pub timeout_seconds: u64,
}

impl Default for WebDavSettings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            max_retries: 3,
            streaming_threshold_mb: 50,
            verify_tls: true,
            ca_cert_path: None,
            proxy: None,
            bearer_token: None,
            keep_alive: true,
            timeout_seconds: 30,
        }
    }
}

impl fmt::Debug for WebDavSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavSettings")
            .field("debug_logging", &self.debug_logging)
            .field("max_retries", &self.max_retries)
            .field("streaming_threshold_mb", &self.streaming_threshold_mb)
            .field("verify_tls", &self.verify_tls)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("proxy", &self.proxy)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "redacted"))
            .field("keep_alive", &self.keep_alive)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl WebDavSettings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let proxy = env::var("WEBDAV_HTTP_PROXY")
            .ok()
            .filter(|host| !host.trim().is_empty())
            .map(|host| ProxySettings {
                host,
                port: env::var("WEBDAV_HTTP_PROXY_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok()),
                username: env::var("WEBDAV_HTTP_PROXY_USERNAME").ok(),
                password: env::var("WEBDAV_HTTP_PROXY_PASSWORD").ok(),
            });

        let settings = WebDavSettings {
            debug_logging: env_flag("WEBDAV_DEBUG_LOGGING").unwrap_or(defaults.debug_logging),
            max_retries: env::var("WEBDAV_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            streaming_threshold_mb: env::var("WEBDAV_STREAMING_THRESHOLD_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.streaming_threshold_mb),
            verify_tls: env_flag("WEBDAV_VERIFY_TLS").unwrap_or(defaults.verify_tls),
            ca_cert_path: env::var("WEBDAV_CA_CERT_PATH").ok().map(PathBuf::from),
            proxy,
            bearer_token: env::var("WEBDAV_BEARER_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
            keep_alive: env_flag("WEBDAV_KEEP_ALIVE").unwrap_or(defaults.keep_alive),
            timeout_seconds: env::var("WEBDAV_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_seconds),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.streaming_threshold_mb == 0 {
            return Err(WebDavError::Configuration {
                details: "streaming threshold must be at least 1 MiB".to_string(),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(WebDavError::Configuration {
                details: "timeout must be greater than zero".to_string(),
            });
        }
        if let Some(proxy) = &self.proxy {
            if !proxy.has_port() {
                return Err(WebDavError::Configuration {
                    details: format!("proxy '{}' has no port", proxy.host),
                });
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn spill_threshold_bytes(&self) -> u64 {
        self.streaming_threshold_mb.saturating_mul(MIB)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|val| match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}
