use std::env;
use std::fmt;

use base64ct::{Base64, Encoding};

/// Scopes a credential pair applies to when none are given explicitly
pub const DEFAULT_SCOPES: [&str; 4] = ["webdav://", "webdavs://", "storagebox://", "https://"];

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `WEBDAV_USERNAME` / `WEBDAV_PASSWORD`
    pub fn from_env() -> Option<Self> {
        let username = env::var("WEBDAV_USERNAME").unwrap_or_default();
        let password = env::var("WEBDAV_PASSWORD").unwrap_or_default();
        let credentials = Self::new(username, password);
        (!credentials.is_empty()).then_some(credentials)
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// `Basic base64(user:password)`, or `None` when there is nothing to send.
    pub fn basic_auth_header(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let raw = format!("{}:{}", self.username, self.password);
        Some(format!("Basic {}", Base64::encode_string(raw.as_bytes())))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"redacted")
            .finish()
    }
}

/// Looks up credentials for a caller-form URL such as `storagebox://u1/x`.
pub trait CredentialProvider: Send + Sync {
    fn credentials_for(&self, url: &str) -> Option<Credentials>;
}

impl CredentialProvider for Credentials {
    fn credentials_for(&self, _url: &str) -> Option<Credentials> {
        Some(self.clone())
    }
}

/// No credentials for any URL
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn credentials_for(&self, _url: &str) -> Option<Credentials> {
        None
    }
}

#[derive(Debug, Clone)]
struct ScopedEntry {
    scopes: Vec<String>,
    credentials: Credentials,
}

/// Credential pairs bound to URL prefixes; the longest matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct ScopedCredentials {
    entries: Vec<ScopedEntry>,
}

impl ScopedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers credentials for the given scopes, or the default scopes when empty.
    pub fn insert<S: Into<String>>(&mut self, scopes: Vec<S>, credentials: Credentials) {
        let mut scopes: Vec<String> = scopes.into_iter().map(Into::into).collect();
        if scopes.is_empty() {
            scopes = DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect();
        }
        self.entries.push(ScopedEntry { scopes, credentials });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialProvider for ScopedCredentials {
    fn credentials_for(&self, url: &str) -> Option<Credentials> {
        self.entries
            .iter()
            .flat_map(|entry| {
                entry
                    .scopes
                    .iter()
                    .filter(|scope| url.starts_with(scope.as_str()))
                    .map(move |scope| (scope.len(), &entry.credentials))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, credentials)| credentials.clone())
    }
}
