pub mod config;
pub mod debug;
pub mod errors;
pub mod transport;
pub mod webdav;

pub use config::{ProxySettings, WebDavSettings};
pub use errors::{Result, WebDavError};
pub use transport::{HttpStats, HttpStatsSnapshot};
pub use webdav::{
    Anonymous, CredentialProvider, Credentials, OpenFlags, ScopedCredentials, WebDavFileHandle,
    WebDavFileSystem,
};
