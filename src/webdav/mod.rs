pub mod client;
pub mod credentials;
pub mod directory;
pub mod file;
pub mod filesystem;
pub mod href;
pub mod listing;
pub mod pattern;
pub mod url;

pub use client::WebDavClient;
pub use credentials::{Anonymous, CredentialProvider, Credentials, ScopedCredentials};
pub use file::{OpenFlags, WebDavFileHandle, WriteSession, WriteState};
pub use filesystem::WebDavFileSystem;
pub use url::{is_webdav_target, ParsedUrl};
