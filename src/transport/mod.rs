pub mod connection;
pub mod request;
pub mod response;
pub mod retry;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod upload;

pub use connection::HttpConnection;
pub use request::{BodySource, HttpRequest};
pub use response::{HeaderSet, HttpResponse};
pub use retry::{RetryPolicy, RetryingExecutor, TransportErrorKind, TransportFailure};
pub use session::{HttpTransport, SupportsFileUpload, TransportSession};
pub use stats::{HttpStats, HttpStatsSnapshot};
