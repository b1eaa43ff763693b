use tracing::{debug, warn};

/// Log a debug message only when verbose WebDAV logging is switched on.
pub fn debug_log_context(enabled: bool, context: &str, message: &str) {
    if enabled {
        debug!("🐛 DEBUG [{}]: {}", context, message);
    }
}

/// Log a warning, with the debug marker when verbose logging is on
pub fn debug_warn(enabled: bool, context: &str, message: &str) {
    if enabled {
        warn!("🐛 DEBUG WARN [{}]: {}", context, message);
    } else {
        warn!("[{}]: {}", context, message);
    }
}

/// Verbose logging gated on an explicit flag carried by the calling component.
///
/// ```ignore
/// webdav_debug!(self.debug, "PROPFIND", "listing {} at depth {}", url, depth);
/// ```
#[macro_export]
macro_rules! webdav_debug {
    ($enabled:expr, $context:expr, $msg:expr, $($args:expr),+ $(,)?) => {
        $crate::debug::debug_log_context($enabled, $context, &format!($msg, $($args),+))
    };
    ($enabled:expr, $context:expr, $msg:expr) => {
        $crate::debug::debug_log_context($enabled, $context, $msg)
    };
}

/// Warning that carries the debug marker when verbose logging is enabled.
#[macro_export]
macro_rules! webdav_warn {
    ($enabled:expr, $context:expr, $msg:expr, $($args:expr),+ $(,)?) => {
        $crate::debug::debug_warn($enabled, $context, &format!($msg, $($args),+))
    };
    ($enabled:expr, $context:expr, $msg:expr) => {
        $crate::debug::debug_warn($enabled, $context, $msg)
    };
}
