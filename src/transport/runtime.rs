//! Process-wide transport state.
//!
//! Sessions register on construction and deregister on drop. Loaded CA bundles
//! are cached for the life of the process; nothing is ever torn down, because
//! another session may start at any moment on another thread.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use reqwest::Certificate;
use tracing::info;

use crate::errors::{Result, WebDavError};

#[derive(Default)]
struct RuntimeState {
    sessions: usize,
    ca_bundles: HashMap<PathBuf, Vec<Certificate>>,
}

fn state() -> &'static Mutex<RuntimeState> {
    static STATE: OnceLock<Mutex<RuntimeState>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(RuntimeState::default()))
}

/// Registers a session and returns the trust roots it should add, loading the
/// bundle on first use.
pub fn acquire(ca_bundle: Option<&Path>) -> Result<Vec<Certificate>> {
    let mut state = state().lock().unwrap_or_else(PoisonError::into_inner);
    let roots = match ca_bundle {
        Some(path) => match state.ca_bundles.get(path) {
            Some(certs) => certs.clone(),
            None => {
                let certs = load_bundle(path)?;
                info!("🔐 Loaded {} CA certificate(s) from {}", certs.len(), path.display());
                state.ca_bundles.insert(path.to_path_buf(), certs.clone());
                certs
            }
        },
        None => Vec::new(),
    };
    state.sessions += 1;
    Ok(roots)
}

pub fn release() {
    let mut state = state().lock().unwrap_or_else(PoisonError::into_inner);
    state.sessions = state.sessions.saturating_sub(1);
}

pub fn active_sessions() -> usize {
    state()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .sessions
}

fn load_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let pem = std::fs::read(path).map_err(|e| WebDavError::local_io(path.display().to_string(), e))?;
    Certificate::from_pem_bundle(&pem).map_err(|e| WebDavError::Configuration {
        details: format!("invalid CA bundle {}: {}", path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bundle_is_reported() {
        let err = acquire(Some(Path::new("/nonexistent/ca-bundle.pem"))).unwrap_err();
        assert!(matches!(err, WebDavError::LocalIo { .. }));
    }

    #[test]
    fn test_acquire_without_bundle_registers_session() {
        let roots = acquire(None).unwrap();
        assert!(roots.is_empty());
        assert!(active_sessions() >= 1);
        release();
    }
}
