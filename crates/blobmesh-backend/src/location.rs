//! Location DSL: build a [`Backend`] from a `scheme://...` address string
//! (or a bare filesystem path, treated as `file://`).

use blobmesh_core::Error;

use crate::{Backend, HttpBackend, MemoryBackend, OptimizedFsBackend, RawFsBackend};

/// Resolve a location string to a boxed backend.
///
/// - `memory://` — an ephemeral, process-local [`MemoryBackend`].
/// - `file://<path>` or a bare path with no `://` — [`OptimizedFsBackend`].
/// - `file-raw://<path>` — [`RawFsBackend`].
/// - `http://<host>...` / `https://<host>...` — [`HttpBackend`].
pub fn open_backend(location: &str) -> Result<Box<dyn Backend>, Error> {
    if let Some(rest) = location.strip_prefix("memory://") {
        if !rest.is_empty() {
            return Err(Error::ConnectionError(format!(
                "memory:// takes no suffix, got {location:?}"
            )));
        }
        return Ok(Box::new(MemoryBackend::new()));
    }
    if let Some(path) = location.strip_prefix("file-raw://") {
        return Ok(Box::new(RawFsBackend::new(path)?));
    }
    if let Some(path) = location.strip_prefix("file://") {
        return Ok(Box::new(OptimizedFsBackend::new(path)?));
    }
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(Box::new(HttpBackend::new(location.trim_end_matches('/'))));
    }
    if !location.contains("://") {
        return Ok(Box::new(OptimizedFsBackend::new(location)?));
    }
    Err(Error::ConnectionError(format!("unrecognized backend location: {location}")))
}
