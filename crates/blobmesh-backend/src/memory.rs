//! In-memory backend: a map from name to bytes, guarded by a mutex, plus a
//! set of names currently being written.

use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use blobmesh_core::{BlobName, Error};

use crate::{Backend, BlobWriter};

struct State {
    blobs: HashMap<String, Vec<u8>>,
    in_progress: HashSet<String>,
}

/// A backend that keeps all blobs in process memory. Useful for tests and
/// as a staging layer in front of a slower backend.
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Build an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(State { blobs: HashMap::new(), in_progress: HashSet::new() })) }
    }
}

impl Backend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn address(&self) -> String {
        "memory://".to_string()
    }

    fn open_read_stream(&self, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
        let key = name.to_string_form();
        let state = self.state.lock().unwrap();
        let bytes = state.blobs.get(&key).ok_or(Error::NotFound)?.clone();
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn open_write_stream(&self, name: &BlobName) -> Result<Box<dyn BlobWriter>, Error> {
        let key = name.to_string_form();
        let mut state = self.state.lock().unwrap();
        if !state.in_progress.insert(key.clone()) {
            return Err(Error::UploadInProgress);
        }
        Ok(Box::new(MemoryWriter { state: self.state.clone(), key, buf: Vec::new(), done: false }))
    }

    fn exists(&self, name: &BlobName) -> bool {
        let key = name.to_string_form();
        self.state.lock().unwrap().blobs.contains_key(&key)
    }

    fn delete(&self, name: &BlobName) -> Result<(), Error> {
        let key = name.to_string_form();
        let mut state = self.state.lock().unwrap();
        if state.blobs.remove(&key).is_none() {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}

struct MemoryWriter {
    state: Arc<Mutex<State>>,
    key: String,
    buf: Vec<u8>,
    done: bool,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BlobWriter for MemoryWriter {
    fn close(mut self: Box<Self>) -> Result<(), Error> {
        self.done = true;
        let mut state = self.state.lock().unwrap();
        state.in_progress.remove(&self.key);
        state.blobs.insert(self.key.clone(), std::mem::take(&mut self.buf));
        Ok(())
    }

    fn cancel(mut self: Box<Self>) -> Result<(), Error> {
        self.done = true;
        self.state.lock().unwrap().in_progress.remove(&self.key);
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if !self.done {
            self.state.lock().unwrap().in_progress.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobmesh_core::BlobType;
    use std::io::Read as _;

    fn name(byte: u8) -> BlobName {
        BlobName::new(&[byte; 32], BlobType::Static).unwrap()
    }

    #[test]
    fn round_trips_written_bytes() {
        let backend = MemoryBackend::new();
        let n = name(1);
        let mut w = backend.open_write_stream(&n).unwrap();
        w.write_all(b"hello").unwrap();
        w.close().unwrap();

        assert!(backend.exists(&n));
        let mut r = backend.open_read_stream(&n).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn cancel_discards_bytes_and_releases_lock() {
        let backend = MemoryBackend::new();
        let n = name(2);
        let w = backend.open_write_stream(&n).unwrap();
        w.cancel().unwrap();
        assert!(!backend.exists(&n));
        // lock was released, a fresh writer may open
        backend.open_write_stream(&n).unwrap();
    }

    #[test]
    fn concurrent_writers_for_same_name_conflict() {
        let backend = MemoryBackend::new();
        let n = name(3);
        let _w1 = backend.open_write_stream(&n).unwrap();
        let err = backend.open_write_stream(&n).unwrap_err();
        assert!(matches!(err, Error::UploadInProgress));
    }

    #[test]
    fn delete_missing_blob_is_not_found() {
        let backend = MemoryBackend::new();
        let n = name(4);
        assert!(matches!(backend.delete(&n).unwrap_err(), Error::NotFound));
    }
}
