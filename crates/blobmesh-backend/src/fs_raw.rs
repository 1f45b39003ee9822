//! Raw filesystem backend: blobs are placed directly at `<root>/<name>`,
//! intended for exporting a tree to a static web server rather than for
//! concurrent writers.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use blobmesh_core::{BlobName, Error};

use crate::{Backend, BlobWriter};

/// Files live at `<root>/<name_string>`; uploads stage through
/// `tempfile_<n>` in the same directory before an atomic rename.
pub struct RawFsBackend {
    root: PathBuf,
    tempfile_counter: AtomicU64,
}

impl RawFsBackend {
    /// Open (creating if absent) a backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, tempfile_counter: AtomicU64::new(0) })
    }

    fn path(&self, name: &BlobName) -> PathBuf {
        self.root.join(name.to_string_form())
    }
}

impl Backend for RawFsBackend {
    fn kind(&self) -> &'static str {
        "file-raw"
    }

    fn address(&self) -> String {
        format!("file-raw://{}", self.root.display())
    }

    fn open_read_stream(&self, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
        match fs::File::open(self.path(name)) {
            Ok(f) => Ok(Box::new(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn open_write_stream(&self, name: &BlobName) -> Result<Box<dyn BlobWriter>, Error> {
        let n = self.tempfile_counter.fetch_add(1, Ordering::Relaxed);
        let tmp_path = self.root.join(format!("tempfile_{n}"));
        let file = fs::OpenOptions::new().write(true).create_new(true).open(&tmp_path)?;
        Ok(Box::new(RawFsWriter { file: Some(file), tmp_path, final_path: self.path(name), done: false }))
    }

    fn exists(&self, name: &BlobName) -> bool {
        self.path(name).exists()
    }

    fn delete(&self, name: &BlobName) -> Result<(), Error> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

struct RawFsWriter {
    file: Option<fs::File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    done: bool,
}

impl Write for RawFsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.as_mut().expect("writer used after close/cancel").write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.file.as_mut().expect("writer used after close/cancel").flush()
    }
}

impl BlobWriter for RawFsWriter {
    fn close(mut self: Box<Self>) -> Result<(), Error> {
        self.done = true;
        let file = self.file.take().expect("close called once");
        file.sync_all()?;
        drop(file);
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(())
    }

    fn cancel(mut self: Box<Self>) -> Result<(), Error> {
        self.done = true;
        self.file.take();
        let _ = fs::remove_file(&self.tmp_path);
        Ok(())
    }
}

impl Drop for RawFsWriter {
    fn drop(&mut self) {
        if !self.done {
            self.file.take();
            let _ = fs::remove_file(&self.tmp_path);
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
    fn round_trips_flat_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RawFsBackend::new(dir.path()).unwrap();
        let n = name(20);
        let mut w = backend.open_write_stream(&n).unwrap();
        w.write_all(b"static export").unwrap();
        w.close().unwrap();

        assert!(dir.path().join(n.to_string_form()).is_file());
        let mut out = Vec::new();
        backend.open_read_stream(&n).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"static export");
    }

    #[test]
    fn concurrent_writers_use_distinct_tempfiles() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RawFsBackend::new(dir.path()).unwrap();
        let n = name(21);
        let w1 = backend.open_write_stream(&n).unwrap();
        let w2 = backend.open_write_stream(&n).unwrap();
        w1.cancel().unwrap();
        w2.cancel().unwrap();
    }
}
