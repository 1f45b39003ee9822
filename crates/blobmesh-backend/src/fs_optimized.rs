//! Optimized filesystem backend: blobs are sharded three directory levels
//! deep by the leading bytes of their name string, so no single directory
//! ever holds more than a bounded number of entries.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use blobmesh_core::{BlobName, Error};

use crate::{Backend, BlobWriter};

/// Blobs are stored at `<root>/<n0..3>/<n3..6>/<n6..9>/<rest>.c`, with `.u`
/// marking an in-progress upload of the same path.
pub struct OptimizedFsBackend {
    root: PathBuf,
}

impl OptimizedFsBackend {
    /// Open (creating if absent) a backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn shard_path(&self, name: &BlobName) -> PathBuf {
        let s = name.to_string_form();
        if s.len() < 9 {
            // Names this short don't arise from real 32-byte hashes; fall
            // back to a flat layout rather than panicking on the slice.
            return self.root.join(s);
        }
        self.root.join(&s[0..3]).join(&s[3..6]).join(&s[6..9]).join(&s[9..])
    }

    fn current_path(&self, name: &BlobName) -> PathBuf {
        self.shard_path(name).with_extension("c")
    }

    fn upload_path(&self, name: &BlobName) -> PathBuf {
        self.shard_path(name).with_extension("u")
    }
}

impl Backend for OptimizedFsBackend {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn address(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn open_read_stream(&self, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
        let path = self.current_path(name);
        match fs::File::open(&path) {
            Ok(f) => Ok(Box::new(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn open_write_stream(&self, name: &BlobName) -> Result<Box<dyn BlobWriter>, Error> {
        let upload_path = self.upload_path(name);
        if let Some(parent) = upload_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = match fs::OpenOptions::new().write(true).create_new(true).open(&upload_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(Error::UploadInProgress),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Box::new(FsWriter {
            file: Some(file),
            upload_path,
            final_path: self.current_path(name),
            done: false,
        }))
    }

    fn exists(&self, name: &BlobName) -> bool {
        self.current_path(name).exists()
    }

    fn delete(&self, name: &BlobName) -> Result<(), Error> {
        match fs::remove_file(self.current_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

struct FsWriter {
    file: Option<fs::File>,
    upload_path: PathBuf,
    final_path: PathBuf,
    done: bool,
}

impl Write for FsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.as_mut().expect("writer used after close/cancel").write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.file.as_mut().expect("writer used after close/cancel").flush()
    }
}

impl BlobWriter for FsWriter {
    fn close(mut self: Box<Self>) -> Result<(), Error> {
        self.done = true;
        let file = self.file.take().expect("close called once");
        file.sync_all()?;
        drop(file);
        fs::rename(&self.upload_path, &self.final_path)?;
        Ok(())
    }

    fn cancel(mut self: Box<Self>) -> Result<(), Error> {
        self.done = true;
        self.file.take();
        let _ = fs::remove_file(&self.upload_path);
        Ok(())
    }
}

impl Drop for FsWriter {
    fn drop(&mut self) {
        if !self.done {
            self.file.take();
            let _ = fs::remove_file(&self.upload_path);
        }
    }
}
