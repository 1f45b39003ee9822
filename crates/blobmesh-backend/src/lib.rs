//! Storage backends: in-memory, two filesystem layouts, and an HTTP client,
//! all implementing the same [`Backend`] trait so a datastore façade can be
//! built over any of them interchangeably.

#![warn(missing_docs)]

mod fs_optimized;
mod fs_raw;
mod http;
mod location;
mod memory;

use std::io::{Read, Write};

use blobmesh_core::{BlobName, Error};

pub use fs_optimized::OptimizedFsBackend;
pub use fs_raw::RawFsBackend;
pub use http::HttpBackend;
pub use location::open_backend;
pub use memory::MemoryBackend;

/// A backend implementation: a content-addressed bucket of named blobs.
pub trait Backend: Send + Sync {
    /// A short identifier for the backend implementation, e.g. `"memory"`.
    fn kind(&self) -> &'static str;

    /// The backend's location, in `scheme://...` form.
    fn address(&self) -> String;

    /// Open a stream over the current bytes stored under `name`.
    /// Fails with [`Error::NotFound`] if no blob is stored under that name.
    fn open_read_stream(&self, name: &BlobName) -> Result<Box<dyn Read + Send>, Error>;

    /// Open a stream to write bytes under `name`. Fails with
    /// [`Error::UploadInProgress`] if another writer for this name is
    /// already open.
    fn open_write_stream(&self, name: &BlobName) -> Result<Box<dyn BlobWriter>, Error>;

    /// Whether a blob is currently stored under `name`.
    fn exists(&self, name: &BlobName) -> bool;

    /// Remove the blob stored under `name`. Fails with [`Error::NotFound`]
    /// if none is stored.
    fn delete(&self, name: &BlobName) -> Result<(), Error>;
}

/// A write handle that must be explicitly finalized: [`BlobWriter::close`]
/// atomically publishes the written bytes, [`BlobWriter::cancel`] discards
/// them and releases the write lock on the name.
pub trait BlobWriter: Write {
    /// Publish the bytes written so far as the blob's new content.
    fn close(self: Box<Self>) -> Result<(), Error>;

    /// Discard the bytes written so far; the name is left as it was before
    /// this writer was opened.
    fn cancel(self: Box<Self>) -> Result<(), Error>;
}
