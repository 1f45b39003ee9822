//! `DS`: a datastore façade over a single [`Backend`], dispatching to the
//! static or dynamic-link pipeline by the blob name's type byte.

use std::io::{self, Cursor, Read, Write};

use blobmesh_backend::Backend;
use blobmesh_core::{write_validated, BlobName, BlobType, Ctx, Error, ValidatingReader};
use blobmesh_link::{PublicReader, PublicRecord};
use blobmesh_telemetry::observer;

/// Common surface shared by [`DS`] and the multi-source cache, so the cache
/// can wrap either a bare façade or another cache as its primary.
pub trait Datastore: Send + Sync {
    /// The backend's kind string.
    fn kind(&self) -> String;
    /// The backend's address string.
    fn address(&self) -> String;
    /// Open the named blob for the appropriate per-type pipeline.
    fn open(&self, ctx: &Ctx, name: &BlobName) -> Result<Box<dyn Read + Send>, Error>;
    /// Update the named blob from `reader`, applying per-type acceptance rules.
    fn update(&self, ctx: &Ctx, name: &BlobName, reader: &mut dyn Read) -> Result<(), Error>;
    /// Whether the named blob is currently present.
    fn exists(&self, ctx: &Ctx, name: &BlobName) -> Result<bool, Error>;
    /// Remove the named blob.
    fn delete(&self, ctx: &Ctx, name: &BlobName) -> Result<(), Error>;
}

/// A datastore façade over a single storage backend.
pub struct DS {
    backend: Box<dyn Backend>,
}

impl DS {
    /// Wrap `backend` in a façade that understands the blob-type pipelines.
    #[must_use]
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    fn open_static(&self, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
        let inner = self.backend.open_read_stream(name)?;
        Ok(Box::new(ValidatingReader::new(name, inner)))
    }

    fn open_dynamic(&self, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
        let inner = self.backend.open_read_stream(name)?;
        let record = PublicRecord::parse(name, inner)?;
        let reader = PublicReader::new(record);
        let bytes = {
            let mut buf = Vec::new();
            reader.get_public_data_reader().read_to_end(&mut buf).map_err(Error::Io)?;
            buf
        };
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn update_static(&self, ctx: &Ctx, name: &BlobName, reader: &mut dyn Read) -> Result<(), Error> {
        ctx.check()?;
        let mut writer = self.backend.open_write_stream(name)?;
        match write_validated(name, reader, &mut writer) {
            Ok(()) => {
                writer.close()?;
                Ok(())
            }
            Err(e) => {
                let _ = writer.cancel();
                Err(e)
            }
        }
    }

    fn update_dynamic(&self, ctx: &Ctx, name: &BlobName, reader: &mut dyn Read) -> Result<(), Error> {
        ctx.check()?;
        let mut writer = self.backend.open_write_stream(name)?;
        let mut tee = TeeWriter { inner: writer.as_mut(), buf: Vec::new() };
        if let Err(e) = io::copy(reader, &mut tee).map_err(Error::Io) {
            let _ = writer.cancel();
            return Err(e);
        }
        let buf = tee.buf;

        let candidate = match PublicRecord::parse(name, Cursor::new(&buf)) {
            Ok(record) => record,
            Err(e) => {
                let _ = writer.cancel();
                return Err(e);
            }
        };

        let accept = match self.open_dynamic(name) {
            Ok(mut current_bytes) => {
                let mut current_raw = Vec::new();
                current_bytes.read_to_end(&mut current_raw).map_err(Error::Io)?;
                match PublicRecord::parse(name, Cursor::new(&current_raw)) {
                    Ok(current) => candidate.greater_than(&current),
                    Err(_) => true,
                }
            }
            Err(e) if e.is_not_found() => true,
            Err(e) => return Err(e),
        };

        if accept {
            writer.close()?;
        } else {
            writer.cancel()?;
        }
        Ok(())
    }
}

impl Datastore for DS {
    fn kind(&self) -> String {
        self.backend.kind().to_string()
    }

    fn address(&self) -> String {
        self.backend.address()
    }

    fn open(&self, ctx: &Ctx, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
        ctx.check()?;
        let _span = observer().span("datastore.open");
        match name.blob_type()? {
            BlobType::Static => self.open_static(name),
            BlobType::DynamicLink => self.open_dynamic(name),
        }
    }

    fn update(&self, ctx: &Ctx, name: &BlobName, reader: &mut dyn Read) -> Result<(), Error> {
        ctx.check()?;
        let _span = observer().span("datastore.update");
        match name.blob_type()? {
            BlobType::Static => self.update_static(ctx, name, reader),
            BlobType::DynamicLink => self.update_dynamic(ctx, name, reader),
        }
    }

    fn exists(&self, ctx: &Ctx, name: &BlobName) -> Result<bool, Error> {
        ctx.check()?;
        Ok(self.backend.exists(name))
    }

    fn delete(&self, ctx: &Ctx, name: &BlobName) -> Result<(), Error> {
        ctx.check()?;
        self.backend.delete(name)
    }
}

/// Copies every byte written through it into an in-memory buffer while also
/// forwarding to the wrapped writer, so an incoming dynamic-link update can
/// be parsed after a single streaming pass.
struct TeeWriter<'a> {
    inner: &'a mut dyn blobmesh_backend::BlobWriter,
    buf: Vec<u8>,
}

impl Write for TeeWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.buf.extend_from_slice(&buf[..n]);
        Ok(n)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobmesh_backend::MemoryBackend;
    use blobmesh_core::AuthInfo;
    use blobmesh_link::Publisher;
    use sha2::{Digest as _, Sha256};

    fn ctx() -> Ctx {
        Ctx::background()
    }

    #[test]
    fn static_round_trip_via_facade() {
        let ds = DS::new(Box::new(MemoryBackend::new()));
        let payload = b"hello static".to_vec();
        let digest = Sha256::digest(&payload);
        let name = BlobName::new(&digest, BlobType::Static).unwrap();

        ds.update(&ctx(), &name, &mut Cursor::new(payload.clone())).unwrap();
        assert!(ds.exists(&ctx(), &name).unwrap());

        let mut out = Vec::new();
        ds.open(&ctx(), &name).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn static_update_with_wrong_name_is_rejected_and_not_stored() {
        let ds = DS::new(Box::new(MemoryBackend::new()));
        let wrong_digest = Sha256::digest(b"other content");
        let name = BlobName::new(&wrong_digest, BlobType::Static).unwrap();

        let err = ds.update(&ctx(), &name, &mut Cursor::new(b"hello".to_vec())).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
        assert!(!ds.exists(&ctx(), &name).unwrap());
    }

    #[test]
    fn dynamic_link_update_keeps_only_the_winner() {
        let ds = DS::new(Box::new(MemoryBackend::new()));
        let publisher = Publisher::from_auth_info(&AuthInfo::new([3u8; 32], 7));
        let name = publisher.blob_name();

        let (low, _) = publisher.update_link_data(&b"v1"[..], 1).unwrap();
        let (high, _) = publisher.update_link_data(&b"v2"[..], 2).unwrap();

        let mut low_bytes = Vec::new();
        low.get_public_data_reader().read_to_end(&mut low_bytes).unwrap();
        let mut high_bytes = Vec::new();
        high.get_public_data_reader().read_to_end(&mut high_bytes).unwrap();

        ds.update(&ctx(), &name, &mut Cursor::new(high_bytes.clone())).unwrap();
        // Stale update must be rejected, not clobber the winner.
        ds.update(&ctx(), &name, &mut Cursor::new(low_bytes)).unwrap();

        let mut stored = Vec::new();
        ds.open(&ctx(), &name).unwrap().read_to_end(&mut stored).unwrap();
        assert_eq!(stored, high_bytes);
    }
}
