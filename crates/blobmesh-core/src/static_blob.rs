//! Static blob validation: SHA-256 hash-equals-name, enforced while
//! streaming rather than after buffering the whole payload.

use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};

use crate::error::{into_io_error, Error, ValidationError};
use crate::name::BlobName;

/// Wraps a reader of static blob payload bytes and verifies, at
/// end-of-stream, that `SHA-256(payload) == name.hash()`. The hash is over
/// raw payload bytes only — no framing.
///
/// The final `read()` call (the one that observes EOF from the inner
/// reader) returns [`Error::ValidationFailed`] wrapped as an `io::Error` if
/// the digest disagrees; every prior call streams bytes through normally.
pub struct ValidatingReader<R> {
    inner: R,
    hasher: Sha256,
    expected_hash: Vec<u8>,
    done: bool,
}

impl<R: Read> ValidatingReader<R> {
    /// Wrap `inner`, validating its bytes against `name`'s hash.
    #[must_use]
    pub fn new(name: &BlobName, inner: R) -> Self {
        Self { inner, hasher: Sha256::new(), expected_hash: name.hash().to_vec(), done: false }
    }
}

impl<R: Read> Read for ValidatingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.done = true;
            let digest = self.hasher.clone().finalize();
            if digest.as_slice() != self.expected_hash.as_slice() {
                return Err(into_io_error(&Error::ValidationFailed(
                    ValidationError::StaticHashMismatch,
                )));
            }
            return Ok(0);
        }
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Stream `input` into `output` while feeding a SHA-256 hasher, verifying at
/// end-of-input that the digest equals `name`'s hash. On mismatch, `output`
/// is left with whatever partial bytes were already written — callers using
/// a cancel-capable writer (see `blobmesh-backend::BlobWriter`) must call
/// `cancel()` on this error so no partial blob is ever visible.
pub fn write_validated(
    name: &BlobName,
    mut input: impl Read,
    mut output: impl Write,
) -> Result<(), Error> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = input.read(&mut buf).map_err(Error::Io)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        output.write_all(&buf[..n]).map_err(Error::Io)?;
    }
    let digest = hasher.finalize();
    if digest.as_slice() != name.hash() {
        return Err(Error::ValidationFailed(ValidationError::StaticHashMismatch));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::BlobType;
    use std::io::{Cursor, Read as _};

    fn name_for(payload: &[u8]) -> BlobName {
        let digest = Sha256::digest(payload);
        BlobName::new(&digest, BlobType::Static).unwrap()
    }

    #[test]
    fn reads_back_matching_payload() {
        let payload = b"Test".to_vec();
        let name = name_for(&payload);
        assert_eq!(name.to_string_form(), "KDc2ijtWc9mGxb5hP29YSBgkMLH8wCWnVimpvP3M6jdAk");
        let mut reader = ValidatingReader::new(&name, Cursor::new(payload.clone()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn tampered_stored_bytes_fail_validation() {
        // Same scenario as `reads_back_matching_payload`, but the backend's
        // stored bytes have a trailing NUL appended.
        let payload = b"Test".to_vec();
        let name = name_for(&payload);
        let mut stored = payload;
        stored.push(0u8);
        let mut reader = ValidatingReader::new(&name, Cursor::new(stored));
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn single_bit_flip_fails_read() {
        let payload = b"Test".to_vec();
        let name = name_for(&payload);
        let mut tampered = payload.clone();
        tampered.push(0u8);
        let mut reader = ValidatingReader::new(&name, Cursor::new(tampered));
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn write_validated_accepts_matching_payload() {
        let payload = b"hello".to_vec();
        let name = name_for(&payload);
        let mut out = Vec::new();
        write_validated(&name, Cursor::new(payload.clone()), &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn write_validated_rejects_mismatched_payload() {
        let name = name_for(b"hello");
        let mut out = Vec::new();
        let err = write_validated(&name, Cursor::new(b"goodbye".to_vec()), &mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::ValidationFailed(ValidationError::StaticHashMismatch)
        ));
    }

    #[test]
    fn empty_payload_round_trips() {
        let payload: Vec<u8> = Vec::new();
        let name = name_for(&payload);
        assert_eq!(name.to_string_form(), "2GLoj4Bk7SvjQngCT85gxWRu2DXCCjs9XWKsSpM85Wq3Ve");
        let mut reader = ValidatingReader::new(&name, Cursor::new(payload.clone()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }
}
