//! Length-prefixed field framing shared by the dynamic-link wire format.
//!
//! Fixed-size fields are big-endian. Dynamic-size buffers are prefixed by a
//! single length byte that must be `< 0x80`. Reads fail with
//! [`ValidationError::DynamicLinkTruncated`] on early EOF and with
//! [`ValidationError::DynamicLinkBlockSize`] when a length byte is `>= 0x80`.
//! Writes are infallible by contract (writing into an in-memory buffer or
//! hasher cannot short-write); a write-side I/O failure is a caller bug, not
//! a runtime error this module models.

use std::io::Read;

use crate::error::{Error, ValidationError};

/// A length-prefixed block's length byte must be strictly less than this.
pub const MAX_BLOCK_LEN: u8 = 0x80;

fn truncated() -> Error {
    Error::ValidationFailed(ValidationError::DynamicLinkTruncated)
}

/// Read exactly `buf.len()` bytes, mapping EOF to `DynamicLinkTruncated`.
pub fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> Result<(), Error> {
    r.read_exact(buf).map_err(|_| truncated())
}

/// Read one byte.
pub fn read_u8(r: &mut impl Read) -> Result<u8, Error> {
    let mut b = [0u8; 1];
    read_exact(r, &mut b)?;
    Ok(b[0])
}

/// Read a big-endian `u64`.
pub fn read_u64_be(r: &mut impl Read) -> Result<u64, Error> {
    let mut b = [0u8; 8];
    read_exact(r, &mut b)?;
    Ok(u64::from_be_bytes(b))
}

/// Read a length-prefixed buffer: one length byte (`< 0x80`) followed by
/// that many bytes.
pub fn read_len_prefixed(r: &mut impl Read) -> Result<Vec<u8>, Error> {
    let len = read_u8(r)?;
    if len >= MAX_BLOCK_LEN {
        return Err(Error::ValidationFailed(ValidationError::DynamicLinkBlockSize));
    }
    let mut buf = vec![0u8; len as usize];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

/// Read the remainder of a stream into a buffer (used for the trailing
/// ciphertext field of a dynamic-link record, whose length is implicit).
pub fn read_to_end(r: &mut impl Read) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf).map_err(Error::Io)?;
    Ok(buf)
}

/// Write a big-endian `u64`. Infallible by contract (see module docs).
pub fn write_u64_be(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Write a length-prefixed buffer. `buf.len()` must be `< 0x80`; this is a
/// programming error in this crate if violated, since every caller builds
/// fixed-size KVBs and IVs that never approach the bound, so it panics
/// rather than returning a `Result` (matching the infallible-write contract).
pub fn write_len_prefixed(out: &mut Vec<u8>, buf: &[u8]) {
    assert!(buf.len() < MAX_BLOCK_LEN as usize, "length-prefixed block too large");
    out.push(buf.len() as u8);
    out.extend_from_slice(buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_truncated_fixed_field() {
        let mut c = Cursor::new(vec![0u8; 3]);
        let err = read_u64_be(&mut c).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(ValidationError::DynamicLinkTruncated)));
    }

    #[test]
    fn rejects_oversized_length_prefix() {
        let mut c = Cursor::new(vec![0x80u8]);
        let err = read_len_prefixed(&mut c).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(ValidationError::DynamicLinkBlockSize)));
    }

    #[test]
    fn round_trips_length_prefixed_block() {
        let mut out = Vec::new();
        write_len_prefixed(&mut out, b"hello");
        let mut c = Cursor::new(out);
        let back = read_len_prefixed(&mut c).unwrap();
        assert_eq!(back, b"hello");
    }
}
