//! Derived readers over a parsed [`PublicRecord`]: the raw public form (for
//! propagation), the encrypted payload, and — given the key — the
//! decrypted, key/IV-validated plaintext.

use std::cell::Cell;
use std::io::{self, Cursor, Read};

use blobmesh_core::{
    apply_keystream, into_io_error, read_len_prefixed, BlobIV, BlobKey, BlobName, BlobType, Error,
    IvGenerator, KeyGenerator, ValidationError,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::record::PublicRecord;
use crate::wire::kvb_signature_message;

/// A reader that is good for exactly one call; a second call is a
/// programming error against the protocol's single-use contract, so it
/// panics rather than silently returning a degenerate empty reader.
struct OnceGuard {
    used: Cell<bool>,
    what: &'static str,
}

impl OnceGuard {
    fn new(what: &'static str) -> Self {
        Self { used: Cell::new(false), what }
    }
    fn take(&self) {
        assert!(!self.used.replace(true), "{} called more than once", self.what);
    }
}

/// Exposes the three derived streams over a [`PublicRecord`].
pub struct PublicReader {
    record: PublicRecord,
    public_guard: OnceGuard,
    encrypted_guard: OnceGuard,
}

impl PublicReader {
    /// Wrap a parsed record.
    #[must_use]
    pub fn new(record: PublicRecord) -> Self {
        Self {
            record,
            public_guard: OnceGuard::new("get_public_data_reader"),
            encrypted_guard: OnceGuard::new("get_encrypted_link_reader"),
        }
    }

    /// Parse a public record from a stream against the expected blob name.
    pub fn parse(blob_name: &BlobName, r: impl Read) -> Result<Self, Error> {
        Ok(Self::new(PublicRecord::parse(blob_name, r)?))
    }

    /// The blob name this record publishes under.
    #[must_use]
    pub fn blob_name(&self) -> &BlobName {
        self.record.blob_name()
    }

    /// The record's version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.record.version()
    }

    /// Winner comparison, delegating to [`PublicRecord::greater_than`].
    #[must_use]
    pub fn greater_than(&self, other: &PublicReader) -> bool {
        self.record.greater_than(&other.record)
    }

    /// Re-emit the full public record, unverified, for propagation to
    /// another datastore. Single-use.
    pub fn get_public_data_reader(&self) -> impl Read {
        self.public_guard.take();
        Cursor::new(self.record.to_public_bytes())
    }

    /// Emit the encrypted payload bytes only, verifying the outer signature
    /// up front and surfacing a mismatch as an `io::Error` on the first
    /// read call rather than at construction, so a caller who never reads
    /// this stream never pays for verification. Single-use.
    pub fn get_encrypted_link_reader(&self) -> impl Read {
        self.encrypted_guard.take();
        let verify_err = self.record.verify_outer_signature().err();
        DeferredErrorReader { data: Cursor::new(self.record.encrypted_link.clone()), err: verify_err }
    }

    /// Decrypt with `key`, validate the key-validation block against the
    /// embedded public key, verify the regenerated IV matches the record,
    /// and emit the user-visible plaintext (KVB prefix stripped).
    pub fn get_link_data_reader(&self, key: &BlobKey) -> Result<impl Read, Error> {
        let plaintext = decrypt_and_validate(&self.record, key)?;
        Ok(Cursor::new(plaintext))
    }
}

/// A reader that fails on its first `read()` if `err` is set, otherwise
/// streams `data` through untouched.
struct DeferredErrorReader {
    data: Cursor<Vec<u8>>,
    err: Option<Error>,
}

impl Read for DeferredErrorReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = &self.err {
            return Err(into_io_error(err));
        }
        self.data.read(buf)
    }
}

/// Shared decrypt/validate path used by [`PublicReader::get_link_data_reader`].
fn decrypt_and_validate(record: &PublicRecord, key: &BlobKey) -> Result<Vec<u8>, Error> {
    let mut framed = record.encrypted_link.clone();
    apply_keystream(key, &record.iv, &mut framed)?;

    let mut cursor = Cursor::new(&framed);
    let kvb = read_len_prefixed(&mut cursor)?;
    if kvb.is_empty() || kvb[0] != 0 {
        return Err(Error::ValidationFailed(ValidationError::DynamicLinkKeyValidationBlockReserved));
    }
    if kvb.len() != 65 {
        return Err(Error::ValidationFailed(ValidationError::DynamicLinkKeyValidationBlockSignature));
    }
    let mut kvb_sig_bytes = [0u8; 64];
    kvb_sig_bytes.copy_from_slice(&kvb[1..65]);

    let verifying_key = VerifyingKey::from_bytes(&record.pub_key)
        .map_err(|_| Error::ValidationFailed(ValidationError::DynamicLinkKeyValidationBlockSignature))?;
    let kvb_signature = Signature::from_bytes(&kvb_sig_bytes);
    let kvb_msg = kvb_signature_message(&record.blob_name);
    verifying_key
        .verify(&kvb_msg, &kvb_signature)
        .map_err(|_| Error::ValidationFailed(ValidationError::DynamicLinkKeyValidationBlockSignature))?;

    let derived_key = KeyGenerator::new(BlobType::DynamicLink).update(&kvb_sig_bytes).generate();
    if &derived_key != key {
        return Err(Error::ValidationFailed(ValidationError::DynamicLinkKeyMismatch));
    }

    let consumed = cursor.position() as usize;
    let user_payload = framed[consumed..].to_vec();

    let expected_iv: BlobIV = IvGenerator::new(BlobType::DynamicLink)
        .update(record.blob_name.as_bytes())
        .update(&record.version.to_be_bytes())
        .update(&framed)
        .generate();
    if expected_iv != record.iv {
        return Err(Error::ValidationFailed(ValidationError::DynamicLinkIVMismatch));
    }

    Ok(user_payload)
}
