//! Parsing and representation of the dynamic-link public wire record.

use std::io::Read;

use blobmesh_core::{
    read_exact, read_len_prefixed, read_to_end, read_u64_be, read_u8, BlobIV, BlobName, Error,
    ValidationError,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::wire::{compute_blob_name, outer_signature_hash};

/// A parsed, structurally valid dynamic-link public record.
///
/// `PublicRecord` does not verify the outer signature at parse time — that
/// check is deferred to [`crate::reader::PublicReader::get_encrypted_link_reader`]
/// so the parse step itself stays a single linear pass over the stream.
#[derive(Clone)]
pub struct PublicRecord {
    pub(crate) blob_name: BlobName,
    pub(crate) pub_key: [u8; 32],
    pub(crate) nonce: u64,
    pub(crate) version: u64,
    pub(crate) sig: [u8; 64],
    pub(crate) iv: BlobIV,
    pub(crate) encrypted_link: Vec<u8>,
}

impl PublicRecord {
    /// Parse the public record from a stream, checking it against the
    /// expected `blob_name` as soon as the public key and nonce are known.
    ///
    /// Parse order: reserved byte, public key (32B), nonce (u64 BE) followed
    /// immediately by the blob-name check, version (u64 BE), signature
    /// (64B), length-prefixed IV, then the remainder as ciphertext.
    pub fn parse(blob_name: &BlobName, mut r: impl Read) -> Result<Self, Error> {
        let reserved = read_u8(&mut r)?;
        if reserved != 0 {
            return Err(Error::ValidationFailed(ValidationError::DynamicLinkReservedByte));
        }
        let mut pub_key = [0u8; 32];
        read_exact(&mut r, &mut pub_key)?;
        let nonce = read_u64_be(&mut r)?;

        let expected_name = compute_blob_name(&pub_key, nonce);
        if &expected_name != blob_name {
            return Err(Error::ValidationFailed(ValidationError::DynamicLinkBlobName));
        }

        let version = read_u64_be(&mut r)?;
        let mut sig = [0u8; 64];
        read_exact(&mut r, &mut sig)?;
        let iv_bytes = read_len_prefixed(&mut r)?;
        let encrypted_link = read_to_end(&mut r)?;

        Ok(Self {
            blob_name: blob_name.clone(),
            pub_key,
            nonce,
            version,
            sig,
            iv: BlobIV::from_raw(iv_bytes),
            encrypted_link,
        })
    }

    /// The blob name this record was parsed against (and publishes under).
    #[must_use]
    pub fn blob_name(&self) -> &BlobName {
        &self.blob_name
    }

    /// The record's version counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The record's signature bytes.
    #[must_use]
    pub fn signature(&self) -> [u8; 64] {
        self.sig
    }

    /// Verify the outer Ed25519 signature over the record.
    pub(crate) fn verify_outer_signature(&self) -> Result<(), Error> {
        let verifying_key = VerifyingKey::from_bytes(&self.pub_key)
            .map_err(|_| Error::ValidationFailed(ValidationError::DynamicLinkSignature))?;
        let hash = outer_signature_hash(
            &self.blob_name,
            self.version,
            self.iv.as_bytes(),
            &self.encrypted_link,
        );
        let signature = Signature::from_bytes(&self.sig);
        verifying_key
            .verify(&hash, &signature)
            .map_err(|_| Error::ValidationFailed(ValidationError::DynamicLinkSignature))
    }

    /// Serialize the full public record back to its wire form, for
    /// propagation to another datastore.
    #[must_use]
    pub fn to_public_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(0u8);
        out.extend_from_slice(&self.pub_key);
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.sig);
        blobmesh_core::write_len_prefixed(&mut out, self.iv.as_bytes());
        out.extend_from_slice(&self.encrypted_link);
        out
    }

    /// Winner comparison: `self > other` iff `(version, SHA256(sig))` is
    /// lexicographically greater. Requires both records share a blob name.
    #[must_use]
    pub fn greater_than(&self, other: &Self) -> bool {
        if self.version != other.version {
            return self.version > other.version;
        }
        let a = Sha256::digest(self.sig);
        let b = Sha256::digest(other.sig);
        a.as_slice() > b.as_slice()
    }
}
