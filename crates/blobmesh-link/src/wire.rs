//! Shared wire-format helpers used by both the reader and the publisher:
//! blob-name derivation from `(pub_key, nonce)`, and the byte layouts fed to
//! the outer signature and the key-validation-block signature.

use blobmesh_core::{write_len_prefixed, write_u64_be, BlobName, BlobType};
use sha2::{Digest, Sha256};

/// Derive the blob name for a dynamic link from its public key and nonce.
/// The name is content-independent by design (glossary: "name derives from
/// the signer's public key and nonce, not from content").
pub fn compute_blob_name(pub_key: &[u8; 32], nonce: u64) -> BlobName {
    let mut hasher = Sha256::new();
    hasher.update(pub_key);
    hasher.update(nonce.to_be_bytes());
    let digest = hasher.finalize();
    BlobName::new(&digest, BlobType::DynamicLink).expect("sha256 digest is a valid hash length")
}

/// Message signed by the outer record signature:
/// `[0x00 || len(blob_name) || blob_name || version(u64 be) || len(iv) || iv || encrypted_link]`.
pub fn outer_signature_message(
    blob_name: &BlobName,
    version: u64,
    iv: &[u8],
    encrypted_link: &[u8],
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(1 + 1 + blob_name.as_bytes().len() + 8 + 1 + iv.len() + encrypted_link.len());
    msg.push(0u8);
    write_len_prefixed(&mut msg, blob_name.as_bytes());
    write_u64_be(&mut msg, version);
    write_len_prefixed(&mut msg, iv);
    msg.extend_from_slice(encrypted_link);
    msg
}

/// The hash actually signed/verified for the outer record signature.
pub fn outer_signature_hash(
    blob_name: &BlobName,
    version: u64,
    iv: &[u8],
    encrypted_link: &[u8],
) -> [u8; 32] {
    let msg = outer_signature_message(blob_name, version, iv, encrypted_link);
    let digest = Sha256::digest(msg);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Message signed by the key-validation-block signature: `[0x01 || blob_name]`.
pub fn kvb_signature_message(blob_name: &BlobName) -> Vec<u8> {
    let mut msg = Vec::with_capacity(1 + blob_name.as_bytes().len());
    msg.push(0x01u8);
    msg.extend_from_slice(blob_name.as_bytes());
    msg
}
