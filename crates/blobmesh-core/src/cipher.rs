//! XChaCha20 stream cipher construction and deterministic key/IV generators.
//!
//! Key and IV generators are append-only SHA-256 hashers seeded with a
//! preamble that distinguishes key-hash (`0x01`), IV-hash (`0x02`), and
//! default-IV (`0x03`) derivations, so the same input fed to a key
//! generator and an IV generator produces independent outputs even though
//! keys and IVs are sometimes derived from overlapping data.

use chacha20::cipher::generic_array::GenericArray;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::XChaCha20;
use sha2::{Digest, Sha256};

use crate::error::{EncryptionConfigError, Error};
use crate::keys::{BlobIV, BlobKey};
use crate::name::BlobType;

const PREAMBLE_KEY_HASH: u8 = 0x01;
const PREAMBLE_IV_HASH: u8 = 0x02;
const PREAMBLE_DEFAULT_IV: u8 = 0x03;
const KEY_TYPE_RESERVED: u8 = 0x00;

/// Validate `(key, iv)` and construct an XChaCha20 cipher instance, in the
/// fail-fast order: key type byte, then key size, then IV size.
pub fn build_cipher(key: &BlobKey, iv: &BlobIV) -> Result<XChaCha20, Error> {
    let key_bytes = key.as_bytes();
    if key_bytes.is_empty() || key_bytes[0] != 0 {
        return Err(Error::InvalidEncryptionConfig(EncryptionConfigError::KeyType));
    }
    if key_bytes.len() != 33 {
        return Err(Error::InvalidEncryptionConfig(EncryptionConfigError::KeySize));
    }
    if iv.as_bytes().len() != 24 {
        return Err(Error::InvalidEncryptionConfig(EncryptionConfigError::IVSize));
    }
    let key_arr = key.chacha_key_bytes();
    let iv_arr = iv.chacha_iv_bytes();
    let key = GenericArray::from_slice(&key_arr);
    let iv = GenericArray::from_slice(&iv_arr);
    Ok(XChaCha20::new(key, iv))
}

/// Encrypt (or decrypt — XChaCha20 is symmetric) `data` in place with the
/// validated `(key, iv)` pair.
pub fn apply_keystream(key: &BlobKey, iv: &BlobIV, data: &mut [u8]) -> Result<(), Error> {
    let mut cipher = build_cipher(key, iv)?;
    cipher.apply_keystream(data);
    Ok(())
}

fn seeded_hasher(preamble: u8, blob_type: BlobType) -> Sha256 {
    let mut h = Sha256::new();
    h.update([preamble, KEY_TYPE_RESERVED, blob_type.byte()]);
    h
}

/// An append-only hasher that derives a [`BlobKey`] from arbitrary fed data,
/// seeded by the blob type so key-hash derivations never collide with
/// IV-hash derivations of the same input.
pub struct KeyGenerator {
    hasher: Sha256,
}

impl KeyGenerator {
    /// Start a new key generator for the given blob type.
    #[must_use]
    pub fn new(blob_type: BlobType) -> Self {
        Self { hasher: seeded_hasher(PREAMBLE_KEY_HASH, blob_type) }
    }

    /// Feed more data into the generator.
    #[must_use]
    pub fn update(mut self, data: &[u8]) -> Self {
        self.hasher.update(data);
        self
    }

    /// Finalize into a [`BlobKey`]: `[0x00 || first 32 bytes of SHA-256]`.
    #[must_use]
    pub fn generate(self) -> BlobKey {
        let digest = self.hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest[..32]);
        BlobKey::from_chacha_key(key)
    }
}

/// An append-only hasher that derives a [`BlobIV`] from arbitrary fed data.
pub struct IvGenerator {
    hasher: Sha256,
}

impl IvGenerator {
    /// Start a new IV generator for the given blob type.
    #[must_use]
    pub fn new(blob_type: BlobType) -> Self {
        Self { hasher: seeded_hasher(PREAMBLE_IV_HASH, blob_type) }
    }

    /// Feed more data into the generator.
    #[must_use]
    pub fn update(mut self, data: &[u8]) -> Self {
        self.hasher.update(data);
        self
    }

    /// Finalize into a [`BlobIV`]: the first 24 bytes of SHA-256.
    #[must_use]
    pub fn generate(self) -> BlobIV {
        let digest = self.hasher.finalize();
        let mut iv = [0u8; 24];
        iv.copy_from_slice(&digest[..24]);
        BlobIV::from_chacha_iv(iv)
    }
}

/// A fixed 24-byte IV derived from `[0x03, 0x00]` alone — the same value for
/// every key, since the preamble hash never mixes in `key`'s bytes. `key` is
/// accepted for API symmetry with the other generators but does not affect
/// the result.
#[must_use]
pub fn default_iv(_key: &BlobKey) -> BlobIV {
    let mut h = Sha256::new();
    h.update([PREAMBLE_DEFAULT_IV, KEY_TYPE_RESERVED]);
    let digest = h.finalize();
    let mut iv = [0u8; 24];
    iv.copy_from_slice(&digest[..24]);
    BlobIV::from_chacha_iv(iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_key_type_byte() {
        let key = BlobKey::from_raw(vec![1u8; 33]);
        let iv = BlobIV::from_raw(vec![0u8; 24]);
        let err = build_cipher(&key, &iv).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidEncryptionConfig(EncryptionConfigError::KeyType)
        ));
    }

    #[test]
    fn rejects_bad_key_size() {
        let key = BlobKey::from_raw(vec![0u8; 10]);
        let iv = BlobIV::from_raw(vec![0u8; 24]);
        let err = build_cipher(&key, &iv).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidEncryptionConfig(EncryptionConfigError::KeySize)
        ));
    }

    #[test]
    fn rejects_bad_iv_size() {
        let key = BlobKey::from_chacha_key([0u8; 32]);
        let iv = BlobIV::from_raw(vec![0u8; 10]);
        let err = build_cipher(&key, &iv).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidEncryptionConfig(EncryptionConfigError::IVSize)
        ));
    }

    #[test]
    fn key_and_iv_generators_diverge_on_same_input() {
        let kg = KeyGenerator::new(BlobType::DynamicLink).update(b"same-input");
        let key = kg.generate();

        let ig = IvGenerator::new(BlobType::DynamicLink).update(b"same-input");
        let iv = ig.generate();

        assert_ne!(key.as_bytes()[1..], iv.as_bytes()[..]);
    }

    #[test]
    fn default_iv_is_key_independent() {
        let a = default_iv(&BlobKey::from_chacha_key([1u8; 32]));
        let b = default_iv(&BlobKey::from_chacha_key([2u8; 32]));
        assert_eq!(a, b);
    }

    #[test]
    fn apply_keystream_round_trips() {
        let key = KeyGenerator::new(BlobType::Static).update(b"seed").generate();
        let iv = IvGenerator::new(BlobType::Static).update(b"seed").generate();
        let mut data = b"hello world".to_vec();
        let original = data.clone();
        apply_keystream(&key, &iv, &mut data).unwrap();
        assert_ne!(data, original);
        apply_keystream(&key, &iv, &mut data).unwrap();
        assert_eq!(data, original);
    }
}
