//! Opaque key, IV, and auth-info value types.

use subtle::ConstantTimeEq;

use crate::error::Error;

const KEY_RESERVED_BYTE: u8 = 0x00;
const KEY_LEN: usize = 33; // 1 reserved + 32-byte XChaCha20 key
const IV_LEN: usize = 24; // XChaCha20 nonce length

/// Opaque key bytes. For stream encryption: byte 0 is a reserved key-type
/// byte (must be `0`), bytes 1..33 are a 32-byte XChaCha20 key.
#[derive(Clone)]
pub struct BlobKey(Vec<u8>);

impl std::fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BlobKey").field(&"[REDACTED]").finish()
    }
}

impl BlobKey {
    /// Wrap raw key bytes without validating them (validation happens in the
    /// cipher factory, which needs to distinguish the three failure kinds).
    #[must_use]
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Build a well-formed key from a 32-byte XChaCha20 key, prefixing the
    /// reserved byte.
    #[must_use]
    pub fn from_chacha_key(key: [u8; 32]) -> Self {
        let mut bytes = Vec::with_capacity(KEY_LEN);
        bytes.push(KEY_RESERVED_BYTE);
        bytes.extend_from_slice(&key);
        Self(bytes)
    }

    /// Raw bytes, including the reserved leading byte.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The 32-byte XChaCha20 key. Callers must validate length and reserved
    /// byte first (the cipher factory does this before ever calling it).
    pub(crate) fn chacha_key_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[1..KEY_LEN]);
        out
    }
}

impl PartialEq for BlobKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}
impl Eq for BlobKey {}

/// Opaque IV bytes; for XChaCha20 exactly 24 bytes.
#[derive(Clone, Debug)]
pub struct BlobIV(Vec<u8>);

impl BlobIV {
    /// Wrap raw IV bytes.
    #[must_use]
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Build from a 24-byte XChaCha20 nonce.
    #[must_use]
    pub fn from_chacha_iv(iv: [u8; 24]) -> Self {
        Self(iv.to_vec())
    }

    /// Raw IV bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn chacha_iv_bytes(&self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out.copy_from_slice(&self.0[..IV_LEN]);
        out
    }
}

impl PartialEq for BlobIV {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}
impl Eq for BlobIV {}

/// Opaque bytes granting write authority to a dynamic link: a reserved byte,
/// a 32-byte Ed25519 seed, and an 8-byte big-endian nonce.
#[derive(Clone)]
pub struct AuthInfo {
    seed: [u8; 32],
    nonce: u64,
}

impl AuthInfo {
    /// Build directly from a seed and nonce.
    #[must_use]
    pub fn new(seed: [u8; 32], nonce: u64) -> Self {
        Self { seed, nonce }
    }

    /// Parse from the wire form `[reserved=0][seed(32)][nonce u64 be]`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 1 + 32 + 8 {
            return Err(Error::InvalidAuthInfo("wrong length"));
        }
        if bytes[0] != 0 {
            return Err(Error::InvalidAuthInfo("reserved byte must be zero"));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[1..33]);
        let mut nonce_bytes = [0u8; 8];
        nonce_bytes.copy_from_slice(&bytes[33..41]);
        Ok(Self { seed, nonce: u64::from_be_bytes(nonce_bytes) })
    }

    /// Serialize to the wire form `[0x00][seed(32)][nonce u64 be]`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(41);
        out.push(0u8);
        out.extend_from_slice(&self.seed);
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out
    }

    /// The Ed25519 private key seed.
    #[must_use]
    pub fn seed(&self) -> [u8; 32] {
        self.seed
    }

    /// The current nonce.
    #[must_use]
    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_equality_is_constant_time_and_correct() {
        let a = BlobKey::from_chacha_key([1u8; 32]);
        let b = BlobKey::from_chacha_key([1u8; 32]);
        let c = BlobKey::from_chacha_key([2u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn auth_info_round_trips() {
        let info = AuthInfo::new([7u8; 32], 42);
        let bytes = info.to_bytes();
        let back = AuthInfo::from_bytes(&bytes).unwrap();
        assert_eq!(back.seed(), [7u8; 32]);
        assert_eq!(back.nonce(), 42);
    }

    #[test]
    fn auth_info_rejects_bad_reserved_byte() {
        let mut bytes = AuthInfo::new([0u8; 32], 0).to_bytes();
        bytes[0] = 1;
        assert!(AuthInfo::from_bytes(&bytes).is_err());
    }

    #[test]
    fn auth_info_rejects_wrong_length() {
        assert!(AuthInfo::from_bytes(&[0u8; 10]).is_err());
    }
}
