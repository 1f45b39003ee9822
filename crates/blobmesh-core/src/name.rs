//! Blob identity: the [`BlobType`] tag and the self-describing [`BlobName`].

use crate::error::Error;
use subtle::ConstantTimeEq;

/// A single byte tagging the blob family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobType {
    /// Immutable blob named by `SHA-256(payload)`.
    Static,
    /// Signed, versioned, mutable pointer.
    DynamicLink,
}

impl BlobType {
    /// Raw byte tagging this type on the wire.
    #[must_use]
    pub fn byte(self) -> u8 {
        match self {
            BlobType::Static => 0x01,
            BlobType::DynamicLink => 0x02,
        }
    }

    /// Resolve a raw type byte, if it is in the registered table.
    pub fn from_byte(b: u8) -> Result<Self, Error> {
        match b {
            0x01 => Ok(BlobType::Static),
            0x02 => Ok(BlobType::DynamicLink),
            other => Err(Error::UnknownBlobType(other)),
        }
    }
}

const MAX_NAME_LEN: usize = 127;
const MAX_HASH_LEN: usize = MAX_NAME_LEN - 1;

/// An opaque, self-describing blob name: a scrambled type byte followed by
/// the blob's hash bytes, where `scrambled_type = type_byte XOR xor(hash)`.
///
/// Equivalently, the XOR of every byte in a valid name equals the type byte
/// — see [`BlobName::blob_type`]. This means every byte of the name,
/// including the first, carries hash entropy; implementations must never
/// short-circuit on the leading byte alone.
#[derive(Debug, Clone, Eq)]
pub struct BlobName(Vec<u8>);

impl BlobName {
    /// Build a name from a hash and a type, validating hash length
    /// (1..=126 bytes) and computing the scrambled leading byte.
    pub fn new(hash: &[u8], ty: BlobType) -> Result<Self, Error> {
        if hash.is_empty() {
            return Err(Error::InvalidBlobName("hash must not be empty"));
        }
        if hash.len() > MAX_HASH_LEN {
            return Err(Error::InvalidBlobName("hash exceeds 126 bytes"));
        }
        let mut bytes = Vec::with_capacity(1 + hash.len());
        let folded = hash.iter().fold(0u8, |acc, b| acc ^ b);
        bytes.push(ty.byte() ^ folded);
        bytes.extend_from_slice(hash);
        Ok(Self(bytes))
    }

    /// Parse a name from its raw byte representation (defensive copy).
    ///
    /// Per the data model a well-formed name is 2..=127 bytes (a scrambled
    /// type byte plus at least one hash byte), but the parse operation only
    /// enforces the outer bound — a 1-byte sequence parses successfully and
    /// simply has an empty hash; [`BlobName::new`] is the constructor that
    /// refuses an empty hash.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() || bytes.len() > MAX_NAME_LEN {
            return Err(Error::InvalidBlobName("name length out of range"));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Parse a name from its base58 string form.
    pub fn from_string(s: &str) -> Result<Self, Error> {
        let raw = bs58::decode(s)
            .into_vec()
            .map_err(|_| Error::InvalidBlobName("not valid base58"))?;
        Self::from_bytes(&raw)
    }

    /// The raw bytes of the name, including the scrambled leading byte.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The hash portion of the name (bytes 1..).
    #[must_use]
    pub fn hash(&self) -> &[u8] {
        &self.0[1..]
    }

    /// Recover the type byte as the XOR of every byte in the name.
    pub fn blob_type(&self) -> Result<BlobType, Error> {
        let folded = self.0.iter().fold(0u8, |acc, b| acc ^ b);
        BlobType::from_byte(folded)
    }

    /// Base58 (Bitcoin alphabet) string form of the raw name bytes.
    #[must_use]
    pub fn to_string_form(&self) -> String {
        bs58::encode(&self.0).into_string()
    }
}

impl PartialEq for BlobName {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::fmt::Display for BlobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_form())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn construct_from_single_byte_hash() {
        let name = BlobName::new(&[0x01], BlobType::Static).unwrap();
        assert_eq!(name.as_bytes(), &[0x00, 0x01]);
    }

    #[test]
    fn empty_hash_rejected() {
        assert!(BlobName::new(&[], BlobType::Static).is_err());
    }

    #[test]
    fn oversized_hash_rejected() {
        let hash = vec![0u8; MAX_HASH_LEN + 1];
        assert!(BlobName::new(&hash, BlobType::Static).is_err());
    }

    #[test]
    fn parse_rejects_empty_and_oversized() {
        assert!(BlobName::from_bytes(&[]).is_err());
        assert!(BlobName::from_bytes(&vec![0u8; MAX_NAME_LEN + 1]).is_err());
    }

    #[test]
    fn round_trip_string_form() {
        let name = BlobName::new(b"hello-hash", BlobType::DynamicLink).unwrap();
        let s = name.to_string_form();
        let back = BlobName::from_string(&s).unwrap();
        assert_eq!(name, back);
    }

    proptest! {
        #[test]
        fn name_round_trip_and_xor_invariant(
            hash in proptest::collection::vec(any::<u8>(), 1..=MAX_HASH_LEN),
            ty_bit in any::<bool>(),
        ) {
            let ty = if ty_bit { BlobType::Static } else { BlobType::DynamicLink };
            let name = BlobName::new(&hash, ty).unwrap();

            let folded = name.as_bytes().iter().fold(0u8, |acc, b| acc ^ b);
            prop_assert_eq!(folded, ty.byte());

            let round = BlobName::from_string(&name.to_string_form()).unwrap();
            prop_assert_eq!(round.blob_type().unwrap(), ty);
            prop_assert_eq!(round.hash(), hash.as_slice());
        }
    }
}
