//! Publisher: signs, encrypts, and builds dynamic-link update records.

use std::io::Read;

use blobmesh_core::{
    apply_keystream, write_len_prefixed, AuthInfo, BlobIV, BlobKey, BlobName, BlobType, Error,
    IvGenerator, KeyGenerator,
};
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand_core::RngCore;
use sha2::{Digest, Sha256};

use crate::reader::PublicReader;
use crate::record::PublicRecord;
use crate::wire::{compute_blob_name, kvb_signature_message, outer_signature_message};

/// Holds the writer-authority key pair and nonce for a dynamic link, and
/// builds new versioned, encrypted records. A publisher carries no state
/// between updates besides its key pair and nonce.
pub struct Publisher {
    signing_key: SigningKey,
    nonce: u64,
}

impl Publisher {
    /// Draw a fresh Ed25519 key pair and nonce from `rng`.
    pub fn create(rng: &mut impl RngCore) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let mut nonce_bytes = [0u8; 8];
        rng.fill_bytes(&mut nonce_bytes);
        Self { signing_key: SigningKey::from_bytes(&seed), nonce: u64::from_be_bytes(nonce_bytes) }
    }

    /// Reconstruct a publisher from previously-issued [`AuthInfo`].
    #[must_use]
    pub fn from_auth_info(info: &AuthInfo) -> Self {
        Self { signing_key: SigningKey::from_bytes(&info.seed()), nonce: info.nonce() }
    }

    /// Preserve the key pair but draw a fresh nonce (and therefore a new
    /// blob name — the prior link is abandoned).
    #[must_use]
    pub fn re_nonce(&self, rng: &mut impl RngCore) -> Self {
        let mut nonce_bytes = [0u8; 8];
        rng.fill_bytes(&mut nonce_bytes);
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
            nonce: u64::from_be_bytes(nonce_bytes),
        }
    }

    /// Serialize this publisher's writer authority to the wire form of
    /// [`AuthInfo`] (`[0x00 || seed(32) || nonce u64 be]`).
    #[must_use]
    pub fn auth_info(&self) -> AuthInfo {
        AuthInfo::new(self.signing_key.to_bytes(), self.nonce)
    }

    /// The blob name this publisher's links publish under.
    #[must_use]
    pub fn blob_name(&self) -> BlobName {
        compute_blob_name(&self.signing_key.verifying_key().to_bytes(), self.nonce)
    }

    /// Build a new signed, encrypted record carrying `plaintext` at
    /// `version`, returning a [`PublicReader`] over it and the derived
    /// [`BlobKey`] a holder needs to decrypt it.
    pub fn update_link_data(
        &self,
        mut plaintext: impl Read,
        version: u64,
    ) -> Result<(PublicReader, BlobKey), Error> {
        let blob_name = self.blob_name();

        let kvb_msg = kvb_signature_message(&blob_name);
        let kvb_sig: Signature = self.signing_key.sign(&kvb_msg);
        let kvb_sig_bytes = kvb_sig.to_bytes();
        let key = KeyGenerator::new(BlobType::DynamicLink).update(&kvb_sig_bytes).generate();

        let mut framed = Vec::new();
        let mut kvb = Vec::with_capacity(65);
        kvb.push(0u8);
        kvb.extend_from_slice(&kvb_sig_bytes);
        write_len_prefixed(&mut framed, &kvb);
        plaintext.read_to_end(&mut framed).map_err(Error::Io)?;

        let iv: BlobIV = IvGenerator::new(BlobType::DynamicLink)
            .update(blob_name.as_bytes())
            .update(&version.to_be_bytes())
            .update(&framed)
            .generate();

        let mut ciphertext = framed;
        apply_keystream(&key, &iv, &mut ciphertext)?;

        let sig_msg = outer_signature_message(&blob_name, version, iv.as_bytes(), &ciphertext);
        let hash = Sha256::digest(sig_msg);
        let outer_sig: Signature = self.signing_key.sign(&hash);

        let record = PublicRecord {
            blob_name,
            pub_key: self.signing_key.verifying_key().to_bytes(),
            nonce: self.nonce,
            version,
            sig: outer_sig.to_bytes(),
            iv,
            encrypted_link: ciphertext,
        };

        Ok((PublicReader::new(record), key))
    }
}
