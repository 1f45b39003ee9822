//! Error taxonomy shared across the blob store core crates.

/// Subkinds of [`Error::ValidationFailed`] produced while parsing or
/// verifying a dynamic-link record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A static blob's SHA-256 hash does not equal its name's hash bytes.
    #[error("static blob hash does not match its name")]
    StaticHashMismatch,
    /// The underlying stream EOF'd before a fixed-size or length-prefixed field finished.
    #[error("dynamic link data truncated")]
    DynamicLinkTruncated,
    /// A reserved byte that must be zero was not.
    #[error("dynamic link reserved byte is non-zero")]
    DynamicLinkReservedByte,
    /// A length-prefixed block's length byte was `>= 0x80`.
    #[error("dynamic link length-prefixed block size is out of range")]
    DynamicLinkBlockSize,
    /// The blob name computed from the record's public key does not match the requested name.
    #[error("dynamic link blob name does not match the record")]
    DynamicLinkBlobName,
    /// The outer Ed25519 signature over the record does not verify.
    #[error("dynamic link signature does not verify")]
    DynamicLinkSignature,
    /// The key-validation block's reserved byte was non-zero.
    #[error("dynamic link key validation block reserved byte is non-zero")]
    DynamicLinkKeyValidationBlockReserved,
    /// The key-validation block's embedded signature does not verify.
    #[error("dynamic link key validation block signature does not verify")]
    DynamicLinkKeyValidationBlockSignature,
    /// The caller-supplied key does not match the one derived from the key-validation block.
    #[error("dynamic link key does not match the key validation block")]
    DynamicLinkKeyMismatch,
    /// The IV regenerated from the plaintext does not match the record's IV.
    #[error("dynamic link iv does not match the regenerated iv")]
    DynamicLinkIVMismatch,
}

/// Subkinds of [`Error::InvalidEncryptionConfig`] rejected by the cipher factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncryptionConfigError {
    /// The key's reserved type byte was missing or non-zero.
    #[error("invalid key type")]
    KeyType,
    /// The key was not exactly 33 bytes (1 reserved + 32 key bytes).
    #[error("invalid key size")]
    KeySize,
    /// The IV was not exactly 24 bytes.
    #[error("invalid iv size")]
    IVSize,
}

/// The full error taxonomy surfaced by the blob store core, by kind rather than type name.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The blob is absent from the backend.
    #[error("blob not found")]
    NotFound,
    /// A writer for this blob name is already open on the same backend.
    #[error("upload already in progress for this blob name")]
    UploadInProgress,
    /// A blob name's length or structure falls outside the bounds in the data model.
    #[error("invalid blob name: {0}")]
    InvalidBlobName(&'static str),
    /// The leading type byte of a blob name is not in the registered type table.
    #[error("unknown blob type: {0:#04x}")]
    UnknownBlobType(u8),
    /// Static hash mismatch, or any dynamic-link validation subkind.
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
    /// Auth-info bytes are malformed (wrong length or non-zero reserved byte).
    #[error("invalid auth info: {0}")]
    InvalidAuthInfo(&'static str),
    /// A cipher input (key type/size, IV size) was rejected by the cipher factory.
    #[error("invalid encryption config: {0}")]
    InvalidEncryptionConfig(#[from] EncryptionConfigError),
    /// An HTTP backend's transport or status-code mapping failed.
    #[error("connection error: {0}")]
    ConnectionError(String),
    /// A local I/O failure (disk backends) or a cancelled context.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True if this error is [`Error::NotFound`] — the one kind callers must
    /// always be able to distinguish from every other failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Wraps an [`Error`] as an [`std::io::Error`] so it can be surfaced from a
/// `Read::read` implementation that must defer a validation failure to
/// end-of-stream (the static blob reader and the dynamic-link readers both
/// need this: the contract requires bytes to flow before a mismatch is known).
pub fn into_io_error(err: &Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())
}
