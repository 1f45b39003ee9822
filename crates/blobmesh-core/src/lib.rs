//! Blob identity, wire framing, and cipher primitives for the
//! content-addressed encrypted blob store core.
//!
//! This crate covers the hash-named static blob and key/IV-derivation
//! building blocks shared by the dynamic-link protocol (`blobmesh-link`),
//! the storage backends (`blobmesh-backend`), and the datastore façade
//! (`blobmesh-datastore`). It has no I/O beyond reading/writing the
//! `std::io::{Read, Write}` streams it is handed — no filesystem or
//! network access lives here.

#![warn(missing_docs)]

mod cipher;
mod ctx;
mod error;
mod framing;
mod keys;
mod name;
mod static_blob;

pub use cipher::{apply_keystream, build_cipher, default_iv, IvGenerator, KeyGenerator};
pub use ctx::{CancelHandle, Ctx};
pub use error::{into_io_error, EncryptionConfigError, Error, ValidationError};
pub use framing::{
    read_exact, read_len_prefixed, read_to_end, read_u64_be, read_u8, write_len_prefixed,
    write_u64_be, MAX_BLOCK_LEN,
};
pub use keys::{AuthInfo, BlobIV, BlobKey};
pub use name::{BlobName, BlobType};
pub use static_blob::{write_validated, ValidatingReader};
