//! Signed, versioned, encrypted dynamic-link protocol.
//!
//! A dynamic link is a mutable pointer: an Ed25519 key pair and nonce fix its
//! blob name forever, while its content is replaced by publishing new
//! signed, encrypted, versioned records under that same name. See
//! [`Publisher`] for writing and [`PublicRecord`]/[`PublicReader`] for
//! parsing and reading.

mod publisher;
mod reader;
mod record;
mod wire;

pub use publisher::Publisher;
pub use reader::PublicReader;
pub use record::PublicRecord;
