//! Datastore façade over a storage backend, plus a multi-source read-through
//! cache that lazily fills a primary datastore from upstream sources.

#![warn(missing_docs)]

mod clock;
mod facade;
mod multisource;

pub use clock::{Clock, SystemClock, TestClock};
pub use facade::{Datastore, DS};
pub use multisource::{MultiSourceCache, MultiSourceConfig};
