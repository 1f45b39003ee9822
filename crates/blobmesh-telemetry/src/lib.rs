//! Structured logging and an optional, low-cardinality observer hook for
//! the datastore façade and multi-source cache.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::any::Any;
use std::sync::OnceLock;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[cfg(feature = "otel")]
pub mod otel_observer;

/// Failures setting up telemetry infrastructure.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The OpenTelemetry exporter pipeline failed to build.
    #[error("otel setup failed: {0}")]
    Otel(String),
}

/// Initialize structured JSON logging with an env filter.
/// Honors `RUST_LOG`, e.g. `"info,blobmesh_datastore=debug"`.
pub fn init_json_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Optional observability hooks for the datastore façade and multi-source
/// cache. By default all methods are no-ops; register a global observer to
/// forward counters/spans to a metrics backend.
pub trait DatastoreObserver: Send + Sync {
    /// Bytes returned by a successful `open()`.
    fn open_bytes(&self, _n: u64) {}
    /// Bytes accepted by a successful `update()`.
    fn update_bytes(&self, _n: u64) {}
    /// A multi-source cache decision resolved without triggering a fetch.
    fn cache_hit(&self) {}
    /// A multi-source cache decision triggered an upstream fetch.
    fn cache_miss(&self) {}
    /// One upstream source was attempted during a fetch (regardless of outcome).
    fn fetch_attempt(&self, _source_kind: &str, _succeeded: bool) {}
    /// Start an optional span; dropping the returned guard ends it.
    fn span(&self, _name: &'static str) -> DsSpan {
        DsSpan::noop()
    }
}

/// Guard object for an optional span. Holds a type-erased guard that exits on drop.
pub struct DsSpan {
    _guard: Option<Box<dyn Any + 'static>>,
}

impl DsSpan {
    /// A span guard that does nothing on drop.
    #[must_use]
    pub fn noop() -> Self {
        Self { _guard: None }
    }

    /// Wrap an arbitrary guard object; dropping this drops the guard.
    pub fn from_guard<G: 'static>(guard: G) -> Self {
        Self { _guard: Some(Box::new(guard)) }
    }
}

struct NoopObserver;
impl DatastoreObserver for NoopObserver {}

static NOOP_OBSERVER: NoopObserver = NoopObserver;
static OBSERVER: OnceLock<&'static dyn DatastoreObserver> = OnceLock::new();

/// Register a global observer (optional). Safe to call at most once;
/// subsequent calls are ignored.
pub fn set_observer(observer: &'static dyn DatastoreObserver) {
    let _ = OBSERVER.set(observer);
}

/// The currently registered observer, or a no-op if none was registered.
#[must_use]
pub fn observer() -> &'static dyn DatastoreObserver {
    OBSERVER.get().copied().unwrap_or(&NOOP_OBSERVER)
}
