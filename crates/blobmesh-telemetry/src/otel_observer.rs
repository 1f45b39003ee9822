//! OTel-backed [`DatastoreObserver`] (feature `otel`). Counters for
//! open/update bytes and cache hit/miss; spans are best-effort.

use once_cell::sync::OnceCell;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, Unit};
use opentelemetry::KeyValue;

use crate::{DatastoreObserver, DsSpan};

struct Instruments {
    open_bytes: Counter<u64>,
    update_bytes: Counter<u64>,
    cache_hits: Counter<u64>,
    cache_misses: Counter<u64>,
    fetch_attempts: Counter<u64>,
}

static INSTR: OnceCell<Instruments> = OnceCell::new();
static INSTANCE: OnceCell<OtelDatastoreObserver> = OnceCell::new();

fn ensure_instruments() -> &'static Instruments {
    INSTR.get_or_init(|| {
        let meter: Meter = global::meter("blobmesh.datastore");
        Instruments {
            open_bytes: meter
                .u64_counter("datastore.open.bytes")
                .with_description("Plaintext bytes returned by open()")
                .with_unit(Unit::new("By"))
                .init(),
            update_bytes: meter
                .u64_counter("datastore.update.bytes")
                .with_description("Plaintext bytes accepted by update()")
                .with_unit(Unit::new("By"))
                .init(),
            cache_hits: meter.u64_counter("datastore.cache.hits").init(),
            cache_misses: meter.u64_counter("datastore.cache.misses").init(),
            fetch_attempts: meter.u64_counter("datastore.fetch.attempts").init(),
        }
    })
}

/// A `DatastoreObserver` that forwards counters to the global OTel meter
/// provider and spans to `tracing`.
#[derive(Clone, Copy)]
pub struct OtelDatastoreObserver;

impl DatastoreObserver for OtelDatastoreObserver {
    fn open_bytes(&self, n: u64) {
        if n > 0 {
            ensure_instruments().open_bytes.add(n, &[KeyValue::new("op", "open")]);
        }
    }

    fn update_bytes(&self, n: u64) {
        if n > 0 {
            ensure_instruments().update_bytes.add(n, &[KeyValue::new("op", "update")]);
        }
    }

    fn cache_hit(&self) {
        ensure_instruments().cache_hits.add(1, &[]);
    }

    fn cache_miss(&self) {
        ensure_instruments().cache_misses.add(1, &[]);
    }

    fn fetch_attempt(&self, source_kind: &str, succeeded: bool) {
        ensure_instruments().fetch_attempts.add(
            1,
            &[KeyValue::new("source", source_kind.to_string()), KeyValue::new("ok", succeeded)],
        );
    }

    fn span(&self, name: &'static str) -> DsSpan {
        let span = tracing::span!(tracing::Level::INFO, "datastore", op = name);
        DsSpan::from_guard(span.entered())
    }
}

/// A global `&'static` instance suitable for [`crate::set_observer`].
pub fn global() -> &'static OtelDatastoreObserver {
    INSTANCE.get_or_init(|| {
        let _ = ensure_instruments();
        OtelDatastoreObserver
    })
}
