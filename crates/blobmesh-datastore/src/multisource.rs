//! Multi-source read-through cache: lazily fills a primary datastore from
//! an ordered list of upstream datastores, coalescing concurrent requests
//! for the same blob name into a single upstream fetch.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use blobmesh_core::{BlobName, BlobType, Ctx, Error};
use blobmesh_telemetry::observer;

use crate::clock::{Clock, SystemClock};
use crate::facade::Datastore;

/// Per-name cache bookkeeping (spec.md §3's `BlobState`).
#[derive(Clone, Copy)]
struct CacheState {
    last_update: Instant,
    not_found: bool,
}

/// A single-flight broadcast channel: the fetcher sets the bool and notifies
/// all waiters once the fetch phase completes.
type FetchChannel = Arc<(Mutex<bool>, Condvar)>;

enum Slot {
    Idle(CacheState),
    Downloading(FetchChannel),
}

/// Closes a fetch's broadcast channel on drop unless `armed` — the normal
/// success path sets `armed` and signals the channel itself; an unwind out
/// of the fetch leaves `armed` false, so the slot is dropped (forcing a
/// fresh fetch next time) and parked waiters are woken rather than stalled.
struct FetchGuard<'a> {
    armed: bool,
    chan: FetchChannel,
    state: &'a Mutex<HashMap<String, Slot>>,
    key: String,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            return;
        }
        self.state.lock().unwrap().remove(&self.key);
        let (lock, cvar) = &*self.chan;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
}

/// Policy knobs for the multi-source cache.
pub struct MultiSourceConfig {
    /// Freshness window for dynamic links before a refresh is attempted.
    pub dynamic_refresh_time: Duration,
    /// Negative-caching window before a `not_found` result is rechecked.
    pub not_found_recheck_time: Duration,
}

impl Default for MultiSourceConfig {
    fn default() -> Self {
        Self {
            dynamic_refresh_time: Duration::from_secs(60),
            not_found_recheck_time: Duration::from_secs(60),
        }
    }
}

fn needs_download(state: &CacheState, ty: BlobType, now: Instant, cfg: &MultiSourceConfig) -> bool {
    if state.not_found && now > state.last_update + cfg.not_found_recheck_time {
        return true;
    }
    if ty == BlobType::Static && !state.not_found {
        return false;
    }
    if ty == BlobType::DynamicLink && now > state.last_update + cfg.dynamic_refresh_time {
        return true;
    }
    false
}

/// Wraps a primary [`Datastore`] plus an ordered list of additional ones,
/// lazily filling the primary from upstream on miss or staleness.
pub struct MultiSourceCache<P: Datastore> {
    primary: P,
    additional: Vec<Box<dyn Datastore>>,
    config: MultiSourceConfig,
    clock: Box<dyn Clock>,
    state: Mutex<HashMap<String, Slot>>,
}

impl<P: Datastore> MultiSourceCache<P> {
    /// Build a cache over `primary`, consulting `additional` in order on miss.
    pub fn new(primary: P, additional: Vec<Box<dyn Datastore>>, config: MultiSourceConfig) -> Self {
        Self::with_clock(primary, additional, config, Box::new(SystemClock))
    }

    /// Build a cache with an injected [`Clock`], for deterministic tests.
    pub fn with_clock(
        primary: P,
        additional: Vec<Box<dyn Datastore>>,
        config: MultiSourceConfig,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self { primary, additional, config, clock, state: Mutex::new(HashMap::new()) }
    }

    /// The wrapped primary datastore.
    #[must_use]
    pub fn primary(&self) -> &P {
        &self.primary
    }

    fn ensure_fresh(&self, ctx: &Ctx, name: &BlobName) -> Result<(), Error> {
        let key = name.to_string_form();
        loop {
            ctx.check()?;
            enum Action {
                Done,
                Wait(FetchChannel),
                Fetch(FetchChannel),
            }

            let action = {
                let mut state = self.state.lock().unwrap();
                match state.get(&key) {
                    None => {
                        let chan: FetchChannel = Arc::new((Mutex::new(false), Condvar::new()));
                        state.insert(key.clone(), Slot::Downloading(chan.clone()));
                        Action::Fetch(chan)
                    }
                    Some(Slot::Downloading(chan)) => Action::Wait(chan.clone()),
                    Some(Slot::Idle(cached)) => {
                        let now = self.clock.now();
                        if needs_download(cached, name.blob_type()?, now, &self.config) {
                            let chan: FetchChannel = Arc::new((Mutex::new(false), Condvar::new()));
                            state.insert(key.clone(), Slot::Downloading(chan.clone()));
                            Action::Fetch(chan)
                        } else {
                            Action::Done
                        }
                    }
                }
            };

            match action {
                Action::Done => {
                    observer().cache_hit();
                    return Ok(());
                }
                Action::Wait(chan) => {
                    let (lock, cvar) = &*chan;
                    let mut done = lock.lock().unwrap();
                    while !*done {
                        done = cvar.wait(done).unwrap();
                    }
                    // retry loop: re-evaluate from step 1 against the fresh state
                }
                Action::Fetch(chan) => {
                    observer().cache_miss();
                    // If `run_fetch` (or the `clock`/`observer` calls around it) ever
                    // unwinds, this guard still closes the channel on drop so waiters
                    // parked in `Action::Wait` don't block forever on a fetch that
                    // will never report back.
                    let mut guard =
                        FetchGuard { armed: false, chan: chan.clone(), state: &self.state, key: key.clone() };
                    let was_found = self.run_fetch(ctx, name);
                    let now = self.clock.now();
                    {
                        let mut state = self.state.lock().unwrap();
                        state.insert(
                            key.clone(),
                            Slot::Idle(CacheState { last_update: now, not_found: !was_found }),
                        );
                    }
                    guard.armed = true;
                    let (lock, cvar) = &*chan;
                    *lock.lock().unwrap() = true;
                    cvar.notify_all();
                    return Ok(());
                }
            }
        }
    }

    fn run_fetch(&self, ctx: &Ctx, name: &BlobName) -> bool {
        let mut was_found = false;
        for source in &self.additional {
            match source.open(ctx, name) {
                Ok(mut reader) => {
                    was_found = true;
                    let _ = self.primary.update(ctx, name, &mut reader);
                    observer().fetch_attempt(&source.kind(), true);
                }
                Err(_) => {
                    observer().fetch_attempt(&source.kind(), false);
                }
            }
        }
        was_found
    }
}

impl<P: Datastore> Datastore for MultiSourceCache<P> {
    fn kind(&self) -> String {
        self.primary.kind()
    }

    fn address(&self) -> String {
        self.primary.address()
    }

    fn open(&self, ctx: &Ctx, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
        self.ensure_fresh(ctx, name)?;
        self.primary.open(ctx, name)
    }

    /// Bypasses the cache entirely: writes go straight to the primary,
    /// which may diverge from upstream until the next refresh window.
    fn update(&self, ctx: &Ctx, name: &BlobName, reader: &mut dyn Read) -> Result<(), Error> {
        self.primary.update(ctx, name, reader)
    }

    fn exists(&self, ctx: &Ctx, name: &BlobName) -> Result<bool, Error> {
        self.ensure_fresh(ctx, name)?;
        self.primary.exists(ctx, name)
    }

    /// Bypasses the cache entirely, going straight to the primary.
    fn delete(&self, ctx: &Ctx, name: &BlobName) -> Result<(), Error> {
        self.primary.delete(ctx, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::DS;
    use blobmesh_backend::MemoryBackend;
    use blobmesh_core::BlobType;
    use sha2::{Digest as _, Sha256};
    use std::io::Cursor;
    use std::sync::Arc as StdArc;
    use std::thread;

    fn ctx() -> Ctx {
        Ctx::background()
    }

    fn static_name(payload: &[u8]) -> BlobName {
        let digest = Sha256::digest(payload);
        BlobName::new(&digest, BlobType::Static).unwrap()
    }

    struct CountingWrap {
        inner: StdArc<DS>,
        calls: StdArc<std::sync::atomic::AtomicU64>,
    }
    impl Datastore for CountingWrap {
        fn kind(&self) -> String {
            self.inner.kind()
        }
        fn address(&self) -> String {
            self.inner.address()
        }
        fn open(&self, ctx: &Ctx, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.open(ctx, name)
        }
        fn update(&self, ctx: &Ctx, name: &BlobName, reader: &mut dyn Read) -> Result<(), Error> {
            self.inner.update(ctx, name, reader)
        }
        fn exists(&self, ctx: &Ctx, name: &BlobName) -> Result<bool, Error> {
            self.inner.exists(ctx, name)
        }
        fn delete(&self, ctx: &Ctx, name: &BlobName) -> Result<(), Error> {
            self.inner.delete(ctx, name)
        }
    }

    #[test]
    fn fills_primary_from_upstream_on_miss() {
        let upstream = DS::new(Box::new(MemoryBackend::new()));
        let payload = b"from upstream".to_vec();
        let name = static_name(&payload);
        upstream.update(&ctx(), &name, &mut Cursor::new(payload.clone())).unwrap();

        let primary = DS::new(Box::new(MemoryBackend::new()));
        let cache = MultiSourceCache::new(
            primary,
            vec![Box::new(upstream) as Box<dyn Datastore>],
            MultiSourceConfig::default(),
        );

        assert!(!cache.primary().exists(&ctx(), &name).unwrap());
        let mut out = Vec::new();
        cache.open(&ctx(), &name).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
        assert!(cache.primary().exists(&ctx(), &name).unwrap());
    }

    #[test]
    fn not_found_is_cached_until_recheck_window_expires() {
        let upstream = StdArc::new(DS::new(Box::new(MemoryBackend::new())));
        let calls = StdArc::new(std::sync::atomic::AtomicU64::new(0));
        let counting = CountingWrap { inner: upstream, calls: calls.clone() };
        let primary = DS::new(Box::new(MemoryBackend::new()));
        let clock = StdArc::new(crate::clock::TestClock::new());
        let cache = MultiSourceCache::with_clock(
            primary,
            vec![Box::new(counting) as Box<dyn Datastore>],
            MultiSourceConfig {
                dynamic_refresh_time: Duration::from_secs(60),
                not_found_recheck_time: Duration::from_secs(10),
            },
            Box::new(clock.clone()),
        );

        let name = static_name(b"never uploaded");
        assert!(matches!(cache.open(&ctx(), &name).unwrap_err(), Error::NotFound));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Within the recheck window: the cached not_found state is trusted, no new fetch.
        clock.advance(Duration::from_secs(5));
        assert!(matches!(cache.open(&ctx(), &name).unwrap_err(), Error::NotFound));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Past the recheck window: a fresh fetch is attempted.
        clock.advance(Duration::from_secs(11));
        assert!(matches!(cache.open(&ctx(), &name).unwrap_err(), Error::NotFound));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_opens_for_same_name_coalesce_into_one_fetch() {
        let upstream = StdArc::new(DS::new(Box::new(MemoryBackend::new())));
        let payload = b"coalesced".to_vec();
        let name = static_name(&payload);
        upstream.update(&ctx(), &name, &mut Cursor::new(payload.clone())).unwrap();

        let calls = StdArc::new(std::sync::atomic::AtomicU64::new(0));
        let counting = CountingWrap { inner: upstream, calls: calls.clone() };
        let primary = DS::new(Box::new(MemoryBackend::new()));
        let cache = StdArc::new(MultiSourceCache::new(
            primary,
            vec![Box::new(counting) as Box<dyn Datastore>],
            MultiSourceConfig::default(),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let name = name.clone();
            handles.push(thread::spawn(move || {
                let mut out = Vec::new();
                cache.open(&Ctx::background(), &name).unwrap().read_to_end(&mut out).unwrap();
                out
            }));
        }
        for h in handles {
            assert_eq!(h.join().unwrap(), payload);
        }

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn static_blob_is_never_refetched_once_cached() {
        let upstream = StdArc::new(DS::new(Box::new(MemoryBackend::new())));
        let payload = b"immutable".to_vec();
        let name = static_name(&payload);
        upstream.update(&ctx(), &name, &mut Cursor::new(payload.clone())).unwrap();

        let calls = StdArc::new(std::sync::atomic::AtomicU64::new(0));
        let counting = CountingWrap { inner: upstream, calls: calls.clone() };
        let primary = DS::new(Box::new(MemoryBackend::new()));
        let clock = StdArc::new(crate::clock::TestClock::new());
        let cache = MultiSourceCache::with_clock(
            primary,
            vec![Box::new(counting) as Box<dyn Datastore>],
            MultiSourceConfig {
                dynamic_refresh_time: Duration::from_secs(60),
                not_found_recheck_time: Duration::from_secs(60),
            },
            Box::new(clock.clone()),
        );

        cache.open(&ctx(), &name).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(1000));
        cache.open(&ctx(), &name).unwrap();
        cache.open(&ctx(), &name).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn dynamic_link_refetches_after_refresh_window() {
        use blobmesh_core::AuthInfo;
        use blobmesh_link::Publisher;

        let upstream_ds = DS::new(Box::new(MemoryBackend::new()));
        let publisher = Publisher::from_auth_info(&AuthInfo::new([9u8; 32], 1));
        let name = publisher.blob_name();
        let (record, _) = publisher.update_link_data(&b"v1"[..], 1).unwrap();
        let mut bytes = Vec::new();
        record.get_public_data_reader().read_to_end(&mut bytes).unwrap();
        upstream_ds.update(&ctx(), &name, &mut Cursor::new(bytes)).unwrap();

        let upstream = StdArc::new(upstream_ds);
        let calls = StdArc::new(std::sync::atomic::AtomicU64::new(0));
        let counting = CountingWrap { inner: upstream, calls: calls.clone() };
        let primary = DS::new(Box::new(MemoryBackend::new()));
        let clock = StdArc::new(crate::clock::TestClock::new());
        let cache = MultiSourceCache::with_clock(
            primary,
            vec![Box::new(counting) as Box<dyn Datastore>],
            MultiSourceConfig {
                dynamic_refresh_time: Duration::from_secs(60),
                not_found_recheck_time: Duration::from_secs(60),
            },
            Box::new(clock.clone()),
        );

        cache.open(&ctx(), &name).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Still within the refresh window: no re-fetch.
        clock.advance(Duration::from_secs(30));
        cache.open(&ctx(), &name).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Past the refresh window: exactly one re-fetch.
        clock.advance(Duration::from_secs(31));
        cache.open(&ctx(), &name).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        cache.open(&ctx(), &name).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
