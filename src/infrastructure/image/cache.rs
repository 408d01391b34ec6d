//! Tenant-scoped device image cache.
//!
//! Fetches authenticated device images on demand through an injected
//! [`ImageFetcher`], deduplicates concurrent requests per key, bounds memory
//! with TTL expiry and LRU eviction, throttles fetches through a two-level
//! priority queue and owns every object URL it stores.
//!
//! All state sits behind one mutex that is never held across an `.await`.
//! Fetches run as tokio tasks; subscribers are called with the lock released.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::join_all;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{
    CacheKey, DeviceId, DeviceImageRef, ImageState, ImageStatus, TenantKey,
};
use crate::domain::ports::{FetchOptions, FetchResult, ImageFetcher};

use super::entry::{CacheEntry, FetchJob, InFlightEntry, PendingLoad, expiry_after};
use super::limits::{CacheLimits, CacheLimitsUpdate};
use super::queue::{FetchQueue, Priority};
use super::stats::{CacheStats, StatsCounters};
use super::subscribers::{SubscriberList, Subscription};

/// Options for [`DeviceImageCache::request`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Queue priority of the fetch, if one is needed.
    pub priority: Priority,
}

impl RequestOptions {
    /// High priority, for items currently on screen.
    #[must_use]
    pub const fn high() -> Self {
        Self {
            priority: Priority::High,
        }
    }
}

/// Options for [`DeviceImageCache::prefetch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchOptions {
    /// Concurrency limit for the duration of the batch.
    pub concurrency: Option<usize>,
}

/// What [`DeviceImageCache::invalidate_device`] removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationTarget {
    /// Every entry and fetch owned by a device.
    Device(DeviceId),
    /// Every entry and fetch whose image URL starts with the prefix.
    UrlPrefix(String),
}

impl From<DeviceId> for InvalidationTarget {
    fn from(id: DeviceId) -> Self {
        Self::Device(id)
    }
}

impl From<&str> for InvalidationTarget {
    fn from(prefix: &str) -> Self {
        Self::UrlPrefix(prefix.to_string())
    }
}

impl From<String> for InvalidationTarget {
    fn from(prefix: String) -> Self {
        Self::UrlPrefix(prefix)
    }
}

/// How a fetch job ended.
enum Outcome {
    Fetched(FetchResult),
    Cancelled,
    Crashed(String),
}

struct CacheState {
    entries: LruCache<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlightEntry>,
    queue: FetchQueue<FetchJob>,
    active: usize,
    limits: CacheLimits,
    stats: StatsCounters,
    next_generation: u64,
}

impl CacheState {
    fn new(limits: CacheLimits) -> Self {
        Self {
            entries: LruCache::unbounded(),
            in_flight: HashMap::new(),
            queue: FetchQueue::new(),
            active: 0,
            limits,
            stats: StatsCounters::default(),
            next_generation: 1,
        }
    }

    fn remove_entries_where(&mut self, pred: impl Fn(&CacheKey, &CacheEntry) -> bool) -> usize {
        let doomed: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, entry)| pred(key, entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            // dropping the entry releases its resource
            self.entries.pop(key);
        }
        doomed.len()
    }

    fn prune_expired(&mut self, now: Instant) -> usize {
        let expired = self.remove_entries_where(|_, entry| entry.is_expired(now));
        if expired > 0 {
            debug!(count = expired, "Expired cached device images");
        }
        expired
    }

    fn prune_lru(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.limits.max_entries {
            let Some((key, _entry)) = self.entries.pop_lru() else {
                break;
            };
            trace!(key = %key.fingerprint(), "Evicted least recently used device image");
            evicted += 1;
        }
        if evicted > 0 {
            debug!(count = evicted, "Evicted device images over capacity");
        }
        evicted
    }

    fn insert_entry(&mut self, key: CacheKey, entry: CacheEntry) {
        self.entries.push(key, entry);
        self.prune_expired(Instant::now());
        self.prune_lru();
    }

    /// Records a finished job and writes its result if the job still owns
    /// the key. Returns true if the cache changed.
    fn finish_job(&mut self, job: &FetchJob, outcome: Outcome, elapsed: Duration) -> bool {
        let owns_in_flight = self
            .in_flight
            .get(&job.key)
            .is_some_and(|flight| flight.generation == job.generation);
        if owns_in_flight {
            self.in_flight.remove(&job.key);
        }

        let (status, resource, error) = match outcome {
            Outcome::Fetched(result) => {
                self.stats.record_load(result.status(), elapsed);
                match result {
                    FetchResult::Ok(handle) => (ImageStatus::Loaded, Some(handle), None),
                    FetchResult::Error { message } => (ImageStatus::Error, None, Some(message)),
                    other => (other.status(), None, None),
                }
            }
            Outcome::Cancelled => {
                self.stats.record_status(ImageStatus::Aborted);
                (ImageStatus::Aborted, None, None)
            }
            Outcome::Crashed(message) => {
                self.stats.record_status(ImageStatus::Error);
                (ImageStatus::Error, None, Some(message))
            }
        };

        let now = Instant::now();
        self.prune_expired(now);

        let writable = match self.entries.peek(&job.key) {
            Some(entry) => entry.generation == job.generation,
            None => owns_in_flight && status != ImageStatus::Aborted,
        };
        if !writable {
            debug!(
                key = %job.key.fingerprint(),
                status = %status,
                "Discarding result of superseded device image fetch"
            );
            return false;
        }

        if let Some(device_id) = job.device_id {
            let tenant = job.key.tenant().clone();
            let superseded = self.remove_entries_where(|key, entry| {
                entry.device_id == Some(device_id) && key.tenant() == &tenant && key != &job.key
            });
            if superseded > 0 {
                debug!(device = %device_id, count = superseded, "Dropped superseded device images");
            }
        }

        let ttl = if status.is_loaded() {
            self.limits.ttl
        } else {
            self.limits.error_ttl
        };
        debug!(
            key = %job.key.fingerprint(),
            status = %status,
            elapsed_ms = elapsed.as_millis(),
            "Device image fetch settled"
        );
        self.insert_entry(
            job.key.clone(),
            CacheEntry {
                device_id: job.device_id,
                status,
                resource,
                error,
                created_at: Utc::now(),
                last_access_at: now,
                expires_at: expiry_after(now, ttl),
                generation: job.generation,
            },
        );
        true
    }

    /// Cancels every in-flight fetch matching `pred`. Queued jobs are settled
    /// on the spot; running jobs settle from their own task.
    /// Returns true if the cache changed.
    fn abort_where(&mut self, pred: impl Fn(&CacheKey, &InFlightEntry) -> bool) -> bool {
        let doomed: Vec<CacheKey> = self
            .in_flight
            .iter()
            .filter(|(key, flight)| pred(key, flight))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            if let Some(flight) = self.in_flight.remove(key) {
                flight.cancel.cancel();
            }
        }

        if !doomed.is_empty() {
            debug!(count = doomed.len(), "Aborted in-flight device image fetches");
        }
        self.settle_cancelled_queued()
    }

    /// Settles queued jobs whose token fired before they were dispatched.
    fn settle_cancelled_queued(&mut self) -> bool {
        let mut changed = false;
        for job in self.queue.take_where(|job| job.cancel.is_cancelled()) {
            changed |= self.finish_job(&job, Outcome::Cancelled, Duration::ZERO);
            job.complete();
        }
        changed
    }
}

struct Inner {
    fetcher: Arc<dyn ImageFetcher>,
    state: Mutex<CacheState>,
    subscribers: SubscriberList,
}

impl Inner {
    /// Starts queued jobs while concurrency slots are free.
    fn pump(self: &Arc<Self>, state: &mut CacheState) {
        while state.active < state.limits.effective_concurrency() {
            let Some(job) = state.queue.pop() else {
                break;
            };

            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                warn!(key = %job.key.fingerprint(), "No tokio runtime to run device image fetch");
                state.finish_job(
                    &job,
                    Outcome::Crashed("no async runtime available".to_string()),
                    Duration::ZERO,
                );
                job.complete();
                continue;
            };

            state.active += 1;
            trace!(
                key = %job.key.fingerprint(),
                active = state.active,
                queued = state.queue.len(),
                "Dispatching device image fetch"
            );
            let timeout = state.limits.fetch_timeout;
            let inner = Arc::clone(self);
            runtime.spawn(async move { inner.run(job, timeout).await });
        }
    }

    async fn run(self: Arc<Self>, job: FetchJob, timeout: Duration) {
        let started = Instant::now();
        let options = FetchOptions {
            cancel: job.cancel.clone(),
            timeout,
        };
        let url = job.key.image_url().to_string();
        let fetch = AssertUnwindSafe(self.fetcher.fetch_image(&url, options)).catch_unwind();

        let outcome = tokio::select! {
            biased;
            () = job.cancel.cancelled() => Outcome::Cancelled,
            result = fetch => match result {
                Ok(result) => Outcome::Fetched(result),
                Err(panic_info) => {
                    let message = panic_message(panic_info.as_ref());
                    warn!(key = %job.key.fingerprint(), panic = %message, "Image fetcher panicked");
                    Outcome::Crashed(message)
                }
            },
        };

        let changed = {
            let mut state = self.state.lock();
            state.active = state.active.saturating_sub(1);
            let changed = state.finish_job(&job, outcome, started.elapsed());
            self.pump(&mut state);
            job.complete();
            changed
        };
        if changed {
            self.subscribers.notify();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("image fetcher panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("image fetcher panicked: {s}")
    } else {
        "image fetcher panicked".to_string()
    }
}

/// Client-side cache of device images. Cloning shares the cache.
#[derive(Clone)]
pub struct DeviceImageCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DeviceImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceImageCache")
            .field("limits", &self.limits())
            .finish_non_exhaustive()
    }
}

impl DeviceImageCache {
    /// Creates a cache over `fetcher` with the given limits.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>, limits: CacheLimits) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state: Mutex::new(CacheState::new(limits)),
                subscribers: SubscriberList::default(),
            }),
        }
    }

    /// Creates a cache with default limits.
    #[must_use]
    pub fn with_defaults(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self::new(fetcher, CacheLimits::default())
    }

    /// Ensures the image for `item` is cached or being fetched.
    ///
    /// Returns immediately with a [`PendingLoad`] that resolves once the
    /// fetch settles. Fresh entries resolve at once; a fetch already running
    /// for the same key is shared. A `Loading` placeholder is visible to
    /// [`get_state`](Self::get_state) before this returns.
    pub fn request(
        &self,
        item: &DeviceImageRef,
        tenant: Option<&str>,
        options: RequestOptions,
    ) -> PendingLoad {
        let tenant = TenantKey::from_option(tenant);
        let Some(key) = item.cache_key(&tenant) else {
            return PendingLoad::ready();
        };

        let done = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let now = Instant::now();
            state.prune_expired(now);

            let existing = state.entries.get_mut(&key).map(|entry| {
                entry.last_access_at = now;
                entry.status
            });
            match existing {
                Some(ImageStatus::Loading) => {
                    if let Some(flight) = state.in_flight.get(&key) {
                        return PendingLoad::waiting(flight.done.clone());
                    }
                    // cancelled, its settle writes Aborted shortly
                    return PendingLoad::ready();
                }
                Some(status) => {
                    if status.is_loaded() {
                        state.stats.cache_hits += 1;
                    }
                    trace!(key = %key.fingerprint(), status = %status, "Device image cache hit");
                    return PendingLoad::ready();
                }
                None => {
                    if let Some(flight) = state.in_flight.get(&key) {
                        if now.duration_since(flight.started_at) < state.limits.error_ttl {
                            return PendingLoad::waiting(flight.done.clone());
                        }
                        // outlived its placeholder, start over
                        debug!(key = %key.fingerprint(), "Restarting stale device image fetch");
                        if let Some(stale) = state.in_flight.remove(&key) {
                            stale.cancel.cancel();
                        }
                        state.settle_cancelled_queued();
                    }
                }
            }

            state.stats.cache_misses += 1;
            let generation = state.next_generation;
            state.next_generation += 1;
            trace!(
                key = %key.fingerprint(),
                priority = ?options.priority,
                "Device image cache miss"
            );

            let error_ttl = state.limits.error_ttl;
            state.insert_entry(
                key.clone(),
                CacheEntry {
                    device_id: item.id,
                    status: ImageStatus::Loading,
                    resource: None,
                    error: None,
                    created_at: Utc::now(),
                    last_access_at: now,
                    expires_at: expiry_after(now, error_ttl),
                    generation,
                },
            );

            let cancel = CancellationToken::new();
            let (done_tx, done_rx) = watch::channel(false);
            state.in_flight.insert(
                key.clone(),
                InFlightEntry {
                    device_id: item.id,
                    cancel: cancel.clone(),
                    done: done_rx.clone(),
                    generation,
                    started_at: now,
                },
            );
            state.queue.push(
                FetchJob {
                    key,
                    device_id: item.id,
                    generation,
                    cancel,
                    done: done_tx,
                },
                options.priority,
            );
            self.inner.pump(state);
            done_rx
        };

        self.inner.subscribers.notify();
        PendingLoad::waiting(done)
    }

    /// Returns a snapshot of the cached state for `item`. Never fetches.
    #[must_use]
    pub fn get_state(&self, item: &DeviceImageRef, tenant: Option<&str>) -> ImageState {
        let tenant = TenantKey::from_option(tenant);
        let Some(key) = item.cache_key(&tenant) else {
            return ImageState::idle();
        };

        let mut guard = self.inner.state.lock();
        let now = Instant::now();
        guard.prune_expired(now);
        guard.entries.get_mut(&key).map_or_else(ImageState::idle, |entry| {
            entry.last_access_at = now;
            entry.state()
        })
    }

    /// Requests every item with a URL at low priority and waits for all of
    /// them. Individual failures do not fail the batch.
    pub async fn prefetch(
        &self,
        items: &[DeviceImageRef],
        tenant: Option<&str>,
        options: PrefetchOptions,
    ) {
        let previous = options.concurrency.map(|concurrency| {
            let mut state = self.inner.state.lock();
            std::mem::replace(&mut state.limits.max_concurrent, concurrency)
        });

        let pending: Vec<PendingLoad> = items
            .iter()
            .filter(|item| item.url().is_some())
            .map(|item| self.request(item, tenant, RequestOptions::default()))
            .collect();
        debug!(count = pending.len(), "Prefetching device images");
        join_all(pending.into_iter().map(PendingLoad::wait)).await;

        if let Some(previous) = previous {
            let mut state = self.inner.state.lock();
            state.limits.max_concurrent = previous;
            self.inner.pump(&mut state);
        }
    }

    /// Removes cached entries for a device or URL prefix under `tenant` and
    /// cancels matching fetches.
    pub fn invalidate_device(&self, target: impl Into<InvalidationTarget>, tenant: Option<&str>) {
        let target = target.into();
        let tenant = TenantKey::from_option(tenant);
        {
            let mut state = self.inner.state.lock();
            state.prune_expired(Instant::now());
            let removed = match &target {
                InvalidationTarget::Device(id) => {
                    let removed = state.remove_entries_where(|key, entry| {
                        key.tenant() == &tenant && entry.device_id == Some(*id)
                    });
                    state.abort_where(|key, flight| {
                        key.tenant() == &tenant && flight.device_id == Some(*id)
                    });
                    removed
                }
                InvalidationTarget::UrlPrefix(prefix) => {
                    let matches =
                        |key: &CacheKey| key.tenant() == &tenant && key.image_url().starts_with(prefix);
                    let removed = state.remove_entries_where(|key, _| matches(key));
                    state.abort_where(|key, _| matches(key));
                    removed
                }
            };
            debug!(target = ?target, tenant = %tenant, removed, "Invalidated device images");
        }
        self.inner.subscribers.notify();
    }

    /// Cancels in-flight fetches for a device under `tenant`.
    pub fn abort_device(&self, device_id: DeviceId, tenant: Option<&str>) {
        let tenant = TenantKey::from_option(tenant);
        self.abort_where(|key, flight| {
            key.tenant() == &tenant && flight.device_id == Some(device_id)
        });
    }

    /// Cancels in-flight fetches under `tenant` for devices not in `keep`.
    /// Fetches with no owning device are left alone.
    pub fn abort_not_in_set(&self, keep: &HashSet<DeviceId>, tenant: Option<&str>) {
        let tenant = TenantKey::from_option(tenant);
        self.abort_where(|key, flight| {
            key.tenant() == &tenant && flight.device_id.is_some_and(|id| !keep.contains(&id))
        });
    }

    /// Cancels every in-flight fetch.
    pub fn abort_all(&self) {
        self.abort_where(|_, _| true);
    }

    fn abort_where(&self, pred: impl Fn(&CacheKey, &InFlightEntry) -> bool) {
        let changed = self.inner.state.lock().abort_where(pred);
        if changed {
            self.inner.subscribers.notify();
        }
    }

    /// Cancels every fetch and drops every entry, releasing all resources.
    pub fn clear_all(&self) {
        {
            let mut state = self.inner.state.lock();
            state.abort_where(|_, _| true);
            let count = state.entries.len();
            state.entries.clear();
            info!(count, "Cleared device image cache");
        }
        self.inner.subscribers.notify();
    }

    /// Registers `callback` to run after every cache mutation.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.inner.subscribers.subscribe(callback)
    }

    /// Returns cumulative counters and current sizes.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut state = self.inner.state.lock();
        state.prune_expired(Instant::now());
        state
            .stats
            .snapshot(state.entries.len(), state.in_flight.len())
    }

    /// Returns the limits currently in force.
    #[must_use]
    pub fn limits(&self) -> CacheLimits {
        self.inner.state.lock().limits
    }

    /// Updates any subset of the limits, then re-applies expiry and capacity.
    pub fn set_limits(&self, update: CacheLimitsUpdate) {
        let removed = {
            let mut state = self.inner.state.lock();
            state.limits.apply(update);
            info!(limits = ?state.limits, "Updated device image cache limits");
            let removed = state.prune_expired(Instant::now()) + state.prune_lru();
            self.inner.pump(&mut state);
            removed
        };
        if removed > 0 {
            self.inner.subscribers.notify();
        }
    }

    /// Number of cached entries, expired ones included until the next sweep.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
