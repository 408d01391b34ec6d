//! Cache and in-flight bookkeeping records.

use std::future::IntoFuture;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::{CacheKey, DeviceId, ImageState, ImageStatus, ResourceHandle};

/// Longest lifetime an entry is given, whatever the configured TTL.
pub(crate) const MAX_LIFETIME: Duration = Duration::from_secs(100 * 365 * 86_400);

/// Instant at which something written at `now` with `ttl` expires.
/// Saturates at [`MAX_LIFETIME`] instead of overflowing.
pub(crate) fn expiry_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_LIFETIME))
        .or_else(|| now.checked_add(MAX_LIFETIME))
        .unwrap_or(now)
}

/// Last known resolution for a key.
#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub device_id: Option<DeviceId>,
    pub status: ImageStatus,
    /// Present only when `status` is `Loaded`. Dropping the entry releases it.
    pub resource: Option<ResourceHandle>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_access_at: Instant,
    pub expires_at: Instant,
    /// Fetch that wrote this entry.
    pub generation: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    pub fn state(&self) -> ImageState {
        ImageState {
            status: self.status,
            src: self.resource.as_ref().map(|r| r.src().to_string()),
            error: self.error.clone(),
            fetched_at: Some(self.created_at),
        }
    }
}

/// Outstanding fetch for a key.
#[derive(Debug)]
pub(crate) struct InFlightEntry {
    pub device_id: Option<DeviceId>,
    pub cancel: CancellationToken,
    pub done: watch::Receiver<bool>,
    pub generation: u64,
    pub started_at: Instant,
}

/// A fetch waiting in the queue or running in the pool.
#[derive(Debug)]
pub(crate) struct FetchJob {
    pub key: CacheKey,
    pub device_id: Option<DeviceId>,
    pub generation: u64,
    pub cancel: CancellationToken,
    pub done: watch::Sender<bool>,
}

impl FetchJob {
    /// Wakes every waiter on this fetch.
    pub fn complete(&self) {
        self.done.send_replace(true);
    }
}

/// Completion of a `request`. Always resolves, never fails.
///
/// The fetch runs whether or not this is awaited.
#[derive(Debug, Clone)]
#[must_use = "await the PendingLoad to wait for the fetch to settle"]
pub struct PendingLoad {
    done: Option<watch::Receiver<bool>>,
}

impl PendingLoad {
    pub(crate) const fn ready() -> Self {
        Self { done: None }
    }

    pub(crate) const fn waiting(done: watch::Receiver<bool>) -> Self {
        Self { done: Some(done) }
    }

    /// Returns true if the underlying fetch has settled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.done.as_ref().is_none_or(|rx| *rx.borrow())
    }

    /// Waits until the underlying fetch settles or is abandoned.
    pub async fn wait(self) {
        if let Some(mut rx) = self.done {
            // An error means the job went away, which counts as settled.
            let _settled = rx.wait_for(|done| *done).await.is_ok();
        }
    }
}

impl IntoFuture for PendingLoad {
    type Output = ();
    type IntoFuture = BoxFuture<'static, ()>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}
