//! Device image cache infrastructure.
//!
//! This module provides:
//! - The tenant-scoped device image cache with LRU and TTL eviction
//! - A two-level priority fetch queue
//! - An in-process object URL registry
//! - The authenticated HTTP image fetcher

pub mod cache;
mod entry;
pub mod http_fetcher;
pub mod limits;
pub mod object_url;
pub mod queue;
pub mod stats;
mod subscribers;

pub use cache::{
    DeviceImageCache, InvalidationTarget, PrefetchOptions, RequestOptions,
};
pub use entry::PendingLoad;
pub use http_fetcher::{DEFAULT_USER_AGENT, HttpImageFetcher, failure_for_status};
pub use limits::{CacheLimits, CacheLimitsUpdate};
pub use object_url::{OBJECT_URL_PREFIX, ObjectData, ObjectUrlRegistry};
pub use queue::{FetchQueue, Priority};
pub use stats::CacheStats;
pub use subscribers::Subscription;
