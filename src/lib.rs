//! Patchbay device image cache.
//!
//! This crate provides a client-side cache for authenticated device images:
//! tenant-scoped keys, LRU and TTL eviction, in-flight deduplication,
//! a bounded two-priority fetch queue, cancellation and change notification.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing use cases and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing the cache and its adapters.
pub mod infrastructure;

pub use domain::entities::{DeviceId, DeviceImageRef, ImageState, ImageStatus, TenantKey};
pub use infrastructure::image::{
    CacheLimits, CacheLimitsUpdate, CacheStats, DeviceImageCache, InvalidationTarget,
    PendingLoad, PrefetchOptions, Priority, RequestOptions, Subscription,
};

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "patchbay-images";
