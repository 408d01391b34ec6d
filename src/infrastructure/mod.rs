//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Device image caching and fetching.
pub mod image;
/// Token provider adapters.
pub mod storage;

pub use config::{AppConfig, CliArgs, ConfigError, ConfigStore, LogLevel};
pub use image::{
    CacheLimits, CacheLimitsUpdate, CacheStats, DeviceImageCache, HttpImageFetcher,
    InvalidationTarget, ObjectUrlRegistry, PendingLoad, PrefetchOptions, Priority,
    RequestOptions, Subscription,
};
pub use storage::StaticTokenProvider;
