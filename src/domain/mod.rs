//! Domain layer with core entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, DeviceId, DeviceImageRef, ImageState, ImageStatus, TenantKey};
pub use errors::FetcherError;
pub use ports::{FetchOptions, FetchResult, ImageFetcher, TokenProvider};
