//! Cache sizing and expiry limits.

use std::time::Duration;

/// Default maximum number of cached entries.
pub const DEFAULT_MAX_ENTRIES: usize = 200;
/// Default lifetime of loaded entries (45 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(45 * 60);
/// Default lifetime of failed and loading entries (2 minutes).
pub const DEFAULT_ERROR_TTL: Duration = Duration::from_secs(2 * 60);
/// Default number of concurrently running fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;
/// Default timeout handed to the fetcher.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Limits applied by the device image cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    /// Maximum number of cached entries before LRU eviction.
    pub max_entries: usize,
    /// Lifetime of loaded entries.
    pub ttl: Duration,
    /// Lifetime of every other entry, including loading placeholders.
    pub error_ttl: Duration,
    /// Maximum concurrently running fetches. Values below one act as one.
    pub max_concurrent: usize,
    /// Timeout handed to the fetcher with every request.
    pub fetch_timeout: Duration,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: DEFAULT_TTL,
            error_ttl: DEFAULT_ERROR_TTL,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl CacheLimits {
    /// Applies every field set in `update`.
    pub fn apply(&mut self, update: CacheLimitsUpdate) {
        if let Some(max_entries) = update.max_entries {
            self.max_entries = max_entries;
        }
        if let Some(ttl) = update.ttl {
            self.ttl = ttl;
        }
        if let Some(error_ttl) = update.error_ttl {
            self.error_ttl = error_ttl;
        }
        if let Some(max_concurrent) = update.max_concurrent {
            self.max_concurrent = max_concurrent;
        }
        if let Some(fetch_timeout) = update.fetch_timeout {
            self.fetch_timeout = fetch_timeout;
        }
    }

    /// Concurrency limit actually enforced.
    #[must_use]
    pub const fn effective_concurrency(&self) -> usize {
        if self.max_concurrent == 0 {
            1
        } else {
            self.max_concurrent
        }
    }
}

/// Partial limits update for `DeviceImageCache::set_limits`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheLimitsUpdate {
    /// New entry capacity.
    pub max_entries: Option<usize>,
    /// New loaded-entry lifetime.
    pub ttl: Option<Duration>,
    /// New failed-entry lifetime.
    pub error_ttl: Option<Duration>,
    /// New concurrency limit.
    pub max_concurrent: Option<usize>,
    /// New fetch timeout.
    pub fetch_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = CacheLimits::default();
        assert_eq!(limits.max_entries, 200);
        assert_eq!(limits.ttl, Duration::from_millis(2_700_000));
        assert_eq!(limits.error_ttl, Duration::from_millis(120_000));
        assert_eq!(limits.max_concurrent, 5);
    }

    #[test]
    fn test_partial_apply() {
        let mut limits = CacheLimits::default();
        limits.apply(CacheLimitsUpdate {
            max_entries: Some(3),
            max_concurrent: Some(0),
            ..CacheLimitsUpdate::default()
        });

        assert_eq!(limits.max_entries, 3);
        assert_eq!(limits.ttl, DEFAULT_TTL);
        assert_eq!(limits.effective_concurrency(), 1);
    }
}
