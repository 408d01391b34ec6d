//! Cache usage statistics.

use std::time::Duration;

use serde::Serialize;

use crate::domain::entities::ImageStatus;

/// Cumulative counters kept by the cache.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub loads: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub forbidden: u64,
    pub not_found: u64,
    pub unauthorized: u64,
    pub aborted: u64,
    pub total_load: Duration,
}

impl StatsCounters {
    /// Records a result returned by the fetcher.
    pub fn record_load(&mut self, status: ImageStatus, elapsed: Duration) {
        self.loads += 1;
        self.total_load += elapsed;
        self.record_status(status);
    }

    /// Bumps the per-status counter. `Loaded` has none.
    pub fn record_status(&mut self, status: ImageStatus) {
        match status {
            ImageStatus::NotFound => self.not_found += 1,
            ImageStatus::Forbidden => self.forbidden += 1,
            ImageStatus::Timeout => self.timeouts += 1,
            ImageStatus::Unauthorized => self.unauthorized += 1,
            ImageStatus::Aborted => self.aborted += 1,
            ImageStatus::Error => self.errors += 1,
            ImageStatus::Idle | ImageStatus::Loading | ImageStatus::Loaded => {}
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn snapshot(&self, current_entries: usize, inflight: usize) -> CacheStats {
        let average_load_ms = if self.loads > 0 {
            let total_ms = self.total_load.as_millis();
            let loads = u128::from(self.loads);
            // rounded to the nearest millisecond
            ((total_ms + loads / 2) / loads) as u64
        } else {
            0
        };

        CacheStats {
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            loads: self.loads,
            errors: self.errors,
            timeouts: self.timeouts,
            forbidden: self.forbidden,
            not_found: self.not_found,
            unauthorized: self.unauthorized,
            aborted: self.aborted,
            average_load_ms,
            current_entries,
            inflight,
        }
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered by a loaded entry.
    pub cache_hits: u64,
    /// Requests that started a fetch.
    pub cache_misses: u64,
    /// Results returned by the fetcher, of any status.
    pub loads: u64,
    /// Error results, including caught fetcher panics.
    pub errors: u64,
    /// Timeout results.
    pub timeouts: u64,
    /// Forbidden results.
    pub forbidden: u64,
    /// Not-found results.
    pub not_found: u64,
    /// Unauthorized results.
    pub unauthorized: u64,
    /// Fetches that ended aborted.
    pub aborted: u64,
    /// Mean fetch duration over `loads`.
    pub average_load_ms: u64,
    /// Entries currently cached.
    pub current_entries: usize,
    /// Fetches queued or running.
    pub inflight: usize,
}

impl CacheStats {
    /// Hit rate as a percentage of hits plus misses.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total > 0 {
            (self.cache_hits as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries, {} in flight, {:.1}% hit rate ({} hits, {} misses), \
             {} loads avg {}ms ({} errors, {} timeouts, {} forbidden, {} not found, \
             {} unauthorized, {} aborted)",
            self.current_entries,
            self.inflight,
            self.hit_rate(),
            self.cache_hits,
            self.cache_misses,
            self.loads,
            self.average_load_ms,
            self.errors,
            self.timeouts,
            self.forbidden,
            self.not_found,
            self.unauthorized,
            self.aborted,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_rounds() {
        let mut counters = StatsCounters::default();
        counters.record_load(ImageStatus::Loaded, Duration::from_millis(10));
        counters.record_load(ImageStatus::Forbidden, Duration::from_millis(15));

        let stats = counters.snapshot(2, 0);
        assert_eq!(stats.loads, 2);
        assert_eq!(stats.forbidden, 1);
        assert_eq!(stats.average_load_ms, 13);
        assert_eq!(stats.current_entries, 2);
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = StatsCounters::default().snapshot(0, 0);
        assert_eq!(stats, CacheStats::default());
        assert!(stats.hit_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            cache_hits: 3,
            cache_misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert!(stats.to_string().contains("75.0% hit rate"));
    }
}
