use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    /// Reads that had to derive a fresh value
    pub misses: u64,
    pub invalidations: u64,
    pub fetches: u64,
    pub fetch_errors: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> u32 {
        let total = self.hits + self.misses;
        if total > 0 {
            (self.hits as f32 / total as f32 * 100.0) as u32
        } else {
            0
        }
    }

    /// Log cache statistics (for periodic monitoring)
    pub fn log(&self, layer: &str) {
        tracing::info!(
            layer = %layer,
            hits = self.hits,
            misses = self.misses,
            hit_rate = self.hit_rate(),
            invalidations = self.invalidations,
            fetches = self.fetches,
            fetch_errors = self.fetch_errors,
            "Cache statistics"
        );
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    fetches: AtomicU64,
    fetch_errors: AtomicU64,
}

impl StatsCounter {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let counter = StatsCounter::default();
        counter.hit();
        counter.hit();
        counter.hit();
        counter.miss();

        let stats = counter.snapshot();
        assert_eq!(stats.hit_rate(), 75);
        assert_eq!(CacheStats::default().hit_rate(), 0);
    }
}
