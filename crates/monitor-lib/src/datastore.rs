//! Data-store query and cache metrics
//!
//! Records per-operation latency samples into a bounded ring alongside
//! monotonic cache counters. Eviction is FIFO and the running sum is
//! decremented by the evicted sample, so the rolling average always agrees
//! with the retained window.

use std::collections::VecDeque;

use crate::models::DatabaseSummary;

/// Default number of retained latency samples
pub const DEFAULT_QUERY_RING_CAPACITY: usize = 1000;

/// Collector for data-store latency and cache metrics
pub struct DataStoreMetrics {
    samples: VecDeque<f64>,
    capacity: usize,
    running_sum: f64,
    lifetime_max_ms: f64,
    query_count: u64,
    cache_hits: u64,
    cache_misses: u64,
    pool_utilization_percent: f32,
}

impl DataStoreMetrics {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
            running_sum: 0.0,
            lifetime_max_ms: 0.0,
            query_count: 0,
            cache_hits: 0,
            cache_misses: 0,
            pool_utilization_percent: 0.0,
        }
    }

    /// Record one query latency sample
    pub fn record_query(&mut self, latency_ms: f64) {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return;
        }

        while self.samples.len() >= self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.running_sum -= evicted;
            }
        }

        self.samples.push_back(latency_ms);
        self.running_sum += latency_ms;
        self.query_count += 1;
        if latency_ms > self.lifetime_max_ms {
            self.lifetime_max_ms = latency_ms;
        }
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_cache_miss(&mut self) {
        self.cache_misses += 1;
    }

    /// Pool utilization is supplied by the data-store driver, not computed here
    pub fn set_pool_utilization(&mut self, percent: f32) {
        self.pool_utilization_percent = percent;
    }

    /// Derive the per-tick summary. `uptime_secs` drives throughput.
    pub fn derive(&self, uptime_secs: f64) -> DatabaseSummary {
        let retained = self.samples.len();
        let avg = if retained == 0 {
            0.0
        } else {
            self.running_sum / retained as f64
        };
        let rolling_max = self.samples.iter().copied().fold(0.0_f64, f64::max);

        let lookups = self.cache_hits + self.cache_misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            100.0 * self.cache_hits as f64 / lookups as f64
        };

        let qps = if uptime_secs > 0.0 {
            self.query_count as f64 / uptime_secs
        } else {
            0.0
        };

        DatabaseSummary {
            query_count: self.query_count,
            queries_per_second: qps,
            avg_query_time_ms: avg,
            max_query_time_ms: rolling_max,
            lifetime_max_query_time_ms: self.lifetime_max_ms,
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            cache_hit_rate_percent: hit_rate,
            pool_utilization_percent: self.pool_utilization_percent,
        }
    }

    /// Sum of the retained ring, maintained incrementally
    pub fn running_sum(&self) -> f64 {
        self.running_sum
    }

    /// Number of retained latency samples
    pub fn retained(&self) -> usize {
        self.samples.len()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.running_sum = 0.0;
        self.lifetime_max_ms = 0.0;
        self.query_count = 0;
        self.cache_hits = 0;
        self.cache_misses = 0;
        self.pool_utilization_percent = 0.0;
    }
}

impl Default for DataStoreMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_RING_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact_sum(metrics: &DataStoreMetrics) -> f64 {
        metrics.samples.iter().sum()
    }

    #[test]
    fn test_ring_sum_invariant_through_eviction() {
        let mut metrics = DataStoreMetrics::new(8);

        for i in 0..50 {
            metrics.record_query(1.0 + (i % 7) as f64);
            assert!(metrics.retained() <= 8);
            assert!((metrics.running_sum() - exact_sum(&metrics)).abs() < 1e-9);
        }
        assert_eq!(metrics.retained(), 8);
    }

    #[test]
    fn test_rolling_average_tracks_retained_window() {
        let mut metrics = DataStoreMetrics::new(2);
        metrics.record_query(10.0);
        metrics.record_query(20.0);
        metrics.record_query(30.0); // evicts the 10.0

        let summary = metrics.derive(0.0);
        assert!((summary.avg_query_time_ms - 25.0).abs() < 1e-9);
        assert_eq!(summary.max_query_time_ms, 30.0);
        assert_eq!(summary.query_count, 3);
    }

    #[test]
    fn test_lifetime_max_survives_eviction() {
        let mut metrics = DataStoreMetrics::new(2);
        metrics.record_query(100.0);
        metrics.record_query(1.0);
        metrics.record_query(2.0);

        let summary = metrics.derive(0.0);
        assert_eq!(summary.max_query_time_ms, 2.0);
        assert_eq!(summary.lifetime_max_query_time_ms, 100.0);
    }

    #[test]
    fn test_hit_rate() {
        let mut metrics = DataStoreMetrics::default();
        assert_eq!(metrics.derive(1.0).cache_hit_rate_percent, 0.0);

        for _ in 0..3 {
            metrics.record_cache_hit();
        }
        metrics.record_cache_miss();

        let summary = metrics.derive(1.0);
        assert!((summary.cache_hit_rate_percent - 75.0).abs() < 1e-9);
        assert_eq!(summary.cache_hits, 3);
        assert_eq!(summary.cache_misses, 1);
    }

    #[test]
    fn test_queries_per_second() {
        let mut metrics = DataStoreMetrics::default();
        for _ in 0..120 {
            metrics.record_query(5.0);
        }

        let summary = metrics.derive(60.0);
        assert!((summary.queries_per_second - 2.0).abs() < 1e-9);

        // Zero uptime never divides
        assert_eq!(metrics.derive(0.0).queries_per_second, 0.0);
    }

    #[test]
    fn test_rejects_non_finite_samples() {
        let mut metrics = DataStoreMetrics::default();
        metrics.record_query(f64::NAN);
        metrics.record_query(f64::INFINITY);
        metrics.record_query(-1.0);
        assert_eq!(metrics.retained(), 0);
        assert_eq!(metrics.derive(1.0).query_count, 0);
    }

    #[test]
    fn test_pool_utilization_pass_through() {
        let mut metrics = DataStoreMetrics::default();
        metrics.set_pool_utilization(42.5);
        assert_eq!(metrics.derive(1.0).pool_utilization_percent, 42.5);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut metrics = DataStoreMetrics::default();
        metrics.record_query(5.0);
        metrics.record_cache_hit();
        metrics.set_pool_utilization(10.0);

        metrics.clear();
        let summary = metrics.derive(1.0);
        assert_eq!(summary, DatabaseSummary::default());
    }
}
