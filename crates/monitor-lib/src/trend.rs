//! Bounded time-series windows for tracked metrics
//!
//! Each tracked metric owns one `TrendSeries`: a fixed-capacity FIFO of
//! timestamped samples with O(window) aggregation over the retained window.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::models::MetricSample;

/// Default number of retained samples per metric (one hour at 1-minute ticks)
pub const DEFAULT_TREND_CAPACITY: usize = 60;

/// Metrics that receive a trend window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    CpuPercent,
    MemoryMb,
    EntityCount,
    AvgQueryTimeMs,
}

impl std::fmt::Display for TrendMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendMetric::CpuPercent => write!(f, "cpu_percent"),
            TrendMetric::MemoryMb => write!(f, "memory_mb"),
            TrendMetric::EntityCount => write!(f, "entity_count"),
            TrendMetric::AvgQueryTimeMs => write!(f, "avg_query_time_ms"),
        }
    }
}

/// Fixed-capacity FIFO of metric samples
pub struct TrendSeries {
    samples: VecDeque<MetricSample>,
    capacity: usize,
}

impl TrendSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample stamped with the current time, evicting the oldest
    /// entry when the window is full. Always succeeds.
    pub fn append(&mut self, value: f64) {
        self.append_at(chrono::Utc::now().timestamp_millis(), value);
    }

    /// Append a sample with an explicit timestamp
    pub fn append_at(&mut self, timestamp_ms: i64, value: f64) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(MetricSample {
            timestamp_ms,
            value,
        });
    }

    /// Average over retained samples, 0 when empty
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| s.value).sum();
        sum / self.samples.len() as f64
    }

    /// Minimum over retained samples, 0 when empty
    pub fn min(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.value)
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.min(v)))
            })
            .unwrap_or(0.0)
    }

    /// Maximum over retained samples, 0 when empty
    pub fn max(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.value)
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            })
            .unwrap_or(0.0)
    }

    /// Retained samples, oldest first
    pub fn samples(&self) -> Vec<MetricSample> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for TrendSeries {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_series_aggregates_are_zero() {
        let series = TrendSeries::new(10);
        assert_eq!(series.average(), 0.0);
        assert_eq!(series.min(), 0.0);
        assert_eq!(series.max(), 0.0);
        assert!(series.is_empty());
    }

    #[test]
    fn test_bounded_growth_retains_most_recent() {
        let mut series = TrendSeries::new(5);

        for i in 0..20 {
            series.append_at(i, i as f64);
            assert!(series.len() <= 5);
        }

        let retained: Vec<f64> = series.samples().iter().map(|s| s.value).collect();
        assert_eq!(retained, vec![15.0, 16.0, 17.0, 18.0, 19.0]);
    }

    #[test]
    fn test_aggregates_over_window() {
        let mut series = TrendSeries::new(3);
        series.append_at(0, 10.0);
        series.append_at(1, 2.0);
        series.append_at(2, 6.0);

        assert!((series.average() - 6.0).abs() < f64::EPSILON);
        assert_eq!(series.min(), 2.0);
        assert_eq!(series.max(), 10.0);

        // Evicting the 10.0 changes the max
        series.append_at(3, 4.0);
        assert_eq!(series.max(), 6.0);
        assert!((series.average() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut series = TrendSeries::new(0);
        series.append_at(0, 1.0);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut series = TrendSeries::new(5);
        series.append(1.0);
        series.clear();
        assert!(series.is_empty());
        assert_eq!(series.average(), 0.0);
    }
}
