//! Core data models for the monitoring core

use serde::{Deserialize, Serialize};

/// Opaque identifier of a monitored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single timestamped metric observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Point-in-time process resource reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceReading {
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub thread_count: usize,
}

impl ResourceReading {
    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Aggregate counts derived from current entity membership
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub combat: usize,
    pub task: usize,
    pub idle: usize,
    pub terminated: usize,
    pub total_tracked: usize,
}

impl ActivityCounts {
    /// Entities currently participating in the simulation (terminated excluded)
    pub fn active(&self) -> usize {
        self.combat + self.task + self.idle
    }
}

/// Derived data-store metrics for one evaluation tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub query_count: u64,
    pub queries_per_second: f64,
    /// Rolling average over the retained latency ring
    pub avg_query_time_ms: f64,
    /// Rolling maximum over the retained latency ring
    pub max_query_time_ms: f64,
    /// Maximum latency ever observed, across evictions
    pub lifetime_max_query_time_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate_percent: f64,
    /// Pass-through from the data-store driver; not computed here
    pub pool_utilization_percent: f32,
}

/// Derived update-loop timing averages
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingMetrics {
    pub update_count: u64,
    pub avg_update_ms: f64,
    pub max_update_ms: f64,
}

/// Immutable point-in-time composite of everything the monitor tracks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp_ms: i64,
    pub uptime_secs: u64,
    pub activity: ActivityCounts,
    pub resources: ResourceReading,
    pub database: DatabaseSummary,
    pub timing: TimingMetrics,
    pub error_count: u64,
    pub warning_count: u64,
}
