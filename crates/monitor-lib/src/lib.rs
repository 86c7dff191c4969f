//! In-process performance monitoring and alerting core
//!
//! This crate provides the core functionality for:
//! - Activity tracking across a population of automated entities
//! - Process resource sampling (CPU, memory, threads)
//! - Data-store query latency and cache metrics
//! - Threshold-based alerting with pluggable subscribers
//! - Bounded trend windows and rolling snapshot history

pub mod activity;
pub mod alert;
pub mod datastore;
pub mod models;
pub mod monitor;
pub mod sampler;
pub mod snapshot;
pub mod trend;

pub use activity::{ActivityKind, ActivityState, ActivityTracker};
pub use alert::{
    Alert, AlertCategory, AlertEngine, AlertLevel, AlertThresholds, ThresholdError,
};
pub use datastore::DataStoreMetrics;
pub use models::*;
pub use monitor::{MonitorConfig, PerformanceMonitor};
pub use sampler::{CpuCounters, ResourceProbe, ResourceSampler, SystemProbe};
pub use snapshot::SnapshotArchive;
pub use trend::{TrendMetric, TrendSeries};
