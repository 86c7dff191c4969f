//! Facade over the monitoring components
//!
//! [`PerformanceMonitor`] is the externally visible surface: lifecycle,
//! event intake from the entity simulation and the data-store driver, the
//! periodic tick driver, and read APIs for snapshots, trends and alerts.
//!
//! A single lock guards all mutable state. The full evaluation cycle
//! (sample, evaluate, trend, snapshot) runs under one acquisition so alerts
//! and snapshots are computed from the same reading; subscriber dispatch
//! happens after the lock is released so a subscriber may call back into
//! the facade without deadlocking.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::activity::{ActivityKind, ActivityTracker};
use crate::alert::{
    Alert, AlertEngine, AlertLevel, AlertSubscriber, AlertThresholds, ThresholdError,
    DEFAULT_ACTIVE_WINDOW_MS, DEFAULT_ALERT_HISTORY_CAPACITY,
};
use crate::datastore::{DataStoreMetrics, DEFAULT_QUERY_RING_CAPACITY};
use crate::models::{EntityId, MetricSample, PerformanceSnapshot, TimingMetrics};
use crate::sampler::{ResourceProbe, ResourceSampler};
use crate::snapshot::{SnapshotArchive, DEFAULT_SNAPSHOT_CAPACITY};
use crate::trend::{TrendMetric, TrendSeries, DEFAULT_TREND_CAPACITY};

/// Default full-cycle interval (one minute)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 60_000;

/// Configuration for the monitor facade
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Accumulated elapsed time required before a full cycle runs
    pub tick_interval_ms: u64,
    /// Retained samples per trend window
    pub trend_capacity: usize,
    /// Retained query latency samples
    pub query_ring_capacity: usize,
    /// Retained update-duration samples
    pub update_ring_capacity: usize,
    /// Retained alerts
    pub alert_history_capacity: usize,
    /// Retained snapshots
    pub snapshot_capacity: usize,
    /// Recency window for active alerts
    pub active_alert_window_ms: i64,
    /// Initial alert thresholds
    pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            trend_capacity: DEFAULT_TREND_CAPACITY,
            query_ring_capacity: DEFAULT_QUERY_RING_CAPACITY,
            update_ring_capacity: DEFAULT_QUERY_RING_CAPACITY,
            alert_history_capacity: DEFAULT_ALERT_HISTORY_CAPACITY,
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
            active_alert_window_ms: DEFAULT_ACTIVE_WINDOW_MS,
            thresholds: AlertThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Running,
    Shutdown,
}

/// One trend window per tracked metric
struct TrendSet {
    cpu: TrendSeries,
    memory_mb: TrendSeries,
    entity_count: TrendSeries,
    avg_query_time: TrendSeries,
}

impl TrendSet {
    fn new(capacity: usize) -> Self {
        Self {
            cpu: TrendSeries::new(capacity),
            memory_mb: TrendSeries::new(capacity),
            entity_count: TrendSeries::new(capacity),
            avg_query_time: TrendSeries::new(capacity),
        }
    }

    fn get(&self, metric: TrendMetric) -> &TrendSeries {
        match metric {
            TrendMetric::CpuPercent => &self.cpu,
            TrendMetric::MemoryMb => &self.memory_mb,
            TrendMetric::EntityCount => &self.entity_count,
            TrendMetric::AvgQueryTimeMs => &self.avg_query_time,
        }
    }

    fn clear(&mut self) {
        self.cpu.clear();
        self.memory_mb.clear();
        self.entity_count.clear();
        self.avg_query_time.clear();
    }
}

struct MonitorInner {
    lifecycle: Lifecycle,
    config: MonitorConfig,
    started_at_ms: i64,
    accumulated_ms: u64,
    activity: ActivityTracker,
    sampler: ResourceSampler,
    datastore: DataStoreMetrics,
    update_series: TrendSeries,
    update_count: u64,
    engine: AlertEngine,
    trends: TrendSet,
    archive: SnapshotArchive,
    error_count: u64,
    warning_count: u64,
}

impl MonitorInner {
    fn new(config: MonitorConfig, sampler: ResourceSampler) -> Self {
        let engine = AlertEngine::with_capacity(
            config.thresholds,
            config.alert_history_capacity,
            config.active_alert_window_ms,
        );
        Self {
            lifecycle: Lifecycle::Uninitialized,
            started_at_ms: 0,
            accumulated_ms: 0,
            activity: ActivityTracker::new(),
            sampler,
            datastore: DataStoreMetrics::new(config.query_ring_capacity),
            update_series: TrendSeries::new(config.update_ring_capacity),
            update_count: 0,
            engine,
            trends: TrendSet::new(config.trend_capacity),
            archive: SnapshotArchive::new(config.snapshot_capacity),
            error_count: 0,
            warning_count: 0,
            config,
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    fn uptime_secs(&self, now_ms: i64) -> u64 {
        ((now_ms - self.started_at_ms).max(0) / 1000) as u64
    }

    fn timing_metrics(&self) -> TimingMetrics {
        TimingMetrics {
            update_count: self.update_count,
            avg_update_ms: self.update_series.average(),
            max_update_ms: self.update_series.max(),
        }
    }

    /// Capture a snapshot from current state without touching the probe
    fn capture_now(&mut self, now_ms: i64) -> PerformanceSnapshot {
        let uptime = self.uptime_secs(now_ms);
        let database = self.datastore.derive(uptime as f64);
        self.archive.capture(
            self.activity.counts(),
            self.sampler.last_reading(),
            database,
            self.timing_metrics(),
            uptime,
            self.error_count,
            self.warning_count,
            now_ms,
        )
    }

    /// The ordered full cycle: sample, evaluate, trend, snapshot. Returns
    /// the emitted alerts together with the subscriber list so dispatch can
    /// run after the state lock is released.
    fn full_cycle(&mut self, now_ms: i64) -> (Vec<Alert>, Vec<AlertSubscriber>) {
        let reading = self.sampler.sample();
        let uptime = self.uptime_secs(now_ms);
        let database = self.datastore.derive(uptime as f64);
        let counts = self.activity.counts();

        let alerts = self
            .engine
            .evaluate(&reading, &database, counts.active(), now_ms);

        self.trends.cpu.append_at(now_ms, reading.cpu_percent);
        self.trends.memory_mb.append_at(now_ms, reading.memory_mb());
        self.trends
            .entity_count
            .append_at(now_ms, counts.active() as f64);
        self.trends
            .avg_query_time
            .append_at(now_ms, database.avg_query_time_ms);

        let snapshot = self.archive.capture(
            counts,
            reading,
            database,
            self.timing_metrics(),
            uptime,
            self.error_count,
            self.warning_count,
            now_ms,
        );

        debug!(
            event = "cycle_complete",
            cpu_percent = snapshot.resources.cpu_percent,
            memory_mb = snapshot.resources.memory_mb(),
            active_entities = counts.active(),
            alerts = alerts.len(),
            snapshots = self.archive.len(),
            "Full evaluation cycle complete"
        );

        (alerts, self.engine.subscribers())
    }

    fn clear_all(&mut self) {
        self.activity.clear();
        self.sampler.reset();
        self.datastore.clear();
        self.update_series.clear();
        self.update_count = 0;
        self.engine.clear();
        self.trends.clear();
        self.archive.clear();
        self.error_count = 0;
        self.warning_count = 0;
        self.accumulated_ms = 0;
    }
}

/// Single-process performance monitoring and alerting facade
pub struct PerformanceMonitor {
    inner: Mutex<MonitorInner>,
}

impl PerformanceMonitor {
    /// Create a monitor with default configuration and the system probe
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    pub fn with_config(config: MonitorConfig) -> Self {
        Self {
            inner: Mutex::new(MonitorInner::new(config, ResourceSampler::new())),
        }
    }

    /// Create a monitor with a custom resource probe, for tests or hosts
    /// that supply their own OS integration
    pub fn with_probe(config: MonitorConfig, probe: Box<dyn ResourceProbe>) -> Self {
        Self {
            inner: Mutex::new(MonitorInner::new(
                config,
                ResourceSampler::with_probe(probe),
            )),
        }
    }

    // A panicking caller must not disable monitoring for everyone else.
    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    // --- lifecycle ---

    /// Transition to Running. Idempotent: repeated calls while Running are
    /// no-ops. Callable again after shutdown to restart with empty buffers.
    pub fn initialize(&self) {
        let mut inner = self.lock();
        if inner.is_running() {
            return;
        }
        if inner.lifecycle == Lifecycle::Shutdown {
            inner.clear_all();
        }
        inner.lifecycle = Lifecycle::Running;
        inner.started_at_ms = Self::now_ms();
        inner.accumulated_ms = 0;
        info!(
            event = "monitor_started",
            tick_interval_ms = inner.config.tick_interval_ms,
            "Performance monitor started"
        );
    }

    /// Clear all bounded buffers and transition to the terminal state.
    /// Every call other than `initialize` afterwards is a no-op.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.lifecycle != Lifecycle::Running {
            return;
        }
        inner.clear_all();
        inner.lifecycle = Lifecycle::Shutdown;
        info!(event = "monitor_shutdown", "Performance monitor shut down");
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    // --- intake: entity simulation ---

    pub fn record_activity_start(&self, id: EntityId, kind: ActivityKind) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        inner.activity.record_transition(id, kind.state_on_start());
    }

    /// End an activity. Unmatched end events (the entity is not currently
    /// in the state this kind starts) are ignored so a stray end cannot
    /// cancel an unrelated state.
    pub fn record_activity_end(&self, id: EntityId, kind: ActivityKind) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        if inner.activity.state_of(id) == Some(kind.state_on_start()) {
            inner.activity.record_transition(id, kind.state_on_end());
        }
    }

    /// Drop an entity permanently destroyed by the simulation
    pub fn forget_entity(&self, id: EntityId) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        inner.activity.forget(id);
    }

    pub fn record_error(&self, category: &str, message: &str) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        inner.error_count += 1;
        warn!(
            event = "error_recorded",
            category = %category,
            total = inner.error_count,
            "{message}"
        );
    }

    pub fn record_warning(&self, category: &str, message: &str) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        inner.warning_count += 1;
        info!(
            event = "warning_recorded",
            category = %category,
            total = inner.warning_count,
            "{message}"
        );
    }

    /// Record the duration of one simulation update pass
    pub fn record_update(&self, duration_ms: f64) {
        let mut inner = self.lock();
        if !inner.is_running() || !duration_ms.is_finite() || duration_ms < 0.0 {
            return;
        }
        inner.update_series.append(duration_ms);
        inner.update_count += 1;
    }

    // --- intake: data-store driver ---

    pub fn record_query(&self, latency_ms: f64) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        inner.datastore.record_query(latency_ms);
    }

    pub fn record_cache_hit(&self) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        inner.datastore.record_cache_hit();
    }

    pub fn record_cache_miss(&self) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        inner.datastore.record_cache_miss();
    }

    pub fn set_pool_utilization(&self, percent: f32) {
        let mut inner = self.lock();
        if !inner.is_running() {
            return;
        }
        inner.datastore.set_pool_utilization(percent);
    }

    // --- tick driver ---

    /// Accumulate elapsed time; once the configured interval is crossed,
    /// run the full cycle and reset the accumulator. Sub-interval ticks are
    /// cheap no-ops.
    pub fn tick(&self, elapsed_ms: u64) {
        let (alerts, subscribers) = {
            let mut inner = self.lock();
            if !inner.is_running() {
                return;
            }
            inner.accumulated_ms = inner.accumulated_ms.saturating_add(elapsed_ms);
            if inner.accumulated_ms < inner.config.tick_interval_ms {
                return;
            }
            inner.accumulated_ms = 0;
            inner.full_cycle(Self::now_ms())
        };

        // Dispatch outside the state lock so subscribers may re-enter
        AlertEngine::dispatch(&subscribers, &alerts);
    }

    // --- configuration ---

    /// Replace alert thresholds. Invalid values are rejected and the
    /// previously active thresholds stay in effect.
    pub fn set_thresholds(&self, thresholds: AlertThresholds) -> Result<(), ThresholdError> {
        self.lock().engine.set_thresholds(thresholds)
    }

    pub fn get_thresholds(&self) -> AlertThresholds {
        self.lock().engine.thresholds()
    }

    pub fn register_alert_subscriber<F>(&self, subscriber: F)
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        if inner.lifecycle == Lifecycle::Shutdown {
            return;
        }
        inner.engine.register_subscriber(std::sync::Arc::new(subscriber));
    }

    // --- read APIs ---

    /// Latest snapshot. Guaranteed non-empty while Running: if no full
    /// cycle has completed yet, an immediate capture of current (default)
    /// state is taken. Returns `None` only when the monitor is not running.
    pub fn latest(&self) -> Option<PerformanceSnapshot> {
        let mut inner = self.lock();
        if !inner.is_running() {
            return None;
        }
        if let Some(snapshot) = inner.archive.latest() {
            return Some(snapshot);
        }
        Some(inner.capture_now(Self::now_ms()))
    }

    /// Most recent `count` snapshots, newest first; 0 means all retained
    pub fn history(&self, count: usize) -> Vec<PerformanceSnapshot> {
        let inner = self.lock();
        if !inner.is_running() {
            return Vec::new();
        }
        inner.archive.history(count)
    }

    /// Retained trend samples for one metric, oldest first
    pub fn trend(&self, metric: TrendMetric) -> Vec<MetricSample> {
        let inner = self.lock();
        if !inner.is_running() {
            return Vec::new();
        }
        inner.trends.get(metric).samples()
    }

    /// Alerts within the recency window at or above `min_level`, newest first
    pub fn active_alerts(&self, min_level: AlertLevel) -> Vec<Alert> {
        let inner = self.lock();
        if !inner.is_running() {
            return Vec::new();
        }
        inner.engine.active(min_level, Self::now_ms())
    }

    /// Most recent `count` alerts, newest first; 0 means all retained
    pub fn alert_history(&self, count: usize) -> Vec<Alert> {
        let inner = self.lock();
        if !inner.is_running() {
            return Vec::new();
        }
        inner.engine.history(count)
    }

    /// Human-readable rendering of the latest snapshot
    pub fn formatted_summary(&self) -> String {
        use std::fmt::Write as _;

        let Some(s) = self.latest() else {
            return "performance monitor is not running\n".to_string();
        };

        let mut out = String::new();
        let _ = writeln!(out, "=== Performance Summary ===");
        let _ = writeln!(
            out,
            "timestamp: {} ms | uptime: {} s",
            s.timestamp_ms, s.uptime_secs
        );
        let _ = writeln!(
            out,
            "entities: {} tracked ({} idle, {} combat, {} task, {} terminated)",
            s.activity.total_tracked,
            s.activity.idle,
            s.activity.combat,
            s.activity.task,
            s.activity.terminated
        );
        let _ = writeln!(
            out,
            "resources: cpu {:.1}% | memory {:.1} MB ({} bytes) | {} threads",
            s.resources.cpu_percent,
            s.resources.memory_mb(),
            s.resources.memory_bytes,
            s.resources.thread_count
        );
        let _ = writeln!(
            out,
            "datastore: {} queries ({:.2}/s) | avg {:.2} ms, max {:.2} ms (lifetime {:.2} ms)",
            s.database.query_count,
            s.database.queries_per_second,
            s.database.avg_query_time_ms,
            s.database.max_query_time_ms,
            s.database.lifetime_max_query_time_ms
        );
        let _ = writeln!(
            out,
            "cache: {} hits, {} misses ({:.1}% hit rate) | pool {:.1}%",
            s.database.cache_hits,
            s.database.cache_misses,
            s.database.cache_hit_rate_percent,
            s.database.pool_utilization_percent
        );
        let _ = writeln!(
            out,
            "timing: {} updates | avg {:.2} ms, max {:.2} ms",
            s.timing.update_count, s.timing.avg_update_ms, s.timing.max_update_ms
        );
        let _ = writeln!(
            out,
            "counters: {} errors, {} warnings",
            s.error_count, s.warning_count
        );
        out
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
