//! End-to-end tests driving the monitor facade the way a host process would

use std::sync::{Arc, Mutex};

use anyhow::Result;
use monitor_lib::{
    ActivityKind, Alert, AlertLevel, AlertThresholds, CpuCounters, EntityId, MonitorConfig,
    PerformanceMonitor, ResourceProbe, TrendMetric,
};

/// Capture structured logs under test; safe to call from every test
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("monitor_lib=debug")
        .with_test_writer()
        .try_init();
}

/// Probe with fixed memory and steadily advancing CPU counters
struct FixedProbe {
    memory_bytes: u64,
    busy_ticks: u64,
    idle_ticks: u64,
    counters: CpuCounters,
}

impl FixedProbe {
    fn new(memory_bytes: u64) -> Self {
        Self {
            memory_bytes,
            busy_ticks: 30,
            idle_ticks: 70,
            counters: CpuCounters::default(),
        }
    }
}

impl ResourceProbe for FixedProbe {
    fn cpu_counters(&mut self) -> Result<CpuCounters> {
        self.counters.idle += self.idle_ticks;
        self.counters.total += self.idle_ticks + self.busy_ticks;
        Ok(self.counters)
    }

    fn memory_bytes(&mut self) -> Result<u64> {
        Ok(self.memory_bytes)
    }

    fn thread_count(&mut self) -> Result<usize> {
        Ok(16)
    }
}

fn fast_config() -> MonitorConfig {
    init_tracing();
    MonitorConfig {
        tick_interval_ms: 1000,
        ..MonitorConfig::default()
    }
}

#[test]
fn query_metrics_flow_into_latest_snapshot() {
    let monitor = PerformanceMonitor::with_probe(fast_config(), Box::new(FixedProbe::new(0)));
    monitor.initialize();

    for _ in 0..100 {
        monitor.record_query(5.0);
    }

    // Two sub-interval ticks plus one that crosses the interval
    monitor.tick(400);
    monitor.tick(400);
    monitor.tick(400);

    let snapshot = monitor.latest().expect("monitor is running");
    assert_eq!(snapshot.database.query_count, 100);
    assert!((snapshot.database.avg_query_time_ms - 5.0).abs() < 1e-9);
    assert_eq!(snapshot.database.max_query_time_ms, 5.0);
}

#[test]
fn memory_breach_raises_one_warning_alert() {
    let config = MonitorConfig {
        thresholds: AlertThresholds {
            memory_warning_mb: 100.0,
            memory_critical_mb: 2048.0,
            ..AlertThresholds::default()
        },
        ..fast_config()
    };
    let probe = FixedProbe::new(150 * 1024 * 1024);
    let monitor = PerformanceMonitor::with_probe(config, Box::new(probe));
    monitor.initialize();

    monitor.tick(1000);

    let active = monitor.active_alerts(AlertLevel::Warning);
    assert_eq!(active.len(), 1);
    let alert = &active[0];
    assert_eq!(alert.category.to_string(), "Memory");
    assert_eq!(alert.level, AlertLevel::Warning);
    assert_eq!(alert.threshold_value, 100.0);
    assert!((alert.observed_value - 150.0).abs() < 1e-9);
}

#[test]
fn cpu_delta_shows_up_after_second_cycle() {
    let monitor = PerformanceMonitor::with_probe(fast_config(), Box::new(FixedProbe::new(0)));
    monitor.initialize();

    monitor.tick(1000); // first cycle: no prior counters, cpu stays 0
    monitor.tick(1000); // second cycle: 30% busy over the interval

    let trend = monitor.trend(TrendMetric::CpuPercent);
    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0].value, 0.0);
    assert!((trend[1].value - 30.0).abs() < 1e-9);

    let snapshot = monitor.latest().unwrap();
    assert!((snapshot.resources.cpu_percent - 30.0).abs() < 1e-9);
    assert_eq!(snapshot.resources.thread_count, 16);
}

#[test]
fn activity_counts_and_entity_trend() {
    let monitor = PerformanceMonitor::with_probe(fast_config(), Box::new(FixedProbe::new(0)));
    monitor.initialize();

    monitor.record_activity_start(EntityId(1), ActivityKind::Combat);
    monitor.record_activity_start(EntityId(2), ActivityKind::Task);
    monitor.record_activity_start(EntityId(3), ActivityKind::Task);
    monitor.record_activity_end(EntityId(3), ActivityKind::Task);
    monitor.record_activity_start(EntityId(4), ActivityKind::Death);

    monitor.tick(1000);

    let snapshot = monitor.latest().unwrap();
    assert_eq!(snapshot.activity.combat, 1);
    assert_eq!(snapshot.activity.task, 1);
    assert_eq!(snapshot.activity.idle, 1);
    assert_eq!(snapshot.activity.terminated, 1);
    assert_eq!(snapshot.activity.total_tracked, 4);

    // Terminated entities are excluded from the tracked population trend
    let trend = monitor.trend(TrendMetric::EntityCount);
    assert_eq!(trend.last().unwrap().value, 3.0);

    monitor.forget_entity(EntityId(4));
    assert_eq!(monitor.latest().unwrap().activity.total_tracked, 4); // last capture
    monitor.tick(1000);
    assert_eq!(monitor.latest().unwrap().activity.total_tracked, 3);
}

#[test]
fn subscribers_receive_alerts_despite_panicking_peer() {
    let config = MonitorConfig {
        thresholds: AlertThresholds {
            query_time_warning_ms: 1.0,
            ..AlertThresholds::default()
        },
        ..fast_config()
    };
    let monitor = PerformanceMonitor::with_probe(config, Box::new(FixedProbe::new(0)));
    monitor.initialize();

    let received: Arc<Mutex<Vec<Alert>>> = Arc::new(Mutex::new(Vec::new()));
    monitor.register_alert_subscriber(|_alert| panic!("bad subscriber"));
    let sink = received.clone();
    monitor.register_alert_subscriber(move |alert| {
        sink.lock().unwrap().push(alert.clone());
    });

    monitor.record_query(50.0);
    monitor.tick(1000);
    monitor.tick(1000);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|a| a.level == AlertLevel::Warning));
}

#[test]
fn alert_history_and_active_window_through_facade() {
    let config = MonitorConfig {
        thresholds: AlertThresholds {
            cpu_warning_percent: 0.0,
            ..AlertThresholds::default()
        },
        ..fast_config()
    };
    let monitor = PerformanceMonitor::with_probe(config, Box::new(FixedProbe::new(0)));
    monitor.initialize();

    for _ in 0..3 {
        monitor.tick(1000);
    }

    // Threshold evaluation is stateless: the persistent breach fired each tick
    assert_eq!(monitor.alert_history(0).len(), 3);
    assert_eq!(monitor.alert_history(2).len(), 2);
    assert_eq!(monitor.active_alerts(AlertLevel::Warning).len(), 3);
    assert!(monitor.active_alerts(AlertLevel::Critical).is_empty());
}

#[test]
fn snapshot_history_is_newest_first() {
    let monitor = PerformanceMonitor::with_probe(fast_config(), Box::new(FixedProbe::new(0)));
    monitor.initialize();

    monitor.tick(1000);
    monitor.record_query(5.0);
    monitor.tick(1000);

    let history = monitor.history(0);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].database.query_count, 1);
    assert_eq!(history[1].database.query_count, 0);
}

#[test]
fn snapshot_serializes_to_json() {
    let monitor = PerformanceMonitor::with_probe(fast_config(), Box::new(FixedProbe::new(0)));
    monitor.initialize();
    monitor.tick(1000);

    let snapshot = monitor.latest().unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json["activity"]["total_tracked"].is_number());
    assert!(json["database"]["avg_query_time_ms"].is_number());
    assert!(json["resources"]["memory_bytes"].is_number());
    assert!(json["timing"]["update_count"].is_number());
}
