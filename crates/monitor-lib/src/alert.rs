//! Threshold-based alert evaluation
//!
//! The engine is deliberately stateless across ticks: every evaluation
//! compares the freshest readings against the configured thresholds from
//! scratch, so a persistent breach fires again on every tick. Emitted alerts
//! land in a bounded history and are forwarded to every registered
//! subscriber, with per-subscriber panic isolation.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{DatabaseSummary, ResourceReading};

/// Default bounded alert history size
pub const DEFAULT_ALERT_HISTORY_CAPACITY: usize = 1000;

/// Default recency window for "active" alerts (5 minutes)
pub const DEFAULT_ACTIVE_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Alert severity levels, ordered
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "info"),
            AlertLevel::Warning => write!(f, "warning"),
            AlertLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Metric category an alert belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Cpu,
    Memory,
    DataStore,
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCategory::Cpu => write!(f, "CPU"),
            AlertCategory::Memory => write!(f, "Memory"),
            AlertCategory::DataStore => write!(f, "DataStore"),
        }
    }
}

/// Immutable record of one threshold breach
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub category: AlertCategory,
    pub message: String,
    pub timestamp_ms: i64,
    pub observed_value: f64,
    pub threshold_value: f64,
}

/// Warning/critical pairs for each monitored category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub cpu_warning_percent: f64,
    pub cpu_critical_percent: f64,
    pub memory_warning_mb: f64,
    pub memory_critical_mb: f64,
    pub query_time_warning_ms: f64,
    pub query_time_critical_ms: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_warning_percent: 70.0,
            cpu_critical_percent: 90.0,
            memory_warning_mb: 1024.0,
            memory_critical_mb: 2048.0,
            query_time_warning_ms: 100.0,
            query_time_critical_ms: 500.0,
        }
    }
}

/// Rejected threshold configuration
#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error("{field} must be a finite, non-negative value (got {value})")]
    Invalid { field: &'static str, value: f64 },
    #[error("{field} warning threshold {warning} exceeds critical threshold {critical}")]
    Inverted {
        field: &'static str,
        warning: f64,
        critical: f64,
    },
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let pairs = [
            ("cpu", self.cpu_warning_percent, self.cpu_critical_percent),
            ("memory", self.memory_warning_mb, self.memory_critical_mb),
            (
                "query_time",
                self.query_time_warning_ms,
                self.query_time_critical_ms,
            ),
        ];
        for (field, warning, critical) in pairs {
            for value in [warning, critical] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ThresholdError::Invalid { field, value });
                }
            }
            if warning > critical {
                return Err(ThresholdError::Inverted {
                    field,
                    warning,
                    critical,
                });
            }
        }
        Ok(())
    }
}

/// Callback invoked for every emitted alert
pub type AlertSubscriber = Arc<dyn Fn(&Alert) + Send + Sync>;

/// Stateless per-tick threshold evaluator with bounded history
pub struct AlertEngine {
    thresholds: AlertThresholds,
    history: VecDeque<Alert>,
    history_capacity: usize,
    active_window_ms: i64,
    subscribers: Vec<AlertSubscriber>,
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self::with_capacity(thresholds, DEFAULT_ALERT_HISTORY_CAPACITY, DEFAULT_ACTIVE_WINDOW_MS)
    }

    pub fn with_capacity(
        thresholds: AlertThresholds,
        history_capacity: usize,
        active_window_ms: i64,
    ) -> Self {
        Self {
            thresholds,
            history: VecDeque::new(),
            history_capacity: history_capacity.max(1),
            active_window_ms,
            subscribers: Vec::new(),
        }
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.thresholds
    }

    /// Replace thresholds after validation. On rejection the previously
    /// active thresholds remain in effect.
    pub fn set_thresholds(&mut self, thresholds: AlertThresholds) -> Result<(), ThresholdError> {
        thresholds.validate()?;
        self.thresholds = thresholds;
        Ok(())
    }

    pub fn register_subscriber(&mut self, subscriber: AlertSubscriber) {
        self.subscribers.push(subscriber);
    }

    /// Current subscriber list; cloned out so dispatch can run without
    /// holding the caller's state lock.
    pub fn subscribers(&self) -> Vec<AlertSubscriber> {
        self.subscribers.clone()
    }

    /// Evaluate the latest readings against the thresholds.
    ///
    /// Each category is checked independently against critical first, then
    /// warning; a breach means meeting or exceeding the threshold. Every
    /// emitted alert is appended to history and returned for dispatch. A
    /// persistent breach re-fires on every call.
    pub fn evaluate(
        &mut self,
        resources: &ResourceReading,
        database: &DatabaseSummary,
        active_entities: usize,
        now_ms: i64,
    ) -> Vec<Alert> {
        let t = self.thresholds;
        let mut emitted = Vec::new();

        if let Some(alert) = Self::check(
            AlertCategory::Cpu,
            resources.cpu_percent,
            t.cpu_warning_percent,
            t.cpu_critical_percent,
            format!(
                "CPU usage at {:.1}% with {} active entities",
                resources.cpu_percent, active_entities
            ),
            now_ms,
        ) {
            emitted.push(alert);
        }

        let memory_mb = resources.memory_mb();
        if let Some(alert) = Self::check(
            AlertCategory::Memory,
            memory_mb,
            t.memory_warning_mb,
            t.memory_critical_mb,
            format!("process memory at {memory_mb:.1} MB"),
            now_ms,
        ) {
            emitted.push(alert);
        }

        if let Some(alert) = Self::check(
            AlertCategory::DataStore,
            database.avg_query_time_ms,
            t.query_time_warning_ms,
            t.query_time_critical_ms,
            format!(
                "average query time at {:.2} ms over {} queries",
                database.avg_query_time_ms, database.query_count
            ),
            now_ms,
        ) {
            emitted.push(alert);
        }

        for alert in &emitted {
            match alert.level {
                AlertLevel::Critical => warn!(
                    event = "alert_emitted",
                    category = %alert.category,
                    level = %alert.level,
                    observed = alert.observed_value,
                    threshold = alert.threshold_value,
                    "{}", alert.message
                ),
                _ => info!(
                    event = "alert_emitted",
                    category = %alert.category,
                    level = %alert.level,
                    observed = alert.observed_value,
                    threshold = alert.threshold_value,
                    "{}", alert.message
                ),
            }

            while self.history.len() >= self.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(alert.clone());
        }

        emitted
    }

    /// One category comparison: critical first, then warning, at most one
    /// alert per category per evaluation.
    fn check(
        category: AlertCategory,
        observed: f64,
        warning: f64,
        critical: f64,
        message: String,
        now_ms: i64,
    ) -> Option<Alert> {
        let (level, threshold) = if observed >= critical {
            (AlertLevel::Critical, critical)
        } else if observed >= warning {
            (AlertLevel::Warning, warning)
        } else {
            return None;
        };

        Some(Alert {
            level,
            category,
            message,
            timestamp_ms: now_ms,
            observed_value: observed,
            threshold_value: threshold,
        })
    }

    /// Dispatch alerts to subscribers, in order, isolating panics so one
    /// failing subscriber cannot block delivery to the others.
    pub fn dispatch(subscribers: &[AlertSubscriber], alerts: &[Alert]) {
        for alert in alerts {
            for (index, subscriber) in subscribers.iter().enumerate() {
                let result = catch_unwind(AssertUnwindSafe(|| subscriber(alert)));
                if result.is_err() {
                    warn!(
                        event = "subscriber_panicked",
                        subscriber = index,
                        category = %alert.category,
                        "alert subscriber panicked, continuing with remaining subscribers"
                    );
                }
            }
        }
    }

    /// Alerts within the recency window at or above `min_level`, newest first
    pub fn active(&self, min_level: AlertLevel, now_ms: i64) -> Vec<Alert> {
        let cutoff = now_ms - self.active_window_ms;
        self.history
            .iter()
            .rev()
            .filter(|a| a.timestamp_ms >= cutoff && a.level >= min_level)
            .cloned()
            .collect()
    }

    /// Most recent `count` alerts, newest first; 0 means all retained
    pub fn history(&self, count: usize) -> Vec<Alert> {
        let take = if count == 0 { self.history.len() } else { count };
        self.history.iter().rev().take(take).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop retained history. Subscriber registrations are not a bounded
    /// buffer and survive, so delivery resumes after a restart.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}
