//! Rolling archive of performance snapshots
//!
//! Stores a bounded history of point-in-time composites captured once per
//! full evaluation cycle. FIFO eviction keeps memory bounded at roughly 24
//! hours of 1-minute snapshots by default.

use std::collections::VecDeque;

use crate::models::{
    ActivityCounts, DatabaseSummary, PerformanceSnapshot, ResourceReading, TimingMetrics,
};

/// Default retained snapshot count (24h at 1-minute resolution)
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 1440;

/// Bounded rolling history of snapshots
pub struct SnapshotArchive {
    history: VecDeque<PerformanceSnapshot>,
    capacity: usize,
}

impl SnapshotArchive {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
        }
    }

    /// Assemble a snapshot from the supplied parts and append it to history.
    /// Pure aggregation; the only side effect is the bounded append.
    #[allow(clippy::too_many_arguments)]
    pub fn capture(
        &mut self,
        activity: ActivityCounts,
        resources: ResourceReading,
        database: DatabaseSummary,
        timing: TimingMetrics,
        uptime_secs: u64,
        error_count: u64,
        warning_count: u64,
        now_ms: i64,
    ) -> PerformanceSnapshot {
        let snapshot = PerformanceSnapshot {
            timestamp_ms: now_ms,
            uptime_secs,
            activity,
            resources,
            database,
            timing,
            error_count,
            warning_count,
        };

        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(snapshot.clone());
        snapshot
    }

    /// Last captured snapshot, if any
    pub fn latest(&self) -> Option<PerformanceSnapshot> {
        self.history.back().cloned()
    }

    /// Most recent `count` snapshots, newest first; 0 means all retained
    pub fn history(&self, count: usize) -> Vec<PerformanceSnapshot> {
        let take = if count == 0 { self.history.len() } else { count };
        self.history.iter().rev().take(take).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for SnapshotArchive {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_at(archive: &mut SnapshotArchive, now_ms: i64) -> PerformanceSnapshot {
        archive.capture(
            ActivityCounts::default(),
            ResourceReading::default(),
            DatabaseSummary::default(),
            TimingMetrics::default(),
            0,
            0,
            0,
            now_ms,
        )
    }

    #[test]
    fn test_empty_archive() {
        let archive = SnapshotArchive::new(10);
        assert!(archive.latest().is_none());
        assert!(archive.history(0).is_empty());
    }

    #[test]
    fn test_capture_and_latest() {
        let mut archive = SnapshotArchive::new(10);
        capture_at(&mut archive, 1);
        capture_at(&mut archive, 2);

        assert_eq!(archive.latest().unwrap().timestamp_ms, 2);
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let mut archive = SnapshotArchive::new(3);
        for i in 0..10 {
            capture_at(&mut archive, i);
            assert!(archive.len() <= 3);
        }

        let history = archive.history(0);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].timestamp_ms, 9);
        assert_eq!(history[2].timestamp_ms, 7);
    }

    #[test]
    fn test_history_count_newest_first() {
        let mut archive = SnapshotArchive::new(10);
        for i in 0..5 {
            capture_at(&mut archive, i);
        }

        let two = archive.history(2);
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].timestamp_ms, 4);
        assert_eq!(two[1].timestamp_ms, 3);

        // Asking beyond the retained count returns what is there
        assert_eq!(archive.history(100).len(), 5);
    }

    #[test]
    fn test_clear() {
        let mut archive = SnapshotArchive::new(5);
        capture_at(&mut archive, 1);
        archive.clear();
        assert!(archive.is_empty());
        assert!(archive.latest().is_none());
    }
}
