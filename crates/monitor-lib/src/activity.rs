//! Per-entity activity state tracking
//!
//! Maintains the current state of every entity that has reported at least
//! one transition and derives aggregate counts from the membership. Entries
//! are created implicitly on the first event for an id and removed only by
//! an explicit [`ActivityTracker::forget`] or [`ActivityTracker::clear`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{ActivityCounts, EntityId};

/// Current state of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    Idle,
    Combat,
    Task,
    Terminated,
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityState::Idle => write!(f, "idle"),
            ActivityState::Combat => write!(f, "combat"),
            ActivityState::Task => write!(f, "task"),
            ActivityState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Kind of activity reported by the entity simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Combat,
    Task,
    /// Entity death; ending a death is a revive back to idle
    Death,
}

impl ActivityKind {
    /// State an entity enters when this activity starts
    pub fn state_on_start(self) -> ActivityState {
        match self {
            ActivityKind::Combat => ActivityState::Combat,
            ActivityKind::Task => ActivityState::Task,
            ActivityKind::Death => ActivityState::Terminated,
        }
    }

    /// State an entity returns to when this activity ends
    pub fn state_on_end(self) -> ActivityState {
        ActivityState::Idle
    }
}

/// Registry of entity states keyed by id
#[derive(Debug, Default)]
pub struct ActivityTracker {
    entities: HashMap<EntityId, ActivityState>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the entity to `state`, creating it on first sight. Idempotent:
    /// re-recording the current state is a no-op.
    pub fn record_transition(&mut self, id: EntityId, state: ActivityState) {
        self.entities.insert(id, state);
    }

    /// Current state of an entity, if it has ever been seen
    pub fn state_of(&self, id: EntityId) -> Option<ActivityState> {
        self.entities.get(&id).copied()
    }

    /// Drop an entity from the registry entirely. Intended for permanent
    /// destruction; terminated entities otherwise stay counted.
    pub fn forget(&mut self, id: EntityId) -> bool {
        self.entities.remove(&id).is_some()
    }

    /// Aggregate counts derived from current membership
    pub fn counts(&self) -> ActivityCounts {
        let mut counts = ActivityCounts {
            total_tracked: self.entities.len(),
            ..ActivityCounts::default()
        };
        for state in self.entities.values() {
            match state {
                ActivityState::Combat => counts.combat += 1,
                ActivityState::Task => counts.task += 1,
                ActivityState::Idle => counts.idle += 1,
                ActivityState::Terminated => counts.terminated += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
