// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity ring of per-timestep agent/environment snapshots
//!
//! Slot 0 is always the newest record; slot `i` is exactly `i` main-stream
//! updates older. Slots that have never been written are `Empty` — stale
//! data is never silently reused.

use crate::stream::{AgentState, EgoState};
use serde::{Deserialize, Serialize};

/// One past timestep: ego state plus neighboring-agent states
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub ego: EgoState,
    pub agents: Vec<AgentState>,
}

/// A ring slot; `Empty` until `capacity` records have been pushed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum HistorySlot {
    #[default]
    Empty,
    Filled(HistoryRecord),
}

impl HistorySlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, HistorySlot::Empty)
    }

    pub fn record(&self) -> Option<&HistoryRecord> {
        match self {
            HistorySlot::Empty => None,
            HistorySlot::Filled(record) => Some(record),
        }
    }
}

/// Fixed-capacity history ring, newest at index 0
#[derive(Debug, Clone)]
pub struct HistoryRing {
    slots: Vec<HistorySlot>,
}

impl HistoryRing {
    /// Create a ring with `capacity` empty slots (capacity >= 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![HistorySlot::Empty; capacity.max(1)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Insert a new record at index 0, shifting the rest toward the tail and
    /// dropping the oldest
    pub fn push_front(&mut self, record: HistoryRecord) {
        self.slots.pop();
        self.slots.insert(0, HistorySlot::Filled(record));
    }

    pub fn get(&self, index: usize) -> &HistorySlot {
        &self.slots[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistorySlot> {
        self.slots.iter()
    }

    /// True iff every slot holds a record
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| !slot.is_empty())
    }

    pub fn empty_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_empty()).count()
    }

    /// Most recent record, if any
    pub fn newest(&self) -> Option<&HistoryRecord> {
        self.slots[0].record()
    }

    /// Ego velocity estimated by finite differencing the two newest slots.
    /// Requires a complete ring: partial history would silently alias the
    /// first frames of a run.
    pub fn finite_difference_velocity(&self, timestep_s: f64) -> Option<(f64, f64)> {
        if !self.is_complete() || self.capacity() < 2 || timestep_s <= 0.0 {
            return None;
        }
        let newest = self.slots[0].record()?;
        let previous = self.slots[1].record()?;
        Some((
            (newest.ego.x - previous.ego.x) / timestep_s,
            (newest.ego.y - previous.ego.y) / timestep_s,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: f64) -> HistoryRecord {
        HistoryRecord {
            ego: EgoState {
                x,
                y: 0.0,
                heading: 0.0,
                speed: 1.0,
            },
            agents: Vec::new(),
        }
    }

    #[test]
    fn partial_ring_has_trailing_empties() {
        let capacity = 5;
        let mut ring = HistoryRing::new(capacity);
        for k in 1..capacity {
            ring.push_front(record(k as f64));
            assert_eq!(ring.empty_count(), capacity - k);
            assert!(!ring.is_complete());
        }
        ring.push_front(record(capacity as f64));
        assert_eq!(ring.empty_count(), 0);
        assert!(ring.is_complete());
    }

    #[test]
    fn newest_is_at_index_zero() {
        let mut ring = HistoryRing::new(3);
        ring.push_front(record(1.0));
        ring.push_front(record(2.0));
        ring.push_front(record(3.0));
        ring.push_front(record(4.0));

        assert_eq!(ring.newest().unwrap().ego.x, 4.0);
        assert_eq!(ring.get(1).record().unwrap().ego.x, 3.0);
        assert_eq!(ring.get(2).record().unwrap().ego.x, 2.0);
    }

    #[test]
    fn oldest_is_dropped_on_overflow() {
        let mut ring = HistoryRing::new(2);
        ring.push_front(record(1.0));
        ring.push_front(record(2.0));
        ring.push_front(record(3.0));
        assert_eq!(ring.get(1).record().unwrap().ego.x, 2.0);
        assert!(ring.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn velocity_needs_complete_ring() {
        let mut ring = HistoryRing::new(3);
        ring.push_front(record(0.0));
        ring.push_front(record(1.0));
        assert!(ring.finite_difference_velocity(0.1).is_none());

        ring.push_front(record(2.0));
        let (vx, vy) = ring.finite_difference_velocity(0.1).unwrap();
        assert!((vx - 10.0).abs() < 1e-9);
        assert_eq!(vy, 0.0);
    }
}
