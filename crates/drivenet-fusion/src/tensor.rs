// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-shape fusion tensor and channel layout
//!
//! The tensor has shape `(channels, grid, grid)` with one channel group per
//! stream kind. Writes are associative per stream: rewriting one group never
//! reads or touches another group's channels, so independent ingests cannot
//! corrupt each other as long as the gate serializes them.

use crate::history::HistoryRing;
use crate::stream::{LanePoint, OccupancyGrid};
use ndarray::{Array3, ArrayView2};

/// Channel indices derived from the configured history length `H`:
/// channel 0 = occupancy map, `1..=H` = agent history (newest first),
/// `H + 1` = lane, `H + 2` = goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    history_length: usize,
}

impl ChannelLayout {
    pub fn new(history_length: usize) -> Self {
        Self {
            history_length: history_length.max(1),
        }
    }

    pub fn history_length(&self) -> usize {
        self.history_length
    }

    pub fn map_channel(&self) -> usize {
        0
    }

    /// Channel of history slot `i` (0 = newest)
    pub fn history_channel(&self, slot: usize) -> usize {
        debug_assert!(slot < self.history_length);
        1 + slot
    }

    pub fn lane_channel(&self) -> usize {
        self.history_length + 1
    }

    pub fn goal_channel(&self) -> usize {
        self.history_length + 2
    }

    pub fn channel_count(&self) -> usize {
        self.history_length + 3
    }
}

/// World-to-grid transform: world coordinate of cell (0, 0) plus meters per
/// cell. Derived from the map when one is present, otherwise centered on the
/// newest ego position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFrame {
    pub origin: (f64, f64),
    pub resolution: f64,
}

impl GridFrame {
    /// Frame covering `span_m` meters centered on `(x, y)`
    pub fn centered_on(x: f64, y: f64, span_m: f64, grid: usize) -> Self {
        let resolution = span_m / grid as f64;
        Self {
            origin: (x - span_m / 2.0, y - span_m / 2.0),
            resolution,
        }
    }

    /// Frame covering the full extent of an occupancy grid
    pub fn covering(map: &OccupancyGrid, grid: usize) -> Self {
        let extent = map.width.max(map.height) as f64 * map.resolution;
        Self {
            origin: map.origin,
            resolution: extent / grid as f64,
        }
    }

    /// Grid cell containing the world point, or None when out of bounds
    pub fn cell_of(&self, x: f64, y: f64, grid: usize) -> Option<(usize, usize)> {
        let col = (x - self.origin.0) / self.resolution;
        let row = (y - self.origin.1) / self.resolution;
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= grid || col >= grid {
            return None;
        }
        Some((row, col))
    }

    /// World coordinate of a cell center
    pub fn center_of(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin.0 + (col as f64 + 0.5) * self.resolution,
            self.origin.1 + (row as f64 + 0.5) * self.resolution,
        )
    }
}

/// The fixed-shape numeric array consumed by the decision stage.
/// `Clone` is the snapshot operation: a value copy remains usable after the
/// gate is released.
#[derive(Debug, Clone)]
pub struct FusionTensor {
    data: Array3<f32>,
    layout: ChannelLayout,
    grid: usize,
}

impl FusionTensor {
    pub fn new(layout: ChannelLayout, grid: usize) -> Self {
        Self {
            data: Array3::zeros((layout.channel_count(), grid, grid)),
            layout,
            grid,
        }
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn grid(&self) -> usize {
        self.grid
    }

    pub fn channel(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(ndarray::Axis(0), index)
    }

    pub fn as_array(&self) -> &Array3<f32> {
        &self.data
    }

    fn zero_channel(&mut self, index: usize) {
        self.data
            .index_axis_mut(ndarray::Axis(0), index)
            .fill(0.0);
    }

    /// Rebuild the occupancy channel by nearest-neighbor resampling of the
    /// raw map into the fusion grid
    pub fn write_map(&mut self, frame: &GridFrame, map: &OccupancyGrid) {
        let channel = self.layout.map_channel();
        self.zero_channel(channel);
        for row in 0..self.grid {
            for col in 0..self.grid {
                let (wx, wy) = frame.center_of(row, col);
                let mx = ((wx - map.origin.0) / map.resolution) as isize;
                let my = ((wy - map.origin.1) / map.resolution) as isize;
                if mx < 0 || my < 0 || mx as usize >= map.width || my as usize >= map.height {
                    continue;
                }
                let occupancy = map.cells[my as usize * map.width + mx as usize];
                // Unknown cells (-1) stay zero
                if occupancy > 0 {
                    self.data[[channel, row, col]] = occupancy as f32 / 100.0;
                }
            }
        }
    }

    /// Rebuild all history channels from the ring (empty slots become
    /// all-zero channels, never stale data)
    pub fn write_history(&mut self, frame: &GridFrame, ring: &HistoryRing) {
        for slot_idx in 0..self.layout.history_length() {
            let channel = self.layout.history_channel(slot_idx);
            self.zero_channel(channel);
            let Some(record) = ring.get(slot_idx).record() else {
                continue;
            };
            if let Some((row, col)) = frame.cell_of(record.ego.x, record.ego.y, self.grid) {
                self.data[[channel, row, col]] = 1.0;
            }
            for agent in &record.agents {
                if let Some((row, col)) = frame.cell_of(agent.x, agent.y, self.grid) {
                    self.data[[channel, row, col]] = 1.0;
                }
            }
        }
    }

    /// Rebuild the lane channel from polyline points
    pub fn write_lanes(&mut self, frame: &GridFrame, points: &[LanePoint]) {
        let channel = self.layout.lane_channel();
        self.zero_channel(channel);
        for point in points {
            if let Some((row, col)) = frame.cell_of(point.x, point.y, self.grid) {
                self.data[[channel, row, col]] = point.intensity;
            }
        }
    }

    /// Rebuild the goal channel; `None` clears it
    pub fn write_goal(&mut self, frame: &GridFrame, goal: Option<(f64, f64)>) {
        let channel = self.layout.goal_channel();
        self.zero_channel(channel);
        if let Some((gx, gy)) = goal {
            if let Some((row, col)) = frame.cell_of(gx, gy, self.grid) {
                self.data[[channel, row, col]] = 1.0;
            }
        }
    }
}
