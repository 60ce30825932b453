// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The fusion buffer: latest raw snapshots, derived tensor and per-stream
//! freshness
//!
//! The buffer owns the history ring and every sensor snapshot exclusively.
//! It performs no locking of its own — callers serialize access through the
//! synchronization gate — and no operation here is allowed to panic on bad
//! sensor input: a payload that cannot be reduced marks its own stream
//! not-fresh and leaves everything else committed.

use crate::error::IngestError;
use crate::history::{HistoryRecord, HistoryRing};
use crate::stream::{AgentFrame, LanePoint, OccupancyGrid, PlanPoint, SensorPayload, StreamKind};
use crate::tensor::{ChannelLayout, FusionTensor, GridFrame};
use tracing::debug;

/// Geometry and capacity settings for the fusion buffer
#[derive(Debug, Clone, Copy)]
pub struct FusionSettings {
    pub history_length: usize,
    pub grid_size: usize,
    pub grid_span_m: f64,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            history_length: 4,
            grid_size: 32,
            grid_span_m: 40.0,
        }
    }
}

/// Goal predicate settings
#[derive(Debug, Clone, Copy)]
pub struct GoalSettings {
    /// Fixed goal; when None the goal is the last point of the latest plan
    pub coordinate: Option<(f64, f64)>,
    /// Goal-reached distance threshold in meters (design constant, tunable)
    pub radius: f64,
}

impl Default for GoalSettings {
    fn default() -> Self {
        Self {
            coordinate: None,
            radius: 1.3,
        }
    }
}

/// Per-stream freshness: whether the stream has delivered at least one
/// usable payload since last being invalidated, and how much it contributes
/// to the aggregate valid count
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshnessState {
    pub has_data: bool,
    pub valid_count_contribution: usize,
}

/// Ground-truth labels snapshotted next to the tensor (diagnostics only)
#[derive(Debug, Clone, Copy, Default)]
pub struct GroundTruth {
    pub true_steer: Option<f32>,
    pub true_acc: Option<f32>,
    pub true_vel: Option<f32>,
    pub true_lane: Option<i32>,
}

/// Holds the latest raw sensor snapshots, the derived fusion tensor and
/// per-stream freshness flags
pub struct FusionBuffer {
    settings: FusionSettings,
    goal: GoalSettings,
    frame: GridFrame,
    ring: HistoryRing,
    latest_map: Option<OccupancyGrid>,
    latest_lanes: Vec<LanePoint>,
    latest_plan: Vec<PlanPoint>,
    freshness: [FreshnessState; 4],
    tensor: FusionTensor,
    labels: GroundTruth,
}

impl FusionBuffer {
    pub fn new(settings: FusionSettings, goal: GoalSettings) -> Self {
        let layout = ChannelLayout::new(settings.history_length);
        Self {
            frame: GridFrame::centered_on(0.0, 0.0, settings.grid_span_m, settings.grid_size),
            ring: HistoryRing::new(settings.history_length),
            latest_map: None,
            latest_lanes: Vec::new(),
            latest_plan: Vec::new(),
            freshness: [FreshnessState::default(); 4],
            tensor: FusionTensor::new(layout, settings.grid_size),
            labels: GroundTruth::default(),
            settings,
            goal,
        }
    }

    /// Store a payload as the new snapshot for its kind and recompute that
    /// kind's channel group and freshness contribution.
    ///
    /// Must not run concurrently with `snapshot_for_inference`; the gate
    /// enforces this.
    pub fn ingest(&mut self, payload: SensorPayload) -> Result<(), IngestError> {
        match payload {
            SensorPayload::Map(map) => self.ingest_map(map),
            SensorPayload::AgentHistory(frame) => self.ingest_agent_history(frame),
            SensorPayload::LaneSet(points) => self.ingest_lanes(points),
            SensorPayload::ExternalScalar(value) => self.ingest_scalar(value),
        }
    }

    fn ingest_map(&mut self, map: OccupancyGrid) -> Result<(), IngestError> {
        if let Err(reason) = validate_map(&map) {
            return Err(self.fail_stream(StreamKind::Map, reason));
        }
        self.move_frame(GridFrame::covering(&map, self.settings.grid_size));
        self.tensor.write_map(&self.frame, &map);
        self.latest_map = Some(map);
        self.set_fresh(StreamKind::Map, 1);
        debug!("[FUSION] map updated");
        Ok(())
    }

    fn ingest_agent_history(&mut self, frame: AgentFrame) -> Result<(), IngestError> {
        if let Err(reason) = validate_agent_frame(&frame) {
            return Err(self.fail_stream(StreamKind::AgentHistory, reason));
        }

        // Without a map the grid frame tracks the ego vehicle
        if self.latest_map.is_none() {
            self.move_frame(GridFrame::centered_on(
                frame.ego.x,
                frame.ego.y,
                self.settings.grid_span_m,
                self.settings.grid_size,
            ));
        }

        self.ring.push_front(HistoryRecord {
            ego: frame.ego,
            agents: frame.agents,
        });
        self.latest_plan = frame.plan;

        if let Some(steer) = frame.labels.steering_normalized {
            self.labels.true_steer = Some(steer);
        }
        if let Some(acc) = frame.labels.acceleration {
            self.labels.true_acc = Some(acc);
        }
        if let Some(vel) = frame.labels.target_speed {
            self.labels.true_vel = Some(vel);
        }
        if let Some(lane) = frame.labels.lane_change {
            self.labels.true_lane = Some(lane);
        }

        self.tensor.write_history(&self.frame, &self.ring);
        self.tensor.write_goal(&self.frame, self.goal_coordinate());

        // An incomplete ring cannot support full-history features yet, so
        // the main stream withholds its validity contribution until filled
        let contribution = usize::from(self.ring.is_complete());
        self.set_fresh(StreamKind::AgentHistory, contribution);
        debug!(
            "[FUSION] agent history updated, ring complete: {}",
            self.ring.is_complete()
        );
        Ok(())
    }

    fn ingest_lanes(&mut self, points: Vec<LanePoint>) -> Result<(), IngestError> {
        if let Err(reason) = validate_lanes(&points) {
            return Err(self.fail_stream(StreamKind::LaneSet, reason));
        }
        self.tensor.write_lanes(&self.frame, &points);
        self.latest_lanes = points;
        self.set_fresh(StreamKind::LaneSet, 1);
        debug!("[FUSION] lanes updated");
        Ok(())
    }

    fn ingest_scalar(&mut self, value: f32) -> Result<(), IngestError> {
        if !value.is_finite() {
            return Err(self.fail_stream(StreamKind::ExternalScalar, "non-finite steering value"));
        }
        // A retained scalar label, not a tensor stream: tracked for
        // freshness but contributes nothing to the valid count
        self.labels.true_steer = Some(value);
        self.set_fresh(StreamKind::ExternalScalar, 0);
        Ok(())
    }

    /// Adopt a new world-to-grid frame and re-rasterize every retained
    /// stream into it. Every channel group must share one frame at all
    /// times; the raw snapshots are kept on the buffer for exactly this.
    fn move_frame(&mut self, frame: GridFrame) {
        if frame == self.frame {
            return;
        }
        self.frame = frame;
        if let Some(map) = &self.latest_map {
            self.tensor.write_map(&self.frame, map);
        }
        self.tensor.write_history(&self.frame, &self.ring);
        self.tensor.write_lanes(&self.frame, &self.latest_lanes);
        let goal = self.goal_coordinate();
        self.tensor.write_goal(&self.frame, goal);
        debug!("[FUSION] grid frame moved, channels re-rasterized");
    }

    fn set_fresh(&mut self, kind: StreamKind, contribution: usize) {
        self.freshness[kind.index()] = FreshnessState {
            has_data: true,
            valid_count_contribution: contribution,
        };
    }

    fn fail_stream(&mut self, kind: StreamKind, reason: impl Into<String>) -> IngestError {
        self.freshness[kind.index()] = FreshnessState::default();
        IngestError::malformed(kind, reason)
    }

    /// Value copy of the derived tensor, safe to use after the gate is
    /// released
    pub fn snapshot_for_inference(&self) -> FusionTensor {
        self.tensor.clone()
    }

    /// Current ground-truth label snapshot
    pub fn labels(&self) -> GroundTruth {
        self.labels
    }

    /// Sum of per-stream freshness contributions
    pub fn aggregate_valid(&self) -> usize {
        self.freshness
            .iter()
            .map(|f| f.valid_count_contribution)
            .sum()
    }

    pub fn freshness(&self, kind: StreamKind) -> FreshnessState {
        self.freshness[kind.index()]
    }

    pub fn history(&self) -> &HistoryRing {
        &self.ring
    }

    /// Newest known ego position, if the main stream has ever delivered
    pub fn current_position(&self) -> Option<(f64, f64)> {
        self.ring.newest().map(|r| (r.ego.x, r.ego.y))
    }

    /// Goal coordinate: the configured fixed goal wins; otherwise the last
    /// point of the most recent plan
    pub fn goal_coordinate(&self) -> Option<(f64, f64)> {
        self.goal
            .coordinate
            .or_else(|| self.latest_plan.last().map(|p| (p.x, p.y)))
    }

    /// True when `current_position` is strictly within `radius` of the goal
    pub fn derive_goal_reached(&self, current_position: (f64, f64)) -> bool {
        let Some(goal) = self.goal_coordinate() else {
            return false;
        };
        euclid_dist(goal, current_position) < self.goal.radius
    }

    /// Goal predicate against the newest ego position; false when either
    /// the position or the goal is unknown
    pub fn goal_reached_now(&self) -> bool {
        match self.current_position() {
            Some(position) => self.derive_goal_reached(position),
            None => false,
        }
    }
}

fn euclid_dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn validate_map(map: &OccupancyGrid) -> Result<(), String> {
    if map.width == 0 || map.height == 0 {
        return Err(format!("zero map dimension {}x{}", map.width, map.height));
    }
    if map.cells.len() != map.width * map.height {
        return Err(format!(
            "cell count {} does not match {}x{}",
            map.cells.len(),
            map.width,
            map.height
        ));
    }
    if !map.resolution.is_finite() || map.resolution <= 0.0 {
        return Err(format!("bad map resolution {}", map.resolution));
    }
    if !map.origin.0.is_finite() || !map.origin.1.is_finite() {
        return Err("non-finite map origin".to_string());
    }
    Ok(())
}

fn validate_agent_frame(frame: &AgentFrame) -> Result<(), String> {
    let ego = &frame.ego;
    if ![ego.x, ego.y, ego.heading, ego.speed]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err("non-finite ego state".to_string());
    }
    for agent in &frame.agents {
        if ![agent.x, agent.y, agent.heading, agent.speed]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(format!("non-finite state for agent {}", agent.id));
        }
    }
    for point in &frame.plan {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err("non-finite plan point".to_string());
        }
    }
    Ok(())
}

fn validate_lanes(points: &[LanePoint]) -> Result<(), String> {
    for point in points {
        if !point.x.is_finite() || !point.y.is_finite() || !point.intensity.is_finite() {
            return Err("non-finite lane point".to_string());
        }
    }
    Ok(())
}
