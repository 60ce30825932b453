// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Stream kinds and raw sensor payloads
//!
//! The set of fused streams is closed and known at compile time, so payloads
//! are a tagged union rather than a string-keyed container. The transport
//! that delivers a payload (message bus, socket, file replay) is out of
//! scope; only the reduced shape matters here.

use serde::{Deserialize, Serialize};

/// One of the fused sensor categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamKind {
    /// Static occupancy map
    Map = 0,
    /// Per-timestep ego + neighboring-agent record (the main data stream)
    AgentHistory = 1,
    /// Lane polyline points with intensities
    LaneSet = 2,
    /// Externally-estimated steering scalar
    ExternalScalar = 3,
}

impl StreamKind {
    /// All kinds, in channel-group order
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Map,
        StreamKind::AgentHistory,
        StreamKind::LaneSet,
        StreamKind::ExternalScalar,
    ];

    /// Dense index for per-stream bookkeeping arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether a producer of this kind skips (rather than blocks) while the
    /// consumer holds the gate closed for a read
    pub fn skip_when_gated(self) -> bool {
        matches!(self, StreamKind::AgentHistory | StreamKind::ExternalScalar)
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Map => "map",
            StreamKind::AgentHistory => "agent-history",
            StreamKind::LaneSet => "lane-set",
            StreamKind::ExternalScalar => "external-scalar",
        }
    }
}

/// Occupancy-grid-like raw map payload (row-major cells, -1 = unknown,
/// 0..=100 = occupancy probability in percent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyGrid {
    pub width: usize,
    pub height: usize,
    /// Meters per cell
    pub resolution: f64,
    /// World coordinate of cell (0, 0)
    pub origin: (f64, f64),
    pub cells: Vec<i8>,
}

/// Ego vehicle state at one timestep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EgoState {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub speed: f64,
}

/// Neighboring agent state at one timestep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub speed: f64,
}

/// One point of the current path plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanPoint {
    pub x: f64,
    pub y: f64,
}

/// Ground-truth action labels carried alongside the main data stream
/// (used for diagnostics only, never for control)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLabels {
    pub steering_normalized: Option<f32>,
    pub acceleration: Option<f32>,
    pub target_speed: Option<f32>,
    pub lane_change: Option<i32>,
}

/// Complete per-timestep record delivered on the main data stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFrame {
    pub ego: EgoState,
    pub agents: Vec<AgentState>,
    /// Current path plan; its last point doubles as the goal when no fixed
    /// goal coordinate is configured
    pub plan: Vec<PlanPoint>,
    pub labels: ActionLabels,
}

/// One lane polyline point with rasterization intensity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanePoint {
    pub x: f64,
    pub y: f64,
    pub intensity: f32,
}

/// Tagged union over stream kinds; immutable once ingested, superseded
/// atomically by the next payload of the same kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SensorPayload {
    Map(OccupancyGrid),
    AgentHistory(AgentFrame),
    LaneSet(Vec<LanePoint>),
    ExternalScalar(f32),
}

impl SensorPayload {
    pub fn kind(&self) -> StreamKind {
        match self {
            SensorPayload::Map(_) => StreamKind::Map,
            SensorPayload::AgentHistory(_) => StreamKind::AgentHistory,
            SensorPayload::LaneSet(_) => StreamKind::LaneSet,
            SensorPayload::ExternalScalar(_) => StreamKind::ExternalScalar,
        }
    }
}
