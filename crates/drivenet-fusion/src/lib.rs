// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # drivenet Fusion
//!
//! Data layer of the drivenet controller: raw sensor snapshots, the
//! per-timestep history ring, and the fixed-shape fusion tensor fed to the
//! decision stage.
//!
//! ## Architecture
//! - One closed set of stream kinds (map, agent history, lane set, external
//!   steering scalar); each kind owns a disjoint channel group of the tensor
//! - `FusionBuffer` is the single owner of all mutable state; it exposes
//!   ingest operations and a value-copy snapshot for inference
//! - No locking here: mutual exclusion is the job of the synchronization
//!   gate in `drivenet-control`

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod buffer;
pub mod error;
pub mod history;
pub mod stream;
pub mod tensor;

pub use buffer::{FreshnessState, FusionBuffer, FusionSettings, GoalSettings, GroundTruth};
pub use error::IngestError;
pub use history::{HistoryRecord, HistoryRing, HistorySlot};
pub use stream::{
    ActionLabels, AgentFrame, AgentState, EgoState, LanePoint, OccupancyGrid, PlanPoint,
    SensorPayload, StreamKind,
};
pub use tensor::{ChannelLayout, FusionTensor, GridFrame};
