// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # drivenet - Real-time sensor fusion and control for a learned driving policy
//!
//! drivenet is the controller core of a learned driving stack: asynchronous
//! sensor streams are fused into a fixed-shape tensor, a staleness watchdog
//! halts the vehicle when the required stream dries up, and a periodic
//! control loop runs the decision stage and publishes actuation commands.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! drivenet = "0.1"
//! ```
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drivenet::prelude::*;
//!
//! # struct MyModel;
//! # impl DecisionStage for MyModel {
//! #     fn infer(&self, _input: &FusionTensor) -> Result<DecisionOutput, String> {
//! #         Ok(DecisionOutput::default())
//! #     }
//! # }
//! # struct MyActuator;
//! # impl CommandPublisher for MyActuator {
//! #     fn publish(&self, _command: &DriveCommand) -> Result<(), String> { Ok(()) }
//! # }
//! let config = load_config(None, None)?;
//!
//! let watchdog = Arc::new(StalenessWatchdog::new(config.watchdog.patience_limit));
//! let buffer = FusionBuffer::new(
//!     FusionSettings {
//!         history_length: config.fusion.history_length,
//!         grid_size: config.fusion.grid_size,
//!         grid_span_m: config.fusion.grid_span_m,
//!     },
//!     GoalSettings {
//!         coordinate: config.goal.coordinate.map(|[x, y]| (x, y)),
//!         radius: config.goal.radius,
//!     },
//! );
//! let gate = Arc::new(SynchronizationGate::new(buffer, Arc::clone(&watchdog)));
//!
//! let mut runner = ControlLoopRunner::new(
//!     ControlLoopParts {
//!         gate: Arc::clone(&gate),
//!         watchdog,
//!         decision: Arc::new(MyModel),
//!         publisher: Arc::new(MyActuator),
//!         diagnostics: None,
//!         policy: TickPolicy {
//!             valid_count_threshold: config.fusion.valid_count_threshold,
//!             max_acceleration: config.control.max_acceleration,
//!         },
//!         acceleration_hold_ticks: config.control.acceleration_hold,
//!     },
//!     config.control.frequency_hz,
//! );
//! runner.start()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: drivenet-config                            │
//! │  (TOML config, environment and CLI overrides)           │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Data: drivenet-fusion                                  │
//! │  (Sensor payloads, history ring, fusion tensor)         │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Control: drivenet-control                              │
//! │  (Watchdog, synchronization gate, tick, loop runner)    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Cross-cutting: drivenet-observability                  │
//! │  (tracing setup, per-crate debug flags)                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! - One producer thread per sensor source, one consumer thread for the
//!   control loop
//! - A single mutex plus a phase flag arbitrate the fusion buffer;
//!   producers skip rather than block while a read is in progress
//! - The decision stage always runs outside the critical section
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
pub use drivenet_config as config;

// Re-export data layer
pub use drivenet_fusion as fusion;

// Re-export control layer
pub use drivenet_control as control;

// Re-export observability
pub use drivenet_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, ControllerConfig};
    pub use crate::control::{
        run_tick, AccelerationHold, CommandPublisher, ControlLoopParts, ControlLoopRunner,
        DecisionOutput, DecisionStage, DiagnosticsSink, DriveCommand, GatePhase, IngestOutcome,
        RateLimiter, ReadGuard, SensorTransport, SourceConfig, SourceManager, StalenessWatchdog,
        SynchronizationGate, TickOutcome, TickPolicy, WatchdogPhase,
    };
    pub use crate::fusion::{
        ActionLabels, AgentFrame, AgentState, ChannelLayout, EgoState, FusionBuffer,
        FusionSettings, FusionTensor, GoalSettings, GroundTruth, HistoryRing, IngestError,
        LanePoint, OccupancyGrid, PlanPoint, SensorPayload, StreamKind,
    };
    pub use crate::observability::{init_logging, CrateDebugFlags};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        // Just test that re-exports work
        use crate::prelude::*;
        let _kind = StreamKind::Map;
        let _cmd = DriveCommand::terminal(3.0);
    }
}
