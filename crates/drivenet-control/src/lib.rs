// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # drivenet Control
//!
//! Concurrency layer of the drivenet controller: the mutual-exclusion gate
//! shared by producer threads and the periodic consumer, the staleness
//! watchdog that halts the system when a required stream dries up, and the
//! control loop runner itself.
//!
//! ## Design
//! - One mutex serializes every buffer mutation and the read-for-inference
//!   snapshot; it is never held across the decision-stage call
//! - Producers skip (never block) when the gate is closed for a read;
//!   bounded producer latency is preferred over guaranteed delivery
//! - Shutdown is cooperative: the watchdog flips a flag, the loop observes
//!   it at the top of the next period and stops scheduling ticks

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod gate;
pub mod interfaces;
pub mod rate_limiter;
pub mod runner;
pub mod sources;
pub mod tick;
pub mod watchdog;

pub use gate::{GatePhase, IngestOutcome, ReadGuard, SynchronizationGate};
pub use interfaces::{
    CommandPublisher, DecisionOutput, DecisionStage, DiagnosticsSink, DriveCommand,
};
pub use rate_limiter::RateLimiter;
pub use runner::{ControlLoopParts, ControlLoopRunner};
pub use sources::{SensorTransport, SourceConfig, SourceManager};
pub use tick::{run_tick, AccelerationHold, TickOutcome, TickPolicy};
pub use watchdog::{StalenessWatchdog, WatchdogPhase};
