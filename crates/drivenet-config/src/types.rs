// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `drivenet_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub control: ControlConfig,
    pub fusion: FusionConfig,
    pub watchdog: WatchdogConfig,
    pub goal: GoalConfig,
    pub logging: LoggingConfig,
}

/// Control loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Tick frequency in Hz
    pub frequency_hz: f64,
    /// A freshly inferred acceleration is adopted every `acceleration_hold + 1`
    /// ticks; the held value is republished in between
    pub acceleration_hold: u32,
    /// Magnitude of the full-brake acceleration used in the terminal command
    pub max_acceleration: f32,
}

impl ControlConfig {
    /// Tick period derived from the configured frequency
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 10.0,
            acceleration_hold: 0,
            max_acceleration: 3.0,
        }
    }
}

/// Fusion buffer / tensor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Number of past timesteps kept in the history ring
    pub history_length: usize,
    /// Side length of the square fusion grid, in cells
    pub grid_size: usize,
    /// World-space extent covered by the grid, in meters
    pub grid_span_m: f64,
    /// Inference is gated until this many stream kinds are fresh
    pub valid_count_threshold: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            history_length: 4,
            grid_size: 32,
            grid_span_m: 40.0,
            valid_count_threshold: 3,
        }
    }
}

/// Staleness watchdog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Consecutive no-data ticks tolerated before the data supply is
    /// declared broken
    pub patience_limit: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { patience_limit: 10 }
    }
}

/// Goal predicate configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GoalConfig {
    /// Fixed goal coordinate `[x, y]`. When unset, the goal is taken from
    /// the last point of the most recent plan.
    pub coordinate: Option<[f64; 2]>,
    /// Goal-reached distance threshold in meters. Design constant inherited
    /// from the deployed controller, not derived from sensor noise; tune
    /// per vehicle footprint.
    pub radius: f64,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            coordinate: None,
            radius: 1.3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Base directory for file logging (None = console only)
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}
