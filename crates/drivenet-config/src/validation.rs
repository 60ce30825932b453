// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Catch unrecoverable configuration errors at startup, before any thread
//! is spawned. This is the only place a bad value is allowed to be fatal.

use crate::types::ControllerConfig;

/// Validation error for a specific configuration field
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("control.frequency_hz must be finite and > 0, got {0}")]
    InvalidFrequency(f64),

    #[error("control.max_acceleration must be finite and > 0, got {0}")]
    InvalidMaxAcceleration(f32),

    #[error("fusion.history_length must be >= 1, got {0}")]
    InvalidHistoryLength(usize),

    #[error("fusion.grid_size must be >= 2, got {0}")]
    InvalidGridSize(usize),

    #[error("fusion.grid_span_m must be finite and > 0, got {0}")]
    InvalidGridSpan(f64),

    #[error("fusion.valid_count_threshold must be >= 1, got {0}")]
    InvalidValidCountThreshold(usize),

    #[error("watchdog.patience_limit must be >= 1, got {0}")]
    InvalidPatienceLimit(u32),

    #[error("goal.radius must be finite and > 0, got {0}")]
    InvalidGoalRadius(f64),

    #[error("goal.coordinate must be finite, got ({0}, {1})")]
    InvalidGoalCoordinate(f64, f64),
}

/// Validate a fully-assembled configuration
pub fn validate_config(config: &ControllerConfig) -> Result<(), ConfigValidationError> {
    let freq = config.control.frequency_hz;
    if !freq.is_finite() || freq <= 0.0 {
        return Err(ConfigValidationError::InvalidFrequency(freq));
    }

    let max_acc = config.control.max_acceleration;
    if !max_acc.is_finite() || max_acc <= 0.0 {
        return Err(ConfigValidationError::InvalidMaxAcceleration(max_acc));
    }

    if config.fusion.history_length < 1 {
        return Err(ConfigValidationError::InvalidHistoryLength(
            config.fusion.history_length,
        ));
    }

    if config.fusion.grid_size < 2 {
        return Err(ConfigValidationError::InvalidGridSize(
            config.fusion.grid_size,
        ));
    }

    let span = config.fusion.grid_span_m;
    if !span.is_finite() || span <= 0.0 {
        return Err(ConfigValidationError::InvalidGridSpan(span));
    }

    if config.fusion.valid_count_threshold < 1 {
        return Err(ConfigValidationError::InvalidValidCountThreshold(
            config.fusion.valid_count_threshold,
        ));
    }

    if config.watchdog.patience_limit < 1 {
        return Err(ConfigValidationError::InvalidPatienceLimit(
            config.watchdog.patience_limit,
        ));
    }

    let radius = config.goal.radius;
    if !radius.is_finite() || radius <= 0.0 {
        return Err(ConfigValidationError::InvalidGoalRadius(radius));
    }

    if let Some([x, y]) = config.goal.coordinate {
        if !x.is_finite() || !y.is_finite() {
            return Err(ConfigValidationError::InvalidGoalCoordinate(x, y));
        }
    }

    Ok(())
}
