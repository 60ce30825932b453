// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable seams of the control loop
//!
//! The loop itself is transport- and model-agnostic: the decision stage,
//! the command publisher and the diagnostics sink are trait objects wired
//! in at startup. All three are `Send + Sync` because the runner thread
//! owns them across tick boundaries.

use drivenet_fusion::{FusionTensor, GroundTruth};

/// Output of one decision-stage evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecisionOutput {
    /// Normalized steering in [-1, 1]
    pub steering: f32,
    /// Longitudinal acceleration in m/s^2
    pub acceleration: f32,
    /// Target speed, when the stage produces one
    pub target_speed: Option<f32>,
    /// Lane-change intent (-1 left, 0 keep, 1 right)
    pub lane: i32,
}

/// Actuation command as handed to the publisher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    pub acceleration: f32,
    pub steering: f32,
    pub lane: i32,
    pub velocity: Option<f32>,
}

impl DriveCommand {
    /// Full-stop command: maximum braking, wheel centered, keep lane.
    /// Published when the goal is reached or the data supply dies.
    pub fn terminal(max_acceleration: f32) -> Self {
        Self {
            acceleration: -max_acceleration.abs(),
            steering: 0.0,
            lane: 0,
            velocity: None,
        }
    }
}

impl From<DecisionOutput> for DriveCommand {
    fn from(output: DecisionOutput) -> Self {
        Self {
            acceleration: output.acceleration,
            steering: output.steering,
            lane: output.lane,
            velocity: output.target_speed,
        }
    }
}

/// Inference backend evaluated once per ready tick, outside the gate
pub trait DecisionStage: Send + Sync {
    fn infer(&self, input: &FusionTensor) -> Result<DecisionOutput, String>;
}

/// Actuation output of the loop
pub trait CommandPublisher: Send + Sync {
    fn publish(&self, command: &DriveCommand) -> Result<(), String>;

    /// Terminal (full-stop) publication. Separate entry point so transports
    /// can route it at higher priority than the periodic stream.
    fn publish_terminal(&self, command: &DriveCommand) -> Result<(), String> {
        self.publish(command)
    }
}

/// Best-effort per-tick telemetry; failures are logged, never fatal
pub trait DiagnosticsSink: Send + Sync {
    fn record_tick(
        &self,
        tick: u64,
        command: &DriveCommand,
        truth: &GroundTruth,
    ) -> Result<(), String>;

    fn flush(&self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_command_is_full_brake() {
        let cmd = DriveCommand::terminal(3.0);
        assert_eq!(cmd.acceleration, -3.0);
        assert_eq!(cmd.steering, 0.0);
        assert_eq!(cmd.lane, 0);
        assert_eq!(cmd.velocity, None);

        // Sign of the configured limit must not matter
        assert_eq!(DriveCommand::terminal(-3.0).acceleration, -3.0);
    }

    #[test]
    fn decision_output_maps_onto_command() {
        let cmd: DriveCommand = DecisionOutput {
            steering: 0.25,
            acceleration: 1.5,
            target_speed: Some(12.0),
            lane: -1,
        }
        .into();
        assert_eq!(cmd.steering, 0.25);
        assert_eq!(cmd.acceleration, 1.5);
        assert_eq!(cmd.velocity, Some(12.0));
        assert_eq!(cmd.lane, -1);
    }
}
