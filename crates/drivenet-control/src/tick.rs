// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! One control tick, start to finish
//!
//! `run_tick` is the unit the runner schedules. Its phase order is the
//! core safety contract of the controller:
//!
//! 1. Watchdog check (advances the patience clock, at most once per tick)
//! 2. Gated read: readiness, goal test, tensor snapshot, label snapshot
//! 3. Gate released BEFORE inference — the decision stage never runs
//!    under the mutex
//! 4. Acceleration hold, publish, best-effort diagnostics
//!
//! Terminal publications happen inside the gated section so that no
//! regular command can interleave after a stop decision.

use crate::gate::SynchronizationGate;
use crate::interfaces::{CommandPublisher, DecisionStage, DiagnosticsSink, DriveCommand};
use crate::watchdog::StalenessWatchdog;
use tracing::{debug, error, info, warn};

/// Per-run constants of the tick
#[derive(Debug, Clone, Copy)]
pub struct TickPolicy {
    /// Streams that must be fresh before inference may run
    pub valid_count_threshold: usize,
    /// Braking magnitude of the terminal command, m/s^2
    pub max_acceleration: f32,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Watchdog declared the data supply dead; the runner must stop
    SupplyLost,
    /// Not enough fresh streams yet; nothing published
    NotReady,
    /// Goal radius entered; terminal command published
    GoalReached,
    /// Regular tick: inference ran and this command went out
    Commanded(DriveCommand),
    /// Inference or publication failed; nothing actuated this tick
    Faulted,
}

/// Decimating low-pass on the acceleration channel: a freshly inferred
/// value is adopted every `hold_ticks + 1` ticks and held in between.
/// Smooths the throttle without adding steering latency.
#[derive(Debug)]
pub struct AccelerationHold {
    hold_ticks: u32,
    countdown: u32,
    held: f32,
}

impl AccelerationHold {
    pub fn new(hold_ticks: u32) -> Self {
        Self {
            hold_ticks,
            countdown: 0,
            held: 0.0,
        }
    }

    /// Feed one fresh acceleration, get back the value to actuate
    pub fn apply(&mut self, fresh: f32) -> f32 {
        if self.countdown == self.hold_ticks {
            self.held = fresh;
            self.countdown = 0;
            fresh
        } else {
            self.countdown += 1;
            self.held
        }
    }
}

/// Execute one control tick. See the module docs for the phase order.
#[allow(clippy::too_many_arguments)]
pub fn run_tick(
    gate: &SynchronizationGate,
    watchdog: &StalenessWatchdog,
    decision: &dyn DecisionStage,
    publisher: &dyn CommandPublisher,
    diagnostics: Option<&dyn DiagnosticsSink>,
    policy: &TickPolicy,
    hold: &mut AccelerationHold,
    tick: u64,
) -> TickOutcome {
    if !watchdog.check_alive() {
        return TickOutcome::SupplyLost;
    }

    let guard = gate.begin_read();

    let valid = guard.aggregate_valid();
    if valid < policy.valid_count_threshold {
        debug!(
            "[TICK] {} waiting for data ({}/{} streams fresh)",
            tick, valid, policy.valid_count_threshold
        );
        return TickOutcome::NotReady;
    }

    if guard.goal_reached_now() {
        let stop = DriveCommand::terminal(policy.max_acceleration);
        info!("[TICK] {} goal reached, publishing terminal command", tick);
        if let Err(reason) = publisher.publish_terminal(&stop) {
            error!("[TICK] {} terminal publish failed: {}", tick, reason);
        }
        return TickOutcome::GoalReached;
    }

    let input = guard.snapshot_for_inference();
    let truth = guard.labels();
    guard.release();

    // Gate is open again; producers run while the model evaluates
    let output = match decision.infer(&input) {
        Ok(output) => output,
        Err(reason) => {
            error!("[TICK] {} decision stage failed: {}", tick, reason);
            return TickOutcome::Faulted;
        }
    };

    let mut command = DriveCommand::from(output);
    command.acceleration = hold.apply(command.acceleration);

    if let Err(reason) = publisher.publish(&command) {
        error!("[TICK] {} publish failed: {}", tick, reason);
        return TickOutcome::Faulted;
    }

    if let Some(sink) = diagnostics {
        if let Err(reason) = sink.record_tick(tick, &command, &truth) {
            warn!("[TICK] {} diagnostics dropped: {}", tick, reason);
        }
    }

    TickOutcome::Commanded(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::DecisionOutput;
    use drivenet_fusion::{
        ActionLabels, AgentFrame, EgoState, FusionBuffer, FusionSettings, FusionTensor,
        GoalSettings, GroundTruth, LanePoint, OccupancyGrid, SensorPayload,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FixedDecision {
        output: DecisionOutput,
        calls: AtomicUsize,
    }

    impl FixedDecision {
        fn new(output: DecisionOutput) -> Self {
            Self {
                output,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DecisionStage for FixedDecision {
        fn infer(&self, _input: &FusionTensor) -> Result<DecisionOutput, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output)
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<DriveCommand>>,
        terminals: Mutex<Vec<DriveCommand>>,
    }

    impl CommandPublisher for RecordingPublisher {
        fn publish(&self, command: &DriveCommand) -> Result<(), String> {
            self.published.lock().unwrap().push(*command);
            Ok(())
        }

        fn publish_terminal(&self, command: &DriveCommand) -> Result<(), String> {
            self.terminals.lock().unwrap().push(*command);
            Ok(())
        }
    }

    struct FailingDecision;

    impl DecisionStage for FailingDecision {
        fn infer(&self, _input: &FusionTensor) -> Result<DecisionOutput, String> {
            Err("backend offline".to_string())
        }
    }

    fn settings() -> FusionSettings {
        FusionSettings {
            history_length: 1,
            grid_size: 16,
            grid_span_m: 16.0,
        }
    }

    fn frame_at(x: f64, y: f64) -> SensorPayload {
        SensorPayload::AgentHistory(AgentFrame {
            ego: EgoState {
                x,
                y,
                heading: 0.0,
                speed: 5.0,
            },
            agents: Vec::new(),
            plan: Vec::new(),
            labels: ActionLabels::default(),
        })
    }

    fn flat_map() -> SensorPayload {
        SensorPayload::Map(OccupancyGrid {
            width: 16,
            height: 16,
            resolution: 1.0,
            origin: (-8.0, -8.0),
            cells: vec![0; 256],
        })
    }

    fn lanes() -> SensorPayload {
        SensorPayload::LaneSet(vec![LanePoint {
            x: 0.0,
            y: 2.0,
            intensity: 1.0,
        }])
    }

    fn ready_gate(goal: GoalSettings) -> SynchronizationGate {
        let watchdog = Arc::new(StalenessWatchdog::new(10));
        let gate = SynchronizationGate::new(FusionBuffer::new(settings(), goal), watchdog);
        gate.ingest(flat_map()).unwrap();
        gate.ingest(frame_at(0.0, 0.0)).unwrap();
        gate.ingest(lanes()).unwrap();
        gate
    }

    fn policy() -> TickPolicy {
        TickPolicy {
            valid_count_threshold: 3,
            max_acceleration: 3.0,
        }
    }

    #[test]
    fn not_ready_until_threshold_streams_fresh() {
        let watchdog = Arc::new(StalenessWatchdog::new(10));
        let gate = SynchronizationGate::new(
            FusionBuffer::new(settings(), GoalSettings::default()),
            Arc::clone(&watchdog),
        );
        gate.ingest(frame_at(0.0, 0.0)).unwrap();

        let decision = FixedDecision::new(DecisionOutput::default());
        let publisher = RecordingPublisher::default();
        let mut hold = AccelerationHold::new(0);

        let outcome = run_tick(
            &gate, &watchdog, &decision, &publisher, None, &policy(), &mut hold, 1,
        );
        assert_eq!(outcome, TickOutcome::NotReady);
        assert_eq!(decision.calls.load(Ordering::SeqCst), 0);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[test]
    fn ready_tick_infers_and_publishes() {
        let gate = ready_gate(GoalSettings {
            coordinate: Some((100.0, 100.0)),
            radius: 1.3,
        });
        let watchdog = Arc::clone(gate.watchdog());
        let decision = FixedDecision::new(DecisionOutput {
            steering: 0.1,
            acceleration: 2.0,
            target_speed: Some(8.0),
            lane: 0,
        });
        let publisher = RecordingPublisher::default();
        let mut hold = AccelerationHold::new(0);

        let outcome = run_tick(
            &gate, &watchdog, &decision, &publisher, None, &policy(), &mut hold, 1,
        );
        match outcome {
            TickOutcome::Commanded(cmd) => {
                assert_eq!(cmd.steering, 0.1);
                assert_eq!(cmd.acceleration, 2.0);
                assert_eq!(cmd.velocity, Some(8.0));
            }
            other => panic!("expected Commanded, got {other:?}"),
        }
        assert_eq!(decision.calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
        assert_eq!(gate.phase(), crate::gate::GatePhase::Open);
    }

    #[test]
    fn goal_reached_publishes_terminal_and_skips_inference() {
        // Ego at origin, goal 1.0m away: inside the 1.3m radius
        let gate = ready_gate(GoalSettings {
            coordinate: Some((1.0, 0.0)),
            radius: 1.3,
        });
        let watchdog = Arc::clone(gate.watchdog());
        let decision = FixedDecision::new(DecisionOutput::default());
        let publisher = RecordingPublisher::default();
        let mut hold = AccelerationHold::new(0);

        let outcome = run_tick(
            &gate, &watchdog, &decision, &publisher, None, &policy(), &mut hold, 1,
        );
        assert_eq!(outcome, TickOutcome::GoalReached);
        assert_eq!(decision.calls.load(Ordering::SeqCst), 0);

        let terminals = publisher.terminals.lock().unwrap();
        assert_eq!(terminals.len(), 1);
        assert_eq!(terminals[0], DriveCommand::terminal(3.0));
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_inference_faults_without_publishing() {
        let gate = ready_gate(GoalSettings {
            coordinate: Some((100.0, 100.0)),
            radius: 1.3,
        });
        let watchdog = Arc::clone(gate.watchdog());
        let publisher = RecordingPublisher::default();
        let mut hold = AccelerationHold::new(0);

        let outcome = run_tick(
            &gate,
            &watchdog,
            &FailingDecision,
            &publisher,
            None,
            &policy(),
            &mut hold,
            1,
        );
        assert_eq!(outcome, TickOutcome::Faulted);
        assert!(publisher.published.lock().unwrap().is_empty());
        // A fault must not leave the gate closed
        assert_eq!(gate.phase(), crate::gate::GatePhase::Open);
    }

    #[test]
    fn diagnostics_failures_do_not_fault_the_tick() {
        struct BadSink;
        impl DiagnosticsSink for BadSink {
            fn record_tick(
                &self,
                _tick: u64,
                _command: &DriveCommand,
                _truth: &GroundTruth,
            ) -> Result<(), String> {
                Err("disk full".to_string())
            }
        }

        let gate = ready_gate(GoalSettings {
            coordinate: Some((100.0, 100.0)),
            radius: 1.3,
        });
        let watchdog = Arc::clone(gate.watchdog());
        let decision = FixedDecision::new(DecisionOutput::default());
        let publisher = RecordingPublisher::default();
        let mut hold = AccelerationHold::new(0);

        let outcome = run_tick(
            &gate,
            &watchdog,
            &decision,
            &publisher,
            Some(&BadSink),
            &policy(),
            &mut hold,
            1,
        );
        assert!(matches!(outcome, TickOutcome::Commanded(_)));
    }

    #[test]
    fn acceleration_hold_decimates_the_throttle() {
        let mut hold = AccelerationHold::new(2);
        // Initial held value is 0.0 until the first adoption window
        assert_eq!(hold.apply(5.0), 0.0);
        assert_eq!(hold.apply(6.0), 0.0);
        assert_eq!(hold.apply(7.0), 7.0); // adopted
        assert_eq!(hold.apply(8.0), 7.0);
        assert_eq!(hold.apply(9.0), 7.0);
        assert_eq!(hold.apply(1.0), 1.0); // adopted
    }

    #[test]
    fn zero_hold_passes_every_value_through() {
        let mut hold = AccelerationHold::new(0);
        assert_eq!(hold.apply(1.0), 1.0);
        assert_eq!(hold.apply(2.0), 2.0);
    }
}
