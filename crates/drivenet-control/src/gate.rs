// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synchronization gate: one mutex plus an explicit phase machine
//!
//! The gate arbitrates access to the fusion buffer between N producer
//! threads and the single periodic consumer. The locking discipline:
//!
//! - One `parking_lot::Mutex` serializes every mutation and the
//!   read-for-inference snapshot.
//! - A `GatePhase` atomic (`Open` / `WriteInProgress` / `ReadInProgress`)
//!   replaces the ad-hoc boolean latches of earlier revisions. Only the
//!   consumer sets `ReadInProgress`; producers observe it and skip rather
//!   than block, so a slow tick never backpressures a sensor driver.
//! - All releases are RAII; dropping a guard on any exit path (including a
//!   panic) restores the phase and unlocks.
//!
//! A skipped main-stream payload still resets the watchdog clock: a
//! legitimately-busy consumer must not register as sensor staleness. This
//! alive-but-dropped policy is inherited from the deployed controller.

use crate::watchdog::StalenessWatchdog;
use drivenet_fusion::{FusionBuffer, IngestError, SensorPayload, StreamKind};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

const OPEN: u8 = 0;
const WRITE_IN_PROGRESS: u8 = 1;
const READ_IN_PROGRESS: u8 = 2;

/// Gate phase as observed by producers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GatePhase {
    Open = OPEN,
    WriteInProgress = WRITE_IN_PROGRESS,
    ReadInProgress = READ_IN_PROGRESS,
}

/// What happened to an offered payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Payload committed to the buffer
    Committed,
    /// Gate was closed for a read; payload dropped by design. Steady-state
    /// behavior under contention, not a failure.
    Skipped,
}

/// One mutex + phase machine guarding the fusion buffer and watchdog resets
pub struct SynchronizationGate {
    phase: AtomicU8,
    buffer: Mutex<FusionBuffer>,
    watchdog: Arc<StalenessWatchdog>,
}

impl SynchronizationGate {
    pub fn new(buffer: FusionBuffer, watchdog: Arc<StalenessWatchdog>) -> Self {
        Self {
            phase: AtomicU8::new(OPEN),
            buffer: Mutex::new(buffer),
            watchdog,
        }
    }

    pub fn phase(&self) -> GatePhase {
        match self.phase.load(Ordering::Acquire) {
            WRITE_IN_PROGRESS => GatePhase::WriteInProgress,
            READ_IN_PROGRESS => GatePhase::ReadInProgress,
            _ => GatePhase::Open,
        }
    }

    /// Producer entry point. Skippable kinds return `Skipped` immediately
    /// while a read is in progress; everything else serializes on the mutex.
    ///
    /// The phase check and the lock acquisition are two separate steps: a
    /// skippable producer that passes the check just as the consumer closes
    /// the gate blocks on the mutex for that read phase instead of skipping.
    /// Accepted: the window is one read phase at most, and the lock is never
    /// held across the decision-stage call.
    pub fn ingest(&self, payload: SensorPayload) -> Result<IngestOutcome, IngestError> {
        let kind = payload.kind();

        if kind.skip_when_gated() && self.phase() == GatePhase::ReadInProgress {
            if kind == StreamKind::AgentHistory {
                // Data arrived but was dropped: the supply is alive
                self.watchdog.note_data_arrival();
            }
            debug!("[GATE] {} payload skipped, read in progress", kind.name());
            return Ok(IngestOutcome::Skipped);
        }

        let mut buffer = self.buffer.lock();
        let _ = self.phase.compare_exchange(
            OPEN,
            WRITE_IN_PROGRESS,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let result = buffer.ingest(payload);
        if result.is_ok() && kind == StreamKind::AgentHistory {
            self.watchdog.note_data_arrival();
        }

        // Leave ReadInProgress alone if the consumer closed the gate while
        // we held the lock; it is already waiting on the mutex
        let _ = self.phase.compare_exchange(
            WRITE_IN_PROGRESS,
            OPEN,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        drop(buffer);

        result.map(|_| IngestOutcome::Committed)
    }

    /// Consumer entry point: close the gate to skippable producers, then
    /// take the lock. Producers already inside the mutex finish first.
    pub fn begin_read(&self) -> ReadGuard<'_> {
        self.phase.store(READ_IN_PROGRESS, Ordering::Release);
        ReadGuard {
            gate: self,
            inner: Some(self.buffer.lock()),
        }
    }

    pub fn watchdog(&self) -> &Arc<StalenessWatchdog> {
        &self.watchdog
    }
}

/// RAII read-phase guard; dropping it releases the lock and reopens the
/// gate, on every exit path. Release is idempotent.
pub struct ReadGuard<'a> {
    gate: &'a SynchronizationGate,
    inner: Option<MutexGuard<'a, FusionBuffer>>,
}

impl std::ops::Deref for ReadGuard<'_> {
    type Target = FusionBuffer;

    fn deref(&self) -> &Self::Target {
        // Invariant: inner is Some until drop
        self.inner.as_ref().unwrap()
    }
}

impl ReadGuard<'_> {
    /// Explicit release; equivalent to dropping the guard
    pub fn release(self) {}
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            self.gate.phase.store(OPEN, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivenet_fusion::{
        ActionLabels, AgentFrame, EgoState, FusionSettings, GoalSettings, LanePoint,
    };
    use std::sync::Arc;

    fn gate_with(patience: u32) -> SynchronizationGate {
        let buffer = FusionBuffer::new(
            FusionSettings {
                history_length: 2,
                grid_size: 16,
                grid_span_m: 16.0,
            },
            GoalSettings::default(),
        );
        SynchronizationGate::new(buffer, Arc::new(StalenessWatchdog::new(patience)))
    }

    fn history_payload() -> SensorPayload {
        SensorPayload::AgentHistory(AgentFrame {
            ego: EgoState {
                x: 0.0,
                y: 0.0,
                heading: 0.0,
                speed: 1.0,
            },
            agents: Vec::new(),
            plan: Vec::new(),
            labels: ActionLabels::default(),
        })
    }

    #[test]
    fn open_gate_commits() {
        let gate = gate_with(10);
        let outcome = gate.ingest(history_payload()).unwrap();
        assert_eq!(outcome, IngestOutcome::Committed);
        assert_eq!(gate.phase(), GatePhase::Open);
    }

    #[test]
    fn read_guard_reopens_on_drop() {
        let gate = gate_with(10);
        gate.ingest(history_payload()).unwrap();

        let guard = gate.begin_read();
        assert_eq!(gate.phase(), GatePhase::ReadInProgress);
        drop(guard);
        assert_eq!(gate.phase(), GatePhase::Open);

        let guard = gate.begin_read();
        guard.release();
        assert_eq!(gate.phase(), GatePhase::Open);
    }

    #[test]
    fn skipped_main_payload_still_resets_watchdog() {
        let gate = Arc::new(gate_with(10));
        gate.ingest(history_payload()).unwrap();

        // Burn most of the patience budget
        for _ in 0..8 {
            assert!(gate.watchdog().check_alive());
        }

        let guard = gate.begin_read();
        let producer = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || gate.ingest(history_payload()).unwrap())
        };
        let outcome = producer.join().unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped);
        drop(guard);

        // Clock was reset by the skipped arrival
        for _ in 0..9 {
            assert!(gate.watchdog().check_alive());
        }
    }

    #[test]
    fn blocking_kinds_commit_during_read_after_release() {
        let gate = Arc::new(gate_with(10));
        let guard = gate.begin_read();

        let producer = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                // LaneSet does not skip: this blocks until the guard drops
                gate.ingest(SensorPayload::LaneSet(vec![LanePoint {
                    x: 1.0,
                    y: 1.0,
                    intensity: 1.0,
                }]))
                .unwrap()
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        drop(guard);
        assert_eq!(producer.join().unwrap(), IngestOutcome::Committed);
    }

    #[test]
    fn failed_ingest_reports_and_reopens() {
        let gate = gate_with(10);
        let err = gate
            .ingest(SensorPayload::ExternalScalar(f32::NAN))
            .unwrap_err();
        assert_eq!(err.kind(), StreamKind::ExternalScalar);
        assert_eq!(gate.phase(), GatePhase::Open);
    }
}
