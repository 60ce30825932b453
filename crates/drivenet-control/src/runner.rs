// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Periodic control loop runner
//!
//! Owns the dedicated control thread. Each period it executes one tick
//! (watchdog, gated read, inference, publish) and then sleeps the
//! remainder of the period in short chunks so shutdown stays responsive.
//!
//! On `SupplyLost` the loop publishes exactly one terminal command,
//! flushes diagnostics and exits on its own; `stop()` covers the
//! cooperative shutdown path from outside.

use crate::gate::SynchronizationGate;
use crate::interfaces::{CommandPublisher, DecisionStage, DiagnosticsSink, DriveCommand};
use crate::tick::{run_tick, AccelerationHold, TickOutcome, TickPolicy};
use crate::watchdog::StalenessWatchdog;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const SLEEP_CHUNK: Duration = Duration::from_millis(50);
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything the loop needs per tick, bundled for the worker thread
pub struct ControlLoopParts {
    pub gate: Arc<SynchronizationGate>,
    pub watchdog: Arc<StalenessWatchdog>,
    pub decision: Arc<dyn DecisionStage>,
    pub publisher: Arc<dyn CommandPublisher>,
    pub diagnostics: Option<Arc<dyn DiagnosticsSink>>,
    pub policy: TickPolicy,
    pub acceleration_hold_ticks: u32,
}

pub struct ControlLoopRunner {
    parts: Option<ControlLoopParts>,
    period: Arc<Mutex<Duration>>,
    running: Arc<AtomicBool>,
    tick_count: Arc<AtomicU64>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ControlLoopRunner {
    pub fn new(parts: ControlLoopParts, frequency_hz: f64) -> Self {
        let period = if frequency_hz > 0.0 {
            Duration::from_secs_f64(1.0 / frequency_hz)
        } else {
            Duration::from_millis(100)
        };
        Self {
            parts: Some(parts),
            period: Arc::new(Mutex::new(period)),
            running: Arc::new(AtomicBool::new(false)),
            tick_count: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    /// Spawn the control thread. One start per runner.
    pub fn start(&mut self) -> Result<(), String> {
        if self.running.load(Ordering::Acquire) {
            return Err("control loop is already running".to_string());
        }
        let parts = self
            .parts
            .take()
            .ok_or_else(|| "control loop was already started once".to_string())?;

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let period = Arc::clone(&self.period);
        let tick_count = Arc::clone(&self.tick_count);

        let handle = thread::Builder::new()
            .name("drivenet-control-loop".to_string())
            .spawn(move || {
                control_loop(parts, period, running, tick_count);
            })
            .map_err(|e| format!("failed to spawn control loop thread: {e}"))?;

        self.handle = Some(handle);
        info!("[CONTROL-LOOP] started");
        Ok(())
    }

    /// Request a cooperative stop and join the thread, bounded by a
    /// timeout so a wedged publisher cannot hang shutdown.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return;
        };

        // JoinHandle has no timed join; wait on a detached helper instead
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let outcome = handle.join();
            let _ = tx.send(outcome.is_ok());
        });

        match rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(true) => info!("[CONTROL-LOOP] stopped"),
            Ok(false) => warn!("[CONTROL-LOOP] control thread panicked during shutdown"),
            Err(_) => {
                warn!(
                    "[CONTROL-LOOP] control thread did not stop within {:?}, proceeding",
                    JOIN_TIMEOUT
                );
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }

    pub fn period(&self) -> Duration {
        *self.period.lock()
    }

    /// Live retune of the tick period
    pub fn set_frequency(&self, frequency_hz: f64) -> Result<(), String> {
        if frequency_hz <= 0.0 {
            return Err(format!("frequency must be positive, got {frequency_hz}"));
        }
        *self.period.lock() = Duration::from_secs_f64(1.0 / frequency_hz);
        Ok(())
    }
}

impl Drop for ControlLoopRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn control_loop(
    parts: ControlLoopParts,
    period: Arc<Mutex<Duration>>,
    running: Arc<AtomicBool>,
    tick_count: Arc<AtomicU64>,
) {
    let mut hold = AccelerationHold::new(parts.acceleration_hold_ticks);
    let diagnostics = parts.diagnostics.as_deref();

    while running.load(Ordering::Acquire) {
        let tick_start = Instant::now();
        let tick = tick_count.fetch_add(1, Ordering::AcqRel) + 1;

        let outcome = run_tick(
            &parts.gate,
            &parts.watchdog,
            parts.decision.as_ref(),
            parts.publisher.as_ref(),
            diagnostics,
            &parts.policy,
            &mut hold,
            tick,
        );

        if outcome == TickOutcome::SupplyLost {
            error!(
                "[CONTROL-LOOP] data supply lost at tick {}, stopping with terminal command",
                tick
            );
            let stop = DriveCommand::terminal(parts.policy.max_acceleration);
            if let Err(reason) = parts.publisher.publish_terminal(&stop) {
                error!("[CONTROL-LOOP] terminal publish failed: {}", reason);
            }
            if let Some(sink) = diagnostics {
                if let Err(reason) = sink.flush() {
                    warn!("[CONTROL-LOOP] diagnostics flush failed: {}", reason);
                }
            }
            running.store(false, Ordering::Release);
            break;
        }

        // Sleep the period remainder in chunks; re-check the flag so an
        // external stop() takes effect within one chunk
        let target = *period.lock();
        loop {
            if !running.load(Ordering::Acquire) {
                break;
            }
            let elapsed = tick_start.elapsed();
            if elapsed >= target {
                break;
            }
            thread::sleep((target - elapsed).min(SLEEP_CHUNK));
        }
    }
    info!("[CONTROL-LOOP] loop exited after {} ticks", tick_count.load(Ordering::Acquire));
}
