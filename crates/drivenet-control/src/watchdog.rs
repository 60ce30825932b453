// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Staleness watchdog for the required data stream
//!
//! Counts consecutive no-data control ticks and trips a terminal liveness
//! flag once the patience limit is exhausted. State lives in atomics so
//! producers can reset the clock without touching the control mutex — a
//! producer must never block just to report "still alive".

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use tracing::{debug, warn};

const WAITING: u8 = 0;
const ALIVE: u8 = 1;
const DEAD: u8 = 2;

/// Watchdog lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatchdogPhase {
    /// No data has ever arrived; the clock does not run yet
    WaitingForFirstData = WAITING,
    /// Data has been seen; the patience clock runs between arrivals
    Alive = ALIVE,
    /// Patience exhausted. Terminal for the current run.
    Dead = DEAD,
}

/// Per-stream staleness detector, shared between producers and the tick
pub struct StalenessWatchdog {
    phase: AtomicU8,
    patience_clock: AtomicU32,
    patience_limit: u32,
}

impl StalenessWatchdog {
    /// `patience_limit` consecutive dry ticks flip the watchdog dead
    pub fn new(patience_limit: u32) -> Self {
        Self {
            phase: AtomicU8::new(WAITING),
            patience_clock: AtomicU32::new(0),
            patience_limit: patience_limit.max(1),
        }
    }

    pub fn phase(&self) -> WatchdogPhase {
        match self.phase.load(Ordering::Acquire) {
            WAITING => WatchdogPhase::WaitingForFirstData,
            ALIVE => WatchdogPhase::Alive,
            _ => WatchdogPhase::Dead,
        }
    }

    /// Record an arrival of the required stream: first arrival starts the
    /// clock, every arrival resets it. Called both on a committed ingest and
    /// on a skipped-but-arrived payload — a busy consumer must not look like
    /// a dead sensor. Dead is terminal; late arrivals cannot revive a run.
    pub fn note_data_arrival(&self) {
        let _ = self.phase.compare_exchange(
            WAITING,
            ALIVE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if self.phase.load(Ordering::Acquire) != DEAD {
            self.patience_clock.store(0, Ordering::Release);
            debug!("[WATCHDOG] patience clock reset");
        }
    }

    /// Advance the patience clock by one tick and report liveness.
    ///
    /// This is the sole per-tick query; the clock increment and the
    /// transition check happen as one step, so it must be called at most
    /// once per control tick to avoid double-counting.
    pub fn check_alive(&self) -> bool {
        match self.phase.load(Ordering::Acquire) {
            WAITING => true, // still waiting for the first payload
            DEAD => false,
            _ => {
                let clock = self.patience_clock.fetch_add(1, Ordering::AcqRel) + 1;
                if clock >= self.patience_limit {
                    self.phase.store(DEAD, Ordering::Release);
                    warn!(
                        "[WATCHDOG] no data for {} consecutive ticks, declaring supply dead",
                        clock
                    );
                    false
                } else {
                    debug!(
                        "[WATCHDOG] patience clock {}/{}",
                        clock, self.patience_limit
                    );
                    true
                }
            }
        }
    }

    /// Non-advancing liveness query (does not touch the clock)
    pub fn is_alive(&self) -> bool {
        self.phase.load(Ordering::Acquire) != DEAD
    }

    pub fn patience_limit(&self) -> u32 {
        self.patience_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_phase_never_trips() {
        let watchdog = StalenessWatchdog::new(2);
        for _ in 0..10 {
            assert!(watchdog.check_alive());
        }
        assert_eq!(watchdog.phase(), WatchdogPhase::WaitingForFirstData);
    }

    #[test]
    fn first_arrival_starts_the_clock() {
        let watchdog = StalenessWatchdog::new(3);
        watchdog.note_data_arrival();
        assert_eq!(watchdog.phase(), WatchdogPhase::Alive);
    }

    #[test]
    fn dies_exactly_on_tick_patience_limit() {
        let limit = 5;
        let watchdog = StalenessWatchdog::new(limit);
        watchdog.note_data_arrival();

        for tick in 1..limit {
            assert!(watchdog.check_alive(), "must survive tick {tick}");
        }
        assert!(!watchdog.check_alive(), "must die on tick {limit}");
        assert_eq!(watchdog.phase(), WatchdogPhase::Dead);
    }

    #[test]
    fn arrival_resets_the_clock() {
        let watchdog = StalenessWatchdog::new(2);
        watchdog.note_data_arrival();

        assert!(watchdog.check_alive()); // clock = 1
        watchdog.note_data_arrival(); // clock = 0
        assert!(watchdog.check_alive()); // clock = 1
        assert!(!watchdog.check_alive()); // clock = 2 = limit
    }

    #[test]
    fn dead_is_terminal() {
        let watchdog = StalenessWatchdog::new(1);
        watchdog.note_data_arrival();
        assert!(!watchdog.check_alive());

        // A late arrival cannot revive the run
        watchdog.note_data_arrival();
        assert!(!watchdog.check_alive());
        assert!(!watchdog.is_alive());
    }
}
