// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor source registry
//!
//! One polling thread per registered source. Each thread owns its
//! transport, rate-limits its polls and offers every payload to the
//! shared gate. Threads stop cooperatively via per-source flags and are
//! all joined on deregistration or manager drop.

use crate::gate::{IngestOutcome, SynchronizationGate};
use crate::rate_limiter::RateLimiter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use drivenet_fusion::SensorPayload;

/// Transport a source thread polls for payloads. `poll` returns `None`
/// when nothing is pending; a transport signals permanent exhaustion by
/// returning `None` forever, which the watchdog eventually notices.
pub trait SensorTransport: Send {
    fn poll(&mut self) -> Option<SensorPayload>;
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Unique registry key, also used as the thread name suffix
    pub source_id: String,
    /// Polling rate; zero or negative polls as fast as payloads arrive
    pub rate_hz: f64,
}

struct SourceThread {
    handle: thread::JoinHandle<()>,
    stop_flag: Arc<AtomicBool>,
}

/// Owns every source polling thread for one controller run
pub struct SourceManager {
    gate: Arc<SynchronizationGate>,
    sources: Mutex<HashMap<String, SourceThread>>,
}

impl SourceManager {
    pub fn new(gate: Arc<SynchronizationGate>) -> Self {
        Self {
            gate,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a polling thread for `transport`. Fails when the id is taken.
    pub fn register(
        &self,
        config: SourceConfig,
        transport: Box<dyn SensorTransport>,
    ) -> Result<(), String> {
        let mut sources = self.sources.lock();
        if sources.contains_key(&config.source_id) {
            return Err(format!(
                "source '{}' is already registered",
                config.source_id
            ));
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_flag = Arc::clone(&stop_flag);
        let gate = Arc::clone(&self.gate);
        let source_id = config.source_id.clone();
        let rate_hz = config.rate_hz;

        let handle = thread::Builder::new()
            .name(format!("drivenet-source-{source_id}"))
            .spawn(move || {
                source_loop(source_id, rate_hz, transport, gate, thread_flag);
            })
            .map_err(|e| format!("failed to spawn source thread: {e}"))?;

        info!(
            "[SOURCE-{}] registered at {} Hz",
            config.source_id, config.rate_hz
        );
        sources.insert(config.source_id, SourceThread { handle, stop_flag });
        Ok(())
    }

    /// Stop and join one source thread
    pub fn deregister(&self, source_id: &str) -> Result<(), String> {
        let source = self
            .sources
            .lock()
            .remove(source_id)
            .ok_or_else(|| format!("source '{source_id}' is not registered"))?;

        source.stop_flag.store(true, Ordering::Release);
        if source.handle.join().is_err() {
            warn!("[SOURCE-{}] thread panicked before join", source_id);
        }
        info!("[SOURCE-{}] deregistered", source_id);
        Ok(())
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.lock().keys().cloned().collect()
    }

    /// Stop and join every source thread
    pub fn stop_all(&self) {
        let drained: Vec<(String, SourceThread)> = self.sources.lock().drain().collect();
        for (source_id, source) in drained {
            source.stop_flag.store(true, Ordering::Release);
            if source.handle.join().is_err() {
                warn!("[SOURCE-{}] thread panicked before join", source_id);
            }
        }
    }
}

impl Drop for SourceManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn source_loop(
    source_id: String,
    rate_hz: f64,
    mut transport: Box<dyn SensorTransport>,
    gate: Arc<SynchronizationGate>,
    stop_flag: Arc<AtomicBool>,
) {
    let mut limiter = RateLimiter::new(rate_hz);
    debug!("[SOURCE-{}] polling loop started", source_id);

    while !stop_flag.load(Ordering::Acquire) {
        if !limiter.should_poll_now() {
            let wait = limiter
                .time_until_next_poll()
                .min(Duration::from_millis(50));
            thread::sleep(wait);
            continue;
        }

        match transport.poll() {
            Some(payload) => match gate.ingest(payload) {
                Ok(IngestOutcome::Committed) => {
                    trace!("[SOURCE-{}] payload committed", source_id);
                }
                Ok(IngestOutcome::Skipped) => {
                    debug!("[SOURCE-{}] payload skipped, gate closed", source_id);
                }
                Err(e) => {
                    warn!("[SOURCE-{}] payload rejected: {}", source_id, e);
                }
            },
            None => thread::sleep(Duration::from_millis(1)),
        }
    }
    debug!("[SOURCE-{}] polling loop stopped", source_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchdog::StalenessWatchdog;
    use drivenet_fusion::{FusionBuffer, FusionSettings, GoalSettings, LanePoint, StreamKind};
    use std::sync::atomic::AtomicUsize;

    struct LaneOnce {
        sent: bool,
    }

    impl SensorTransport for LaneOnce {
        fn poll(&mut self) -> Option<SensorPayload> {
            if self.sent {
                None
            } else {
                self.sent = true;
                Some(SensorPayload::LaneSet(vec![LanePoint {
                    x: 0.0,
                    y: 1.0,
                    intensity: 1.0,
                }]))
            }
        }
    }

    struct CountingTransport {
        polls: Arc<AtomicUsize>,
    }

    impl SensorTransport for CountingTransport {
        fn poll(&mut self) -> Option<SensorPayload> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn test_gate() -> Arc<SynchronizationGate> {
        let buffer = FusionBuffer::new(
            FusionSettings {
                history_length: 2,
                grid_size: 16,
                grid_span_m: 16.0,
            },
            GoalSettings::default(),
        );
        Arc::new(SynchronizationGate::new(
            buffer,
            Arc::new(StalenessWatchdog::new(10)),
        ))
    }

    #[test]
    fn registered_source_delivers_to_the_buffer() {
        let gate = test_gate();
        let manager = SourceManager::new(Arc::clone(&gate));
        manager
            .register(
                SourceConfig {
                    source_id: "lanes".to_string(),
                    rate_hz: 0.0,
                },
                Box::new(LaneOnce { sent: false }),
            )
            .unwrap();

        // Wait for the single payload to land
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            {
                let guard = gate.begin_read();
                if guard.freshness(StreamKind::LaneSet).has_data {
                    break;
                }
            }
            assert!(std::time::Instant::now() < deadline, "lane payload never landed");
            thread::sleep(Duration::from_millis(5));
        }
        manager.deregister("lanes").unwrap();
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let manager = SourceManager::new(test_gate());
        let config = SourceConfig {
            source_id: "dup".to_string(),
            rate_hz: 10.0,
        };
        manager
            .register(config.clone(), Box::new(LaneOnce { sent: true }))
            .unwrap();
        let err = manager
            .register(config, Box::new(LaneOnce { sent: true }))
            .unwrap_err();
        assert!(err.contains("already registered"));
    }

    #[test]
    fn deregister_unknown_source_errors() {
        let manager = SourceManager::new(test_gate());
        assert!(manager.deregister("ghost").is_err());
    }

    #[test]
    fn drop_joins_all_threads() {
        let polls = Arc::new(AtomicUsize::new(0));
        {
            let manager = SourceManager::new(test_gate());
            manager
                .register(
                    SourceConfig {
                        source_id: "counter".to_string(),
                        rate_hz: 0.0,
                    },
                    Box::new(CountingTransport {
                        polls: Arc::clone(&polls),
                    }),
                )
                .unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        // Manager dropped; the thread must have stopped
        let after = polls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(polls.load(Ordering::SeqCst), after);
        assert!(after > 0);
    }
}
