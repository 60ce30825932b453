// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization for drivenet
//!
//! Console logging is always available; the `file-logging` feature adds a
//! per-run log folder with daily rotation and retention cleanup.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[cfg(feature = "file-logging")]
use anyhow::Context;
#[cfg(feature = "file-logging")]
use chrono::{DateTime, Utc};
#[cfg(feature = "file-logging")]
use tracing_appender::rolling;

use crate::cli::CrateDebugFlags;

/// Keeps file writers alive; logs flush when this guard drops
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Per-run log directory, when file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Initialize logging with console output and, with `file-logging`, a
/// timestamped run folder:
///
/// ```text
/// ./logs/
///   └── run_20250101_120000/
///       └── drivenet.log
/// ```
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    log_dir: Option<PathBuf>,
    retention_runs: Option<usize>,
) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter)
        .boxed();

    let mut layers = vec![console_layer];

    #[cfg(feature = "file-logging")]
    let (file_guards, run_folder) = {
        let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let run_folder = base_log_dir.join(format!("run_{}", timestamp));
        std::fs::create_dir_all(&run_folder).with_context(|| {
            format!("Failed to create log directory: {}", run_folder.display())
        })?;

        cleanup_old_logs(&base_log_dir, retention_runs)?;

        let file_appender = rolling::daily(&run_folder, "drivenet.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(EnvFilter::new(&filter))
            .boxed();
        layers.push(file_layer);

        (vec![guard], Some(run_folder))
    };

    #[cfg(not(feature = "file-logging"))]
    let run_folder: Option<PathBuf> = {
        let _ = (log_dir, retention_runs);
        None
    };

    Registry::default().with(layers).try_init()?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir: run_folder,
    })
}

/// Initialize logging with default settings
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, None, None)
}

/// Remove the oldest `run_*` folders beyond the retention count
#[cfg(feature = "file-logging")]
fn cleanup_old_logs(base_log_dir: &Path, retention_runs: Option<usize>) -> Result<()> {
    if !base_log_dir.exists() {
        return Ok(());
    }
    let retention_runs = retention_runs.unwrap_or(10);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(timestamp_str) = dir_name.strip_prefix("run_") else {
            continue;
        };
        if let Ok(dt) =
            chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y%m%d_%H%M%S")
        {
            runs.push((path, dt.and_utc()));
        }
    }

    runs.sort_by_key(|(_, dt)| *dt);
    if runs.len() > retention_runs {
        for (path, _) in runs.iter().take(runs.len() - retention_runs) {
            if let Err(e) = std::fs::remove_dir_all(path) {
                eprintln!(
                    "Warning: failed to remove old log directory {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
    Ok(())
}
