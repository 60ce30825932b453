// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # drivenet-observability
//!
//! Unified observability infrastructure for drivenet (logging, per-crate
//! debug flags).
//!
//! ## Features
//! - `file-logging`: file-based log output with per-run folders and
//!   retention cleanup (desktop only)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known drivenet crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "drivenet-config",
    "drivenet-fusion",
    "drivenet-control",
    "drivenet-observability",
];
