// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # drivenet Configuration System
//!
//! Type-safe configuration loader for the drivenet controller with support
//! for:
//! - TOML file parsing
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivenet_config::load_config;
//!
//! // Load configuration with automatic file discovery and overrides
//! let config = load_config(None, None).expect("Failed to load config");
//!
//! println!("Control frequency: {} Hz", config.control.frequency_hz);
//! println!("History length: {}", config.fusion.history_length);
//! ```
//!
//! Every component takes its configuration section by value or reference at
//! construction time; there is no ambient global lookup.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Re-export for convenience
pub use serde;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid override for '{key}': {value}")]
    InvalidOverride { key: String, value: String },

    #[error(transparent)]
    Validation(#[from] ConfigValidationError),
}

/// Result alias used throughout this crate
pub type ConfigResult<T> = Result<T, ConfigError>;
