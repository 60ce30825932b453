// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, ControllerConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "drivenet_configuration.toml";

/// Find the drivenet configuration file
///
/// Search order:
/// 1. `DRIVENET_CONFIG_PATH` environment variable
/// 2. Current working directory: `./drivenet_configuration.toml`
/// 3. Parent directories (up to 5 levels, for workspace roots)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any
/// location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    // 1. Check environment variable first
    if let Ok(env_path) = env::var("DRIVENET_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by DRIVENET_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    // 2. Search in common locations
    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "drivenet configuration file '{CONFIG_FILE_NAME}' not found in any of these locations:\n{search_list}\n\nSet DRIVENET_CONFIG_PATH to specify a custom location."
    )))
}

/// Load configuration from a TOML file with all overrides applied
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is
///   searched for; if none is found, built-in defaults are used.
/// * `cli_args` - Optional CLI argument overrides, keyed by dotted section
///   path (e.g. `control.frequency_hz`)
///
/// # Errors
///
/// Returns an error if the config file contains invalid TOML, an override
/// cannot be parsed, or validation fails
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<ControllerConfig> {
    let mut config = match config_path {
        Some(path) => parse_file(path)?,
        None => match find_config_file() {
            Ok(path) => parse_file(&path)?,
            // No file anywhere: defaults are a complete, valid configuration
            Err(ConfigError::FileNotFound(_)) => ControllerConfig::default(),
            Err(e) => return Err(e),
        },
    };

    apply_environment_overrides(&mut config)?;
    if let Some(args) = cli_args {
        apply_cli_overrides(&mut config, args)?;
    }

    validate_config(&config)?;
    Ok(config)
}

fn parse_file(path: &Path) -> ConfigResult<ControllerConfig> {
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Apply `DRIVENET_*` environment variable overrides
///
/// Recognized variables:
/// - `DRIVENET_CONTROL_FREQUENCY_HZ`
/// - `DRIVENET_HISTORY_LENGTH`
/// - `DRIVENET_VALID_COUNT_THRESHOLD`
/// - `DRIVENET_PATIENCE_LIMIT`
/// - `DRIVENET_GOAL_RADIUS`
/// - `DRIVENET_LOG_LEVEL`
pub fn apply_environment_overrides(config: &mut ControllerConfig) -> ConfigResult<()> {
    if let Ok(v) = env::var("DRIVENET_CONTROL_FREQUENCY_HZ") {
        config.control.frequency_hz = parse_override("DRIVENET_CONTROL_FREQUENCY_HZ", &v)?;
    }
    if let Ok(v) = env::var("DRIVENET_HISTORY_LENGTH") {
        config.fusion.history_length = parse_override("DRIVENET_HISTORY_LENGTH", &v)?;
    }
    if let Ok(v) = env::var("DRIVENET_VALID_COUNT_THRESHOLD") {
        config.fusion.valid_count_threshold = parse_override("DRIVENET_VALID_COUNT_THRESHOLD", &v)?;
    }
    if let Ok(v) = env::var("DRIVENET_PATIENCE_LIMIT") {
        config.watchdog.patience_limit = parse_override("DRIVENET_PATIENCE_LIMIT", &v)?;
    }
    if let Ok(v) = env::var("DRIVENET_GOAL_RADIUS") {
        config.goal.radius = parse_override("DRIVENET_GOAL_RADIUS", &v)?;
    }
    if let Ok(v) = env::var("DRIVENET_LOG_LEVEL") {
        config.logging.level = v;
    }
    Ok(())
}

/// Apply CLI argument overrides, keyed by dotted section path
pub fn apply_cli_overrides(
    config: &mut ControllerConfig,
    args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (key, value) in args {
        match key.as_str() {
            "control.frequency_hz" => config.control.frequency_hz = parse_override(key, value)?,
            "control.acceleration_hold" => {
                config.control.acceleration_hold = parse_override(key, value)?
            }
            "control.max_acceleration" => {
                config.control.max_acceleration = parse_override(key, value)?
            }
            "fusion.history_length" => config.fusion.history_length = parse_override(key, value)?,
            "fusion.grid_size" => config.fusion.grid_size = parse_override(key, value)?,
            "fusion.grid_span_m" => config.fusion.grid_span_m = parse_override(key, value)?,
            "fusion.valid_count_threshold" => {
                config.fusion.valid_count_threshold = parse_override(key, value)?
            }
            "watchdog.patience_limit" => {
                config.watchdog.patience_limit = parse_override(key, value)?
            }
            "goal.radius" => config.goal.radius = parse_override(key, value)?,
            "goal.coordinate" => config.goal.coordinate = Some(parse_coordinate(key, value)?),
            "logging.level" => config.logging.level = value.clone(),
            _ => {
                return Err(ConfigError::InvalidOverride {
                    key: key.clone(),
                    value: value.clone(),
                })
            }
        }
    }
    Ok(())
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parse `"x,y"` into a goal coordinate
fn parse_coordinate(key: &str, value: &str) -> ConfigResult<[f64; 2]> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(ConfigError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok([
        parse_override(key, parts[0])?,
        parse_override(key, parts[1])?,
    ])
}
