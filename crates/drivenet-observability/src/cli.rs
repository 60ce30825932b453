// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-drivenet-control`, `--debug-drivenet-fusion`
//! to enable debug-level logging per crate.

use std::collections::HashMap;
use std::env;

use crate::KNOWN_CRATES;

/// Parse debug flags from command-line arguments
///
/// # Example
/// ```rust,no_run
/// use drivenet_observability::CrateDebugFlags;
/// let flags = CrateDebugFlags::from_args(std::env::args());
/// if flags.is_enabled("drivenet-control") {
///     // Debug logging is on for the control crate
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching the `--debug-{crate-name}` pattern.
    /// Also supports `--debug-all` to enable all crates.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut enabled_crates = HashMap::new();
        let mut debug_all = false;

        for arg in args {
            if arg == "--debug-all" {
                debug_all = true;
                continue;
            }

            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                enabled_crates.insert(crate_name.to_string(), true);
            }
        }

        if debug_all {
            for crate_name in KNOWN_CRATES {
                enabled_crates.insert(crate_name.to_string(), true);
            }
        }

        CrateDebugFlags { enabled_crates }
    }

    /// Check if debug is enabled for a specific crate
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains_key(crate_name)
    }

    /// Check if debug is enabled for any crate
    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Get log level for a crate: DEBUG when flagged, INFO otherwise
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Create a tracing filter string from the flags, e.g.
    /// "drivenet_control=debug,info". Crate names are normalized to the
    /// underscore form tracing targets use.
    pub fn to_filter_string(&self) -> String {
        if self.enabled_crates.is_empty() {
            return "info".to_string();
        }

        let mut filters = Vec::new();
        for crate_name in self.enabled_crates.keys() {
            filters.push(format!("{}=debug", crate_name.replace('-', "_")));
        }
        // Default level for everything else
        filters.push("info".to_string());
        filters.join(",")
    }
}

/// Parse debug flags from both the command line and the `DRIVENET_DEBUG`
/// environment variable (comma-separated crate names, or "all").
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var("DRIVENET_DEBUG") {
        if env_var == "all" {
            for crate_name in KNOWN_CRATES {
                flags.enabled_crates.insert(crate_name.to_string(), true);
            }
        } else {
            for crate_name in env_var.split(',') {
                let crate_name = crate_name.trim();
                if !crate_name.is_empty() {
                    flags.enabled_crates.insert(crate_name.to_string(), true);
                }
            }
        }
    }

    flags
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for a specific crate

Available crates:
  {}

Environment Variable:
  DRIVENET_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug per crate
  DRIVENET_DEBUG=all                              Enable debug for all crates
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-drivenet-control".to_string()]);
        assert!(flags.is_enabled("drivenet-control"));
        assert!(!flags.is_enabled("drivenet-fusion"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_filter_string_uses_underscore_targets() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-drivenet-control".to_string()]);
        let filter = flags.to_filter_string();
        assert!(filter.contains("drivenet_control=debug"));
        assert!(filter.ends_with("info"));
    }

    #[test]
    fn test_no_flags_defaults_to_info() {
        let flags = CrateDebugFlags::from_args(Vec::<String>::new());
        assert_eq!(flags.to_filter_string(), "info");
        assert!(!flags.any_enabled());
    }

    #[test]
    fn test_log_level() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-drivenet-fusion".to_string()]);
        assert_eq!(flags.log_level("drivenet-fusion"), tracing::Level::DEBUG);
        assert_eq!(flags.log_level("drivenet-control"), tracing::Level::INFO);
    }
}
