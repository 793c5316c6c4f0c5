// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-neurostep-npu-engine` to raise one crate to
//! `debug` while the rest of the program stays at the configured level.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Crates selected for debug-level logging
///
/// # Example
/// ```rust
/// use neurostep_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-neurostep-npu-engine".to_string()]);
/// assert!(flags.is_enabled("neurostep-npu-engine"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse `--debug-{crate-name}` and `--debug-all` from command-line arguments
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enabled_crates.insert(crate_name.to_string());
            }
        }
        flags
    }

    fn enable_all(&mut self) {
        self.enabled_crates
            .extend(KNOWN_CRATES.iter().map(|name| name.to_string()));
    }

    /// Same as `--debug-all` when `debug` is set (the `system.debug` config key)
    pub fn with_config_debug(mut self, debug: bool) -> Self {
        if debug {
            self.enable_all();
        }
        self
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `DEBUG` for enabled crates, `INFO` otherwise
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Build an `EnvFilter` directive string
    ///
    /// Crate names are converted to tracing targets (`-` becomes `_`).
    /// Format: `"neurostep_npu_engine=debug,info"`, or just `default_level`
    /// when nothing is enabled.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .iter()
            .map(|name| format!("{}=debug", name.replace('-', "_")))
            .collect();
        filters.push(default_level.to_lowercase());
        filters.join(",")
    }
}

/// Parse debug flags from the process arguments and `NEUROSTEP_DEBUG`
///
/// Environment variable format: comma-separated crate names, or `all`.
/// Boolean values (`true`, `1`, ...) are left to the config loader.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(env_var) = env::var("NEUROSTEP_DEBUG") {
        merge_env_value(&mut flags, &env_var);
    }
    flags
}

fn merge_env_value(flags: &mut CrateDebugFlags, value: &str) {
    if value == "all" {
        flags.enable_all();
        return;
    }
    for crate_name in value.split(',').map(str::trim) {
        if crate_name.starts_with("neurostep") {
            flags.enabled_crates.insert(crate_name.to_string());
        }
    }
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  NEUROSTEP_DEBUG={{crate-name}}[,{{crate-name}}]
  NEUROSTEP_DEBUG=all
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-neurostep-npu-engine".to_string()]);
        assert!(flags.is_enabled("neurostep-npu-engine"));
        assert!(!flags.is_enabled("neurostep-npu-runtime"));
    }

    #[test]
    fn test_config_debug_enables_every_crate() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-neurostep-config".to_string()]);
        let unchanged = flags.clone().with_config_debug(false);
        assert_eq!(unchanged.enabled_crates, flags.enabled_crates);

        let all = flags.with_config_debug(true);
        for crate_name in KNOWN_CRATES {
            assert!(all.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
        assert!(all.to_filter_string("warn").ends_with(",warn"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_filter_string_uses_targets() {
        let flags = CrateDebugFlags::from_args(vec![
            "--debug-neurostep-npu-runtime".to_string(),
            "--debug-neurostep-npu-engine".to_string(),
        ]);
        assert_eq!(
            flags.to_filter_string("WARN"),
            "neurostep_npu_engine=debug,neurostep_npu_runtime=debug,warn"
        );
    }

    #[test]
    fn test_filter_string_without_flags() {
        assert_eq!(CrateDebugFlags::default().to_filter_string("info"), "info");
    }

    #[test]
    fn test_env_value_ignores_booleans() {
        let mut flags = CrateDebugFlags::default();
        merge_env_value(&mut flags, "true");
        assert!(!flags.any_enabled());

        merge_env_value(&mut flags, "neurostep-npu-runtime, neurostep-config");
        assert!(flags.is_enabled("neurostep-npu-runtime"));
        assert!(flags.is_enabled("neurostep-config"));
        assert_eq!(flags.log_level("neurostep-config"), tracing::Level::DEBUG);
        assert_eq!(flags.log_level("neurostep"), tracing::Level::INFO);
    }
}
