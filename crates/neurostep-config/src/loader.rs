// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, NeurostepConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "neurostep.toml";

/// Find the neurostep configuration file
///
/// Search order:
/// 1. `NEUROSTEP_CONFIG_PATH` environment variable
/// 2. Current working directory: `./neurostep.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NEUROSTEP_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NEUROSTEP_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet NEUROSTEP_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// `config_path` of `None` triggers [`find_config_file`]. Environment
/// overrides are applied first, then `cli_args`.
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML.
/// Validation is a separate step, see [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeurostepConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: NeurostepConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `NEUROSTEP_LOG_LEVEL` -> `system.log_level`
/// - `NEUROSTEP_DEBUG` -> `system.debug` (only boolean values; crate lists are
///   consumed by the observability crate)
/// - `NEUROSTEP_STATIC_DIR` -> `snapshot.static_dir`
/// - `NEUROSTEP_RESULTS_DIR` -> `snapshot.results_dir`
/// - `NEUROSTEP_TIME_QUANTUM` -> `scheduler.time_quantum`
/// - `NEUROSTEP_MAX_DELAY` -> `queue.default_max_delay`
pub fn apply_environment_overrides(config: &mut NeurostepConfig) {
    if let Ok(value) = env::var("NEUROSTEP_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("NEUROSTEP_DEBUG") {
        if matches!(value.to_lowercase().as_str(), "true" | "false" | "1" | "0" | "yes" | "no") {
            config.system.debug = parse_flag(&value);
        }
    }
    if let Ok(value) = env::var("NEUROSTEP_STATIC_DIR") {
        config.snapshot.static_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("NEUROSTEP_RESULTS_DIR") {
        config.snapshot.results_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("NEUROSTEP_TIME_QUANTUM") {
        if let Ok(quantum) = value.parse::<f64>() {
            config.scheduler.time_quantum = quantum;
        }
    }
    if let Ok(value) = env::var("NEUROSTEP_MAX_DELAY") {
        if let Ok(delay) = value.parse::<f64>() {
            config.queue.default_max_delay = Some(delay);
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// `cli_args` keys: `log_level`, `debug`, `static_dir`, `results_dir`,
/// `time_quantum`, `max_delay`. Unparseable numbers are ignored.
pub fn apply_cli_overrides(config: &mut NeurostepConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("debug") {
        config.system.debug = parse_flag(value);
    }
    if let Some(value) = cli_args.get("static_dir") {
        config.snapshot.static_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("results_dir") {
        config.snapshot.results_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("time_quantum") {
        if let Ok(quantum) = value.parse::<f64>() {
            config.scheduler.time_quantum = quantum;
        }
    }
    if let Some(value) = cli_args.get("max_delay") {
        if let Ok(delay) = value.parse::<f64>() {
            config.queue.default_max_delay = Some(delay);
        }
    }
}
