// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `neurostep.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NeurostepConfig {
    pub system: SystemConfig,
    pub snapshot: SnapshotConfig,
    pub scheduler: SchedulerConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}

/// System-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
    pub debug: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
        }
    }
}

/// Snapshot locations for array load and persist
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Directory holding one raw binary file per static array
    pub static_dir: PathBuf,
    /// Directory receiving one raw binary file per fixed and dynamic array
    pub results_dir: PathBuf,
    /// Create `results_dir` before persisting if it does not exist
    pub create_results_dir: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static_arrays"),
            results_dir: PathBuf::from("results"),
            create_results_dir: true,
        }
    }
}

/// Scheduler time discretisation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Length of one integer time unit in seconds. Every clock step must be a
    /// whole multiple of it.
    pub time_quantum: f64,
    /// Relative tolerance used when checking that a step size is a multiple of
    /// the quantum.
    pub commensurability_tolerance: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_quantum: 1e-9,
            commensurability_tolerance: 1e-6,
        }
    }
}

/// Delay queue sizing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum delay (seconds) a pathway queue must represent. `None` sizes each
    /// queue from the largest delay present when the pathway is prepared.
    pub default_max_delay: Option<f64>,
}

/// Logging output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file_logging: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
        }
    }
}
