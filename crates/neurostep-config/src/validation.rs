// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks that values are within valid ranges and don't conflict with each other.
//! All violations are collected and reported together.

use crate::{ConfigError, ConfigResult, NeurostepConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    PathConflict { field1: String, field2: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::PathConflict { field1, field2 } => {
                write!(f, "{} and {} point to the same location", field1, field2)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation found
pub fn validate_config(config: &NeurostepConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_system(config, &mut errors);
    validate_snapshot_paths(config, &mut errors);
    validate_scheduler(config, &mut errors);
    validate_queue(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_system(config: &NeurostepConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.system.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "system.log_level".to_string(),
            reason: format!("'{}' is not one of {}", config.system.log_level, LOG_LEVELS.join(", ")),
        });
    }
}

fn validate_snapshot_paths(config: &NeurostepConfig, errors: &mut Vec<ConfigValidationError>) {
    let snapshot = &config.snapshot;
    if snapshot.static_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "snapshot.static_dir".to_string(),
        });
    }
    if snapshot.results_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "snapshot.results_dir".to_string(),
        });
    }
    // Results must never overwrite the inputs they were computed from
    if !snapshot.static_dir.as_os_str().is_empty() && snapshot.static_dir == snapshot.results_dir {
        errors.push(ConfigValidationError::PathConflict {
            field1: "snapshot.static_dir".to_string(),
            field2: "snapshot.results_dir".to_string(),
        });
    }
}

fn validate_scheduler(config: &NeurostepConfig, errors: &mut Vec<ConfigValidationError>) {
    let scheduler = &config.scheduler;
    if !(scheduler.time_quantum.is_finite() && scheduler.time_quantum > 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "scheduler.time_quantum".to_string(),
            reason: format!("must be a finite positive number, got {}", scheduler.time_quantum),
        });
    }
    let tol = scheduler.commensurability_tolerance;
    if !(tol > 0.0 && tol < 1.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "scheduler.commensurability_tolerance".to_string(),
            reason: format!("must be in (0, 1), got {}", tol),
        });
    }
}

fn validate_queue(config: &NeurostepConfig, errors: &mut Vec<ConfigValidationError>) {
    if let Some(max_delay) = config.queue.default_max_delay {
        if !(max_delay.is_finite() && max_delay >= 0.0) {
            errors.push(ConfigValidationError::InvalidValue {
                field: "queue.default_max_delay".to_string(),
                reason: format!("must be a finite non-negative number, got {}", max_delay),
            });
        }
    }
}
