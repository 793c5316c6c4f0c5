// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for [`crate::init_logging`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingOptions {
    /// Default level for everything not raised by a debug flag
    pub level: String,

    /// Console output format
    pub format: LogFormat,

    /// Also write JSON logs to `log_dir/run_<timestamp>/neurostep.log`.
    /// Ignored unless built with the `file-logging` feature.
    pub file_logging: bool,

    /// Base directory for file logs
    pub log_dir: PathBuf,
}

/// Console log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        LoggingOptions {
            level: "info".to_string(),
            format: LogFormat::Text,
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
        }
    }
}
