// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output always; with the `file-logging` feature, a JSON log file in a
//! timestamped run folder as well.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingOptions};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps file writers alive; logs are flushed when this is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    run_dir: Option<PathBuf>,
    installed: bool,
}

impl LoggingGuard {
    /// Run folder receiving file logs, if file logging is active
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    /// False when another global subscriber was already installed
    pub fn installed(&self) -> bool {
        self.installed
    }
}

/// Name of the folder for a run started now: `run_YYYYmmdd_HHMMSS`
pub fn run_folder_name() -> String {
    format!("run_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

fn env_filter(debug_flags: &CrateDebugFlags, level: &str) -> Result<EnvFilter> {
    let directives = debug_flags.to_filter_string(level);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter directives: {}", directives))
}

/// Initialize the global tracing subscriber
///
/// Calling this when a subscriber is already installed (tests, embedding
/// programs) is not an error; the returned guard reports `installed() == false`.
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LoggingOptions) -> Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer = match options.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_filter(env_filter(debug_flags, &options.level)?)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_filter(env_filter(debug_flags, &options.level)?)
            .boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let mut file_guards = Vec::new();
    let mut run_dir = None;

    if options.file_logging {
        #[cfg(feature = "file-logging")]
        {
            let run_folder = options.log_dir.join(run_folder_name());
            std::fs::create_dir_all(&run_folder).with_context(|| {
                format!("Failed to create log directory: {}", run_folder.display())
            })?;

            let appender = tracing_appender::rolling::never(&run_folder, "neurostep.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guards.push(guard);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(env_filter(debug_flags, &options.level)?)
                .boxed();
            layers.push(file_layer);
            run_dir = Some(run_folder);
        }
        #[cfg(not(feature = "file-logging"))]
        eprintln!("File logging requested but neurostep was built without the `file-logging` feature");
    }

    let installed = Registry::default().with(layers).try_init().is_ok();

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        run_dir,
        installed,
    })
}

/// Initialize console logging at `info` with the given debug flags
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &LoggingOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_folder_name_format() {
        let name = run_folder_name();
        let stamp = name.strip_prefix("run_").unwrap();
        assert_eq!(stamp.len(), "20250101_120000".len());
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S").is_ok());
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let flags = CrateDebugFlags::default();
        assert!(env_filter(&flags, "info").is_ok());
        assert!(env_filter(&flags, "neurostep=[").is_err());
    }

    #[test]
    fn test_second_init_is_not_fatal() {
        let flags = CrateDebugFlags::default();
        let first = init_logging_default(&flags).unwrap();
        let second = init_logging_default(&flags).unwrap();
        // At most one of the two calls can install the global subscriber
        assert!(!(first.installed() && second.installed()));
        assert!(second.run_dir().is_none());
    }

    fn file_options(dir: &Path) -> LoggingOptions {
        LoggingOptions {
            file_logging: true,
            log_dir: dir.to_path_buf(),
            ..LoggingOptions::default()
        }
    }

    #[cfg(feature = "file-logging")]
    #[test]
    fn test_file_logging_creates_run_folder() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_logging(&CrateDebugFlags::default(), &file_options(dir.path())).unwrap();
        let run_dir = guard.run_dir().unwrap();
        assert!(run_dir.starts_with(dir.path()));
        assert!(run_dir.is_dir());
    }

    #[cfg(not(feature = "file-logging"))]
    #[test]
    fn test_file_logging_needs_feature() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_logging(&CrateDebugFlags::default(), &file_options(dir.path())).unwrap();
        assert!(guard.run_dir().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
