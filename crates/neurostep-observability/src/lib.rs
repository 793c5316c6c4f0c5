// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurostep-observability
//!
//! Logging setup shared by the standalone runner and tests, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: additionally write JSON logs into a timestamped run folder

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known neurostep crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "neurostep",
    "neurostep-config",
    "neurostep-npu-neural",
    "neurostep-npu-runtime",
    "neurostep-npu-engine",
];
