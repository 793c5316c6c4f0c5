// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurostep Foundation Types
//!
//! Types shared by the storage runtime and the scheduling engine:
//! - **Ids**: `ArrayId`, `ClockId`, `PathwayId`, `NetworkId`
//! - **Elements**: `DType` and the `Element` trait for typed array storage
//! - **Time**: the integer time grid every clock step is expressed on
//! - **Naming**: conventional array names used by generated models

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod types;

pub use types::{
    array_name, delay_to_steps, dynamic_array_name, ArrayId, ClockId, DType, Element, NetworkId,
    PathwayId, TimeError, TimeGrid, DEFAULT_NETWORK_NAME,
};
