// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core type definitions

pub mod dtype;
pub mod ids;
pub mod naming;
pub mod time;

pub use dtype::{DType, Element};
pub use ids::{ArrayId, ClockId, NetworkId, PathwayId};
pub use naming::{array_name, dynamic_array_name, DEFAULT_NETWORK_NAME};
pub use time::{delay_to_steps, TimeError, TimeGrid};
