// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Conventional array and network names
//!
//! Snapshot files are named after the array, so these names are also the file
//! names under the static and results directories.

/// Name of the network every simulation starts with
pub const DEFAULT_NETWORK_NAME: &str = "magicnetwork";

/// `_array_<owner>_<var>`, the name of a fixed-size array
pub fn array_name(owner: &str, var: &str) -> String {
    format!("_array_{}_{}", owner, var)
}

/// `_dynamic_array_<owner>_<var>`, the name of a growable array
pub fn dynamic_array_name(owner: &str, var: &str) -> String {
    format!("_dynamic_array_{}_{}", owner, var)
}
