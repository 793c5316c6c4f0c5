// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurostep Storage Runtime
//!
//! Owns all simulation state:
//! - **Fixed arrays**: `N` elements, `N` fixed at declaration
//! - **Static arrays**: fixed-size inputs loaded from snapshots
//! - **Dynamic arrays**: growable 1-D sequences
//! - **2-D dynamic arrays**: growable rows of growable length
//!
//! Lifecycle: declare → `allocate()` → `load_static_arrays()` → run →
//! `persist_all()` → `release()`.
//!
//! ## Usage
//!
//! ```rust
//! use neurostep_npu_runtime::{InitPolicy, StorageManager};
//! use neurostep_npu_neural::DType;
//!
//! let mut storage = StorageManager::new();
//! let v = storage.declare_fixed("_array_neurongroup_v", DType::F64, 3, InitPolicy::Zeros)?;
//! storage.allocate()?;
//! storage.fixed_mut::<f64>(v)?[1] = -0.07;
//! assert_eq!(storage.fixed::<f64>(v)?, &[0.0, -0.07, 0.0]);
//! assert!(storage.release());
//! # Ok::<(), neurostep_npu_runtime::StorageError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod buffer;
pub mod declaration;
pub mod dynamic_array_2d;
pub mod error;
pub mod snapshot;
pub mod storage;

pub use declaration::{ArrayDecl, ArrayKind, InitPolicy};
pub use dynamic_array_2d::DynamicArray2D;
pub use error::{Result, StorageError};
pub use snapshot::{snapshot_path, LoadReport, PersistReport};
pub use storage::{StorageManager, StorageState};
