// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for storage operations

use std::io;
use std::path::PathBuf;

use neurostep_npu_neural::{ArrayId, DType};

use crate::declaration::ArrayKind;

/// Storage manager errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unknown array '{0}'")]
    UnknownArray(String),

    #[error("unknown array id {0}")]
    UnknownArrayId(ArrayId),

    #[error("array '{0}' is already declared")]
    DuplicateArray(String),

    #[error("array '{name}' is {actual}, expected {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        actual: ArrayKind,
    },

    #[error("array '{name}' holds {actual}, accessed as {expected}")]
    TypeMismatch {
        name: String,
        expected: DType,
        actual: DType,
    },

    #[error("array '{name}' has {expected} elements, got {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("row {row} out of range for '{name}' with {rows} rows")]
    RowOutOfRange { name: String, row: usize, rows: usize },

    #[error("array '{0}' cannot be borrowed twice in one access")]
    AliasedArrays(String),

    #[error("storage is not allocated")]
    NotAllocated,

    #[error("storage is already allocated; declarations are closed")]
    AlreadyAllocated,

    #[error("storage has been released")]
    Released,

    #[error("out of memory allocating '{name}': requested {requested_bytes} bytes")]
    OutOfMemory { name: String, requested_bytes: usize },

    #[error("snapshot I/O failed for '{name}' at {}: {source}", path.display())]
    Snapshot {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot for '{name}' at {} is {actual} bytes, expected {expected}", path.display())]
    ShortSnapshot {
        name: String,
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

impl StorageError {
    /// Name of the array the error refers to, if any
    pub fn array_name(&self) -> Option<&str> {
        match self {
            StorageError::UnknownArray(name)
            | StorageError::DuplicateArray(name)
            | StorageError::AliasedArrays(name) => Some(name),
            StorageError::KindMismatch { name, .. }
            | StorageError::TypeMismatch { name, .. }
            | StorageError::SizeMismatch { name, .. }
            | StorageError::RowOutOfRange { name, .. }
            | StorageError::OutOfMemory { name, .. }
            | StorageError::Snapshot { name, .. }
            | StorageError::ShortSnapshot { name, .. } => Some(name),
            StorageError::UnknownArrayId(_)
            | StorageError::NotAllocated
            | StorageError::AlreadyAllocated
            | StorageError::Released => None,
        }
    }

    /// Snapshot failures are reported per array and never abort a run
    pub fn is_snapshot_error(&self) -> bool {
        matches!(
            self,
            StorageError::Snapshot { .. } | StorageError::ShortSnapshot { .. }
        )
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
