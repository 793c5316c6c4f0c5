// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Array declarations
//!
//! A model declares every array up front: its name, element type, kind, size
//! and how its contents start out. Declarations are closed by `allocate()`.

use core::fmt;

use neurostep_npu_neural::DType;

/// Storage kind of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    /// `N` elements, `N` fixed at declaration
    Fixed,
    /// Fixed-size input loaded from the static snapshot directory; never persisted
    Static,
    /// Growable 1-D sequence
    Dynamic,
    /// Growable sequence of independently growable rows
    Dynamic2D,
}

impl ArrayKind {
    pub fn is_one_dimensional(self) -> bool {
        !matches!(self, ArrayKind::Dynamic2D)
    }

    pub fn is_fixed_size(self) -> bool {
        matches!(self, ArrayKind::Fixed | ArrayKind::Static)
    }

    /// Static arrays are model inputs; everything else is written to results
    pub fn is_persisted(self) -> bool {
        !matches!(self, ArrayKind::Static)
    }
}

impl fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArrayKind::Fixed => "a fixed array",
            ArrayKind::Static => "a static array",
            ArrayKind::Dynamic => "a dynamic array",
            ArrayKind::Dynamic2D => "a 2-D dynamic array",
        };
        f.write_str(name)
    }
}

/// Initial contents applied by `allocate()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPolicy {
    /// All elements zero
    Zeros,
    /// `value[i] = start + i`
    Arange { start: i64 },
    /// Contents come from a snapshot; zero until loaded
    External,
}

/// One declared array
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDecl {
    pub name: String,
    pub dtype: DType,
    pub kind: ArrayKind,
    /// Element count for 1-D arrays, row count for 2-D arrays
    pub size: usize,
    /// Initial row length for 2-D arrays, unused otherwise
    pub row_len: usize,
    pub init: InitPolicy,
}

impl ArrayDecl {
    /// Element count right after allocation
    pub fn initial_elements(&self) -> usize {
        match self.kind {
            ArrayKind::Dynamic2D => self.size.saturating_mul(self.row_len),
            _ => self.size,
        }
    }

    pub fn initial_bytes(&self) -> usize {
        self.initial_elements().saturating_mul(self.dtype.size())
    }

    /// Loaded by `load_static_arrays()`
    pub fn is_external(&self) -> bool {
        self.init == InitPolicy::External
    }
}
