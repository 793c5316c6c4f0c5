// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Element types for simulation arrays
//!
//! Every array holds one plain-old-data numeric type. Snapshot files are the raw
//! native-endian bytes of the elements, so `Element` requires `bytemuck::Pod`.
//! Boolean state is stored as `U8`.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Declared element type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl DType {
    /// Size of one element in bytes
    pub const fn size(self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric type that can live in a simulation array
pub trait Element: bytemuck::Pod + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    /// Value for position `i` of an arithmetic-sequence initialisation
    fn from_index(i: i64) -> Self;
}

macro_rules! impl_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn from_index(i: i64) -> Self {
                    i as $t
                }
            }
        )*
    };
}

impl_element! {
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_rust_types() {
        assert_eq!(DType::F64.size(), core::mem::size_of::<f64>());
        assert_eq!(DType::I32.size(), core::mem::size_of::<i32>());
        assert_eq!(DType::U8.size(), core::mem::size_of::<u8>());
        assert_eq!(<u16 as Element>::DTYPE.size(), 2);
    }

    #[test]
    fn test_from_index() {
        assert_eq!(<f64 as Element>::from_index(7), 7.0);
        assert_eq!(<i32 as Element>::from_index(-3), -3);
        assert_eq!(<u64 as Element>::from_index(12), 12);
    }

    #[test]
    fn test_dtype_serde_names() {
        assert_eq!(serde_json::to_string(&DType::F64).unwrap(), "\"f64\"");
        let parsed: DType = serde_json::from_str("\"i32\"").unwrap();
        assert_eq!(parsed, DType::I32);
        assert_eq!(parsed.to_string(), "i32");
    }
}
