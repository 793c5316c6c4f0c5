// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Type-erased array buffers
//!
//! The storage manager keeps arrays of every element type side by side. Each
//! buffer is a `Vec<T>` (fixed, static and dynamic arrays) or a
//! `DynamicArray2D<T>` behind this trait; typed access downcasts through `Any`.

use std::any::Any;
use std::collections::TryReserveError;
use std::io::{self, Write};

use neurostep_npu_neural::{DType, Element};

use crate::declaration::{ArrayDecl, ArrayKind, InitPolicy};
use crate::dynamic_array_2d::DynamicArray2D;

pub(crate) trait ArrayBuffer: Any + Send + Sync {
    fn dtype(&self) -> DType;

    /// Element count (all rows for 2-D buffers)
    fn len(&self) -> usize;

    /// Reserved heap bytes
    fn capacity_bytes(&self) -> usize;

    /// Write the elements as raw native-endian bytes, rows concatenated
    fn write_bytes(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Raw bytes of a 1-D buffer; `None` for 2-D buffers
    fn bytes_mut(&mut self) -> Option<&mut [u8]>;

    /// Resize a 1-D buffer or change the row count of a 2-D buffer
    fn resize(&mut self, len: usize);

    /// Resize one row of a 2-D buffer; false if not 2-D or the row is missing
    fn resize_row(&mut self, row: usize, len: usize) -> bool;

    /// Row count for 2-D buffers
    fn num_rows(&self) -> Option<usize>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Element> ArrayBuffer for Vec<T> {
    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity() * T::DTYPE.size()
    }

    fn write_bytes(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(bytemuck::cast_slice(self.as_slice()))
    }

    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        Some(bytemuck::cast_slice_mut(self.as_mut_slice()))
    }

    fn resize(&mut self, len: usize) {
        Vec::resize(self, len, T::default());
    }

    fn resize_row(&mut self, _row: usize, _len: usize) -> bool {
        false
    }

    fn num_rows(&self) -> Option<usize> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: Element> ArrayBuffer for DynamicArray2D<T> {
    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn len(&self) -> usize {
        self.total_len()
    }

    fn capacity_bytes(&self) -> usize {
        self.total_len() * T::DTYPE.size()
    }

    fn write_bytes(&self, out: &mut dyn Write) -> io::Result<()> {
        for row in self.rows() {
            out.write_all(bytemuck::cast_slice(row))?;
        }
        Ok(())
    }

    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn resize(&mut self, len: usize) {
        self.resize_rows(len);
    }

    fn resize_row(&mut self, row: usize, len: usize) -> bool {
        DynamicArray2D::resize_row(self, row, len)
    }

    fn num_rows(&self) -> Option<usize> {
        Some(DynamicArray2D::num_rows(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Run `$body` with `$t` bound to the Rust type of `$dtype`
macro_rules! with_element_type {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::F32 => {
                type $t = f32;
                $body
            }
            DType::F64 => {
                type $t = f64;
                $body
            }
            DType::I8 => {
                type $t = i8;
                $body
            }
            DType::I16 => {
                type $t = i16;
                $body
            }
            DType::I32 => {
                type $t = i32;
                $body
            }
            DType::I64 => {
                type $t = i64;
                $body
            }
            DType::U8 => {
                type $t = u8;
                $body
            }
            DType::U16 => {
                type $t = u16;
                $body
            }
            DType::U32 => {
                type $t = u32;
                $body
            }
            DType::U64 => {
                type $t = u64;
                $body
            }
        }
    };
}

fn filled_vec<T: Element>(len: usize, init: InitPolicy) -> Result<Vec<T>, TryReserveError> {
    let mut values: Vec<T> = Vec::new();
    values.try_reserve_exact(len)?;
    match init {
        InitPolicy::Zeros | InitPolicy::External => values.resize(len, T::default()),
        InitPolicy::Arange { start } => {
            values.extend((0..len).map(|i| T::from_index(start.wrapping_add(i as i64))))
        }
    }
    Ok(values)
}

fn typed_buffer<T: Element>(decl: &ArrayDecl) -> Result<Box<dyn ArrayBuffer>, TryReserveError> {
    match decl.kind {
        ArrayKind::Dynamic2D => {
            // Reserve the whole block first so exhaustion is reported, not aborted
            let mut probe: Vec<T> = Vec::new();
            probe.try_reserve_exact(decl.initial_elements())?;
            drop(probe);
            Ok(Box::new(DynamicArray2D::<T>::new(decl.size, decl.row_len)))
        }
        _ => Ok(Box::new(filled_vec::<T>(decl.size, decl.init)?)),
    }
}

/// Allocate and initialise the buffer for one declaration
pub(crate) fn allocate_buffer(decl: &ArrayDecl) -> Result<Box<dyn ArrayBuffer>, TryReserveError> {
    with_element_type!(decl.dtype, T => typed_buffer::<T>(decl))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(kind: ArrayKind, dtype: DType, size: usize, init: InitPolicy) -> ArrayDecl {
        ArrayDecl {
            name: "a".to_string(),
            dtype,
            kind,
            size,
            row_len: 2,
            init,
        }
    }

    #[test]
    fn test_arange_init() {
        let buffer = allocate_buffer(&decl(
            ArrayKind::Fixed,
            DType::I32,
            4,
            InitPolicy::Arange { start: 10 },
        ))
        .unwrap();
        let values = buffer.as_any().downcast_ref::<Vec<i32>>().unwrap();
        assert_eq!(values, &vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_bytes_are_native_layout() {
        let mut buffer = allocate_buffer(&decl(ArrayKind::Fixed, DType::F64, 2, InitPolicy::Zeros)).unwrap();
        let mut out = Vec::new();
        buffer.write_bytes(&mut out).unwrap();
        assert_eq!(out.len(), 16);

        let bytes = buffer.bytes_mut().unwrap();
        bytes[..8].copy_from_slice(&1.5f64.to_ne_bytes());
        let values = buffer.as_any().downcast_ref::<Vec<f64>>().unwrap();
        assert_eq!(values[0], 1.5);
    }

    #[test]
    fn test_two_dimensional_buffer() {
        let mut buffer =
            allocate_buffer(&decl(ArrayKind::Dynamic2D, DType::U16, 3, InitPolicy::Zeros)).unwrap();
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.num_rows(), Some(3));
        assert!(buffer.bytes_mut().is_none());
        assert!(buffer.resize_row(1, 5));
        assert_eq!(buffer.len(), 9);
        assert!(buffer.as_any().downcast_ref::<DynamicArray2D<u16>>().is_some());
    }

    #[test]
    fn test_wrong_downcast_fails() {
        let buffer = allocate_buffer(&decl(ArrayKind::Dynamic, DType::U8, 1, InitPolicy::Zeros)).unwrap();
        assert!(buffer.as_any().downcast_ref::<Vec<i8>>().is_none());
    }
}
