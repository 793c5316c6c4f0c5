// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Two-dimensional dynamic array
//!
//! A sequence of rows where both the row count and every row's length can be
//! changed independently. Snapshots see the rows concatenated in order.

/// Growable rows of growable length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicArray2D<T> {
    rows: Vec<Vec<T>>,
}

impl<T: Copy + Default> DynamicArray2D<T> {
    /// `rows` rows of `row_len` default elements each
    pub fn new(rows: usize, row_len: usize) -> Self {
        Self {
            rows: vec![vec![T::default(); row_len]; rows],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row_len(&self, row: usize) -> Option<usize> {
        self.rows.get(row).map(Vec::len)
    }

    /// Total number of elements over all rows
    pub fn total_len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Change the row count; new rows start empty
    pub fn resize_rows(&mut self, rows: usize) {
        self.rows.resize_with(rows, Vec::new);
    }

    /// Change the length of one row; returns false if the row does not exist
    pub fn resize_row(&mut self, row: usize, len: usize) -> bool {
        match self.rows.get_mut(row) {
            Some(r) => {
                r.resize(len, T::default());
                true
            }
            None => false,
        }
    }

    /// Make the array rectangular: `rows` rows of exactly `row_len` elements
    pub fn resize(&mut self, rows: usize, row_len: usize) {
        self.resize_rows(rows);
        for r in &mut self.rows {
            r.resize(row_len, T::default());
        }
    }

    pub fn row(&self, row: usize) -> Option<&[T]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn row_mut(&mut self, row: usize) -> Option<&mut Vec<T>> {
        self.rows.get_mut(row)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Row-major copy of every element
    pub fn flatten(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.total_len());
        for r in &self.rows {
            out.extend_from_slice(r);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_grow_independently() {
        let mut arr: DynamicArray2D<i32> = DynamicArray2D::new(2, 1);
        arr.resize_rows(3);
        assert!(arr.resize_row(0, 4));
        assert_eq!(arr.row_len(0), Some(4));
        assert_eq!(arr.row_len(1), Some(1));
        assert_eq!(arr.row_len(2), Some(0));
        assert_eq!(arr.total_len(), 5);
        assert!(!arr.resize_row(5, 1));
    }

    #[test]
    fn test_flatten_is_row_major() {
        let mut arr: DynamicArray2D<u8> = DynamicArray2D::new(2, 2);
        arr.row_mut(0).unwrap().copy_from_slice(&[1, 2]);
        arr.row_mut(1).unwrap().push(9);
        arr.row_mut(1).unwrap()[0] = 3;
        assert_eq!(arr.flatten(), vec![1, 2, 3, 0, 9]);
        assert_eq!(arr.get(1, 2), Some(9));
        assert_eq!(arr.get(2, 0), None);
    }

    #[test]
    fn test_rectangular_resize() {
        let mut arr: DynamicArray2D<f64> = DynamicArray2D::new(1, 5);
        arr.resize(3, 2);
        assert_eq!(arr.num_rows(), 3);
        assert!(arr.rows().all(|r| r.len() == 2));
    }
}
