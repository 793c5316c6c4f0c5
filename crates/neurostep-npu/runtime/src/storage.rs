// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Storage manager
//!
//! Owns every simulation array. Arrays are declared first, then `allocate()`
//! creates and initialises all of them at once, snapshots are loaded and
//! persisted by name, and `release()` frees everything in one call.
//! Everything else refers to arrays by `ArrayId`.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use neurostep_npu_neural::{ArrayId, DType, Element};
use tracing::{debug, error, info, warn};

use crate::buffer::{allocate_buffer, ArrayBuffer};
use crate::declaration::{ArrayDecl, ArrayKind, InitPolicy};
use crate::dynamic_array_2d::DynamicArray2D;
use crate::error::{Result, StorageError};
use crate::snapshot::{read_into, read_resized, snapshot_path, write_from, LoadReport, PersistReport};

/// Lifecycle of the storage arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    /// Accepting declarations, nothing allocated
    Declared,
    /// All arrays exist
    Allocated,
    /// All memory freed; further access fails
    Released,
}

struct ArraySlot {
    decl: ArrayDecl,
    buffer: Option<Box<dyn ArrayBuffer>>,
}

/// Owner of all simulation state arrays
pub struct StorageManager {
    slots: Vec<ArraySlot>,
    by_name: AHashMap<String, ArrayId>,
    state: StorageState,
    generation: u64,
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageManager {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            by_name: AHashMap::new(),
            state: StorageState::Declared,
            generation: 0,
        }
    }

    // ---------------------------------------------------------------------
    // Declaration
    // ---------------------------------------------------------------------

    /// Declare an array; ids are handed out in declaration order
    pub fn declare(&mut self, mut decl: ArrayDecl) -> Result<ArrayId> {
        match self.state {
            StorageState::Declared => {}
            StorageState::Allocated => return Err(StorageError::AlreadyAllocated),
            StorageState::Released => return Err(StorageError::Released),
        }
        if self.by_name.contains_key(&decl.name) {
            return Err(StorageError::DuplicateArray(decl.name));
        }
        if decl.kind == ArrayKind::Static {
            decl.init = InitPolicy::External;
        }

        let id = ArrayId(self.slots.len() as u32);
        self.by_name.insert(decl.name.clone(), id);
        self.slots.push(ArraySlot { decl, buffer: None });
        Ok(id)
    }

    /// Fixed-size array of `size` elements
    pub fn declare_fixed(
        &mut self,
        name: impl Into<String>,
        dtype: DType,
        size: usize,
        init: InitPolicy,
    ) -> Result<ArrayId> {
        self.declare(ArrayDecl {
            name: name.into(),
            dtype,
            kind: ArrayKind::Fixed,
            size,
            row_len: 0,
            init,
        })
    }

    /// Fixed-size input array, loaded by `load_static_arrays()` and never persisted
    pub fn declare_static(&mut self, name: impl Into<String>, dtype: DType, size: usize) -> Result<ArrayId> {
        self.declare(ArrayDecl {
            name: name.into(),
            dtype,
            kind: ArrayKind::Static,
            size,
            row_len: 0,
            init: InitPolicy::External,
        })
    }

    /// Growable array starting with `len` zero elements
    pub fn declare_dynamic(&mut self, name: impl Into<String>, dtype: DType, len: usize) -> Result<ArrayId> {
        self.declare(ArrayDecl {
            name: name.into(),
            dtype,
            kind: ArrayKind::Dynamic,
            size: len,
            row_len: 0,
            init: InitPolicy::Zeros,
        })
    }

    /// Growable rows, starting as `rows` rows of `row_len` zeros
    pub fn declare_dynamic_2d(
        &mut self,
        name: impl Into<String>,
        dtype: DType,
        rows: usize,
        row_len: usize,
    ) -> Result<ArrayId> {
        self.declare(ArrayDecl {
            name: name.into(),
            dtype,
            kind: ArrayKind::Dynamic2D,
            size: rows,
            row_len,
            init: InitPolicy::Zeros,
        })
    }

    pub fn id(&self, name: &str) -> Result<ArrayId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::UnknownArray(name.to_string()))
    }

    pub fn decl(&self, id: ArrayId) -> Result<&ArrayDecl> {
        self.slot(id).map(|slot| &slot.decl)
    }

    pub fn name(&self, id: ArrayId) -> Result<&str> {
        self.decl(id).map(|decl| decl.name.as_str())
    }

    /// Declarations in declaration order
    pub fn declarations(&self) -> impl Iterator<Item = (ArrayId, &ArrayDecl)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (ArrayId(idx as u32), &slot.decl))
    }

    pub fn array_count(&self) -> usize {
        self.slots.len()
    }

    pub fn state(&self) -> StorageState {
        self.state
    }

    pub fn is_allocated(&self) -> bool {
        self.state == StorageState::Allocated
    }

    /// Bumped by every `release()` that freed memory
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Create every declared array and apply its init policy
    ///
    /// # Errors
    ///
    /// `OutOfMemory` if any array cannot be reserved; nothing stays allocated.
    pub fn allocate(&mut self) -> Result<()> {
        match self.state {
            StorageState::Declared => {}
            StorageState::Allocated => return Err(StorageError::AlreadyAllocated),
            StorageState::Released => return Err(StorageError::Released),
        }

        let mut total_bytes = 0usize;
        for idx in 0..self.slots.len() {
            let decl = &self.slots[idx].decl;
            match allocate_buffer(decl) {
                Ok(buffer) => {
                    total_bytes = total_bytes.saturating_add(decl.initial_bytes());
                    self.slots[idx].buffer = Some(buffer);
                }
                Err(_) => {
                    let err = StorageError::OutOfMemory {
                        name: decl.name.clone(),
                        requested_bytes: decl.initial_bytes(),
                    };
                    error!("{}", err);
                    for slot in &mut self.slots {
                        slot.buffer = None;
                    }
                    return Err(err);
                }
            }
        }

        self.state = StorageState::Allocated;
        info!(
            "Allocated {} arrays ({} bytes)",
            self.slots.len(),
            total_bytes
        );
        Ok(())
    }

    /// Free every array
    ///
    /// Safe to call any number of times; only the first call after
    /// `allocate()` frees anything. Returns whether memory was freed.
    pub fn release(&mut self) -> bool {
        if self.state != StorageState::Allocated {
            self.state = StorageState::Released;
            return false;
        }
        for slot in &mut self.slots {
            slot.buffer = None;
        }
        self.state = StorageState::Released;
        self.generation += 1;
        info!("Released {} arrays", self.slots.len());
        true
    }

    // ---------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------

    /// Fill one 1-D array from `<dir>/<name>`
    ///
    /// Fixed-size arrays read their declared size; dynamic arrays take their
    /// length from the file. On failure the array keeps its prior contents.
    pub fn load(&mut self, id: ArrayId, dir: &Path) -> Result<usize> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind.is_one_dimensional(), "a 1-D array")?;
        let path = snapshot_path(dir, &decl.name);
        let bytes = if decl.kind.is_fixed_size() {
            read_into(&decl.name, &path, buffer)?
        } else {
            read_resized(&decl.name, &path, buffer)?
        };
        debug!("Loaded {} ({} bytes) from {}", decl.name, bytes, path.display());
        Ok(bytes)
    }

    /// Same as [`load`](Self::load), by array name
    pub fn load_by_name(&mut self, name: &str, dir: &Path) -> Result<usize> {
        let id = self.id(name)?;
        self.load(id, dir)
    }

    /// Load every array whose init policy is `External`
    ///
    /// Missing or short snapshots are logged and collected; the run continues
    /// with the array's current (zero) contents.
    ///
    /// # Errors
    ///
    /// Only lifecycle errors; snapshot failures go into the report.
    pub fn load_static_arrays(&mut self, dir: &Path) -> Result<LoadReport> {
        self.ensure_allocated()?;
        let mut report = LoadReport::default();

        for idx in 0..self.slots.len() {
            if !self.slots[idx].decl.is_external() {
                continue;
            }
            let id = ArrayId(idx as u32);
            match self.load(id, dir) {
                Ok(_) => report.loaded.push(self.slots[idx].decl.name.clone()),
                Err(err) if err.is_snapshot_error() => {
                    warn!("Error opening static array: {}", err);
                    report.failed.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "Loaded {} static arrays from {} ({} failed)",
            report.loaded.len(),
            dir.display(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Write one array to `<dir>/<name>`, `current length * element size` bytes
    pub fn persist(&self, id: ArrayId, dir: &Path) -> Result<u64> {
        let (decl, buffer) = self.buffer(id)?;
        let path = snapshot_path(dir, &decl.name);
        write_from(&decl.name, &path, buffer)
    }

    /// Write every fixed and dynamic array to `dir`
    ///
    /// Static arrays are inputs and are skipped. A failing file is logged and
    /// recorded; the remaining arrays are still written.
    pub fn persist_all(&self, dir: &Path, create_dir: bool) -> Result<PersistReport> {
        self.ensure_allocated()?;
        if create_dir {
            if let Err(err) = fs::create_dir_all(dir) {
                warn!("Could not create results directory {}: {}", dir.display(), err);
            }
        }

        let mut report = PersistReport::default();
        for (idx, slot) in self.slots.iter().enumerate() {
            if !slot.decl.kind.is_persisted() {
                continue;
            }
            match self.persist(ArrayId(idx as u32), dir) {
                Ok(bytes) => report.written.push((slot.decl.name.clone(), bytes)),
                Err(err) if err.is_snapshot_error() => {
                    warn!("Error writing output file: {}", err);
                    report.failed.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "Persisted {} arrays ({} bytes) to {} ({} failed)",
            report.written.len(),
            report.bytes_written(),
            dir.display(),
            report.failed.len()
        );
        Ok(report)
    }

    // ---------------------------------------------------------------------
    // Untyped access
    // ---------------------------------------------------------------------

    /// Current element count (all rows for 2-D arrays)
    pub fn len(&self, id: ArrayId) -> Result<usize> {
        self.buffer(id).map(|(_, buffer)| buffer.len())
    }

    /// Row count of a 2-D array
    pub fn num_rows(&self, id: ArrayId) -> Result<usize> {
        let (decl, buffer) = self.buffer(id)?;
        buffer.num_rows().ok_or_else(|| kind_error(decl, "a 2-D dynamic array"))
    }

    /// Change the length of a dynamic array; new elements are zero
    pub fn resize_dynamic(&mut self, id: ArrayId, len: usize) -> Result<()> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind == ArrayKind::Dynamic, "a dynamic array")?;
        buffer.resize(len);
        Ok(())
    }

    /// Change the row count of a 2-D array; new rows are empty
    pub fn resize_rows(&mut self, id: ArrayId, rows: usize) -> Result<()> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind == ArrayKind::Dynamic2D, "a 2-D dynamic array")?;
        buffer.resize(rows);
        Ok(())
    }

    /// Change the length of one row of a 2-D array
    pub fn resize_row(&mut self, id: ArrayId, row: usize, len: usize) -> Result<()> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind == ArrayKind::Dynamic2D, "a 2-D dynamic array")?;
        if buffer.resize_row(row, len) {
            Ok(())
        } else {
            Err(StorageError::RowOutOfRange {
                name: decl.name.clone(),
                row,
                rows: buffer.num_rows().unwrap_or(0),
            })
        }
    }

    // ---------------------------------------------------------------------
    // Typed access
    // ---------------------------------------------------------------------

    /// Contents of a fixed or static array
    pub fn fixed<T: Element>(&self, id: ArrayId) -> Result<&[T]> {
        let (decl, buffer) = self.buffer(id)?;
        ensure_kind(decl, decl.kind.is_fixed_size(), "a fixed-size array")?;
        downcast::<Vec<T>, T>(decl, buffer).map(Vec::as_slice)
    }

    pub fn fixed_mut<T: Element>(&mut self, id: ArrayId) -> Result<&mut [T]> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind.is_fixed_size(), "a fixed-size array")?;
        downcast_mut::<Vec<T>, T>(decl, buffer).map(Vec::as_mut_slice)
    }

    /// Contents of any 1-D array (fixed, static or dynamic)
    pub fn slice<T: Element>(&self, id: ArrayId) -> Result<&[T]> {
        let (decl, buffer) = self.buffer(id)?;
        ensure_kind(decl, decl.kind.is_one_dimensional(), "a 1-D array")?;
        downcast::<Vec<T>, T>(decl, buffer).map(Vec::as_slice)
    }

    pub fn slice_mut<T: Element>(&mut self, id: ArrayId) -> Result<&mut [T]> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind.is_one_dimensional(), "a 1-D array")?;
        downcast_mut::<Vec<T>, T>(decl, buffer).map(Vec::as_mut_slice)
    }

    pub fn dynamic<T: Element>(&self, id: ArrayId) -> Result<&Vec<T>> {
        let (decl, buffer) = self.buffer(id)?;
        ensure_kind(decl, decl.kind == ArrayKind::Dynamic, "a dynamic array")?;
        downcast::<Vec<T>, T>(decl, buffer)
    }

    /// The growable vector behind a dynamic array
    pub fn dynamic_mut<T: Element>(&mut self, id: ArrayId) -> Result<&mut Vec<T>> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind == ArrayKind::Dynamic, "a dynamic array")?;
        downcast_mut::<Vec<T>, T>(decl, buffer)
    }

    pub fn dynamic_2d<T: Element>(&self, id: ArrayId) -> Result<&DynamicArray2D<T>> {
        let (decl, buffer) = self.buffer(id)?;
        ensure_kind(decl, decl.kind == ArrayKind::Dynamic2D, "a 2-D dynamic array")?;
        downcast::<DynamicArray2D<T>, T>(decl, buffer)
    }

    pub fn dynamic_2d_mut<T: Element>(&mut self, id: ArrayId) -> Result<&mut DynamicArray2D<T>> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind == ArrayKind::Dynamic2D, "a 2-D dynamic array")?;
        downcast_mut::<DynamicArray2D<T>, T>(decl, buffer)
    }

    /// Read one 1-D array while writing another
    ///
    /// # Errors
    ///
    /// `AliasedArrays` if both ids are the same array.
    pub fn slice_pair_mut<R: Element, W: Element>(
        &mut self,
        read: ArrayId,
        write: ArrayId,
    ) -> Result<(&[R], &mut [W])> {
        self.ensure_allocated()?;
        self.slot(read)?;
        self.slot(write)?;
        if read == write {
            return Err(StorageError::AliasedArrays(self.slots[read.index()].decl.name.clone()));
        }

        let (read_slot, write_slot) = if read.index() < write.index() {
            let (lo, hi) = self.slots.split_at_mut(write.index());
            (&lo[read.index()], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(read.index());
            (&hi[0], &mut lo[write.index()])
        };

        let read_decl = &read_slot.decl;
        ensure_kind(read_decl, read_decl.kind.is_one_dimensional(), "a 1-D array")?;
        let read_buffer = read_slot.buffer.as_deref().ok_or(StorageError::NotAllocated)?;
        let read_values = downcast::<Vec<R>, R>(read_decl, read_buffer)?;

        let ArraySlot { decl: write_decl, buffer } = write_slot;
        ensure_kind(write_decl, write_decl.kind.is_one_dimensional(), "a 1-D array")?;
        let write_buffer = buffer.as_deref_mut().ok_or(StorageError::NotAllocated)?;
        let write_values = downcast_mut::<Vec<W>, W>(write_decl, write_buffer)?;

        Ok((read_values.as_slice(), write_values.as_mut_slice()))
    }

    /// Replace an array's contents
    ///
    /// Fixed arrays require `values.len()` to equal their size; dynamic arrays
    /// take the new length.
    pub fn fill_from_slice<T: Element>(&mut self, id: ArrayId, values: &[T]) -> Result<()> {
        let (decl, buffer) = self.buffer_mut(id)?;
        ensure_kind(decl, decl.kind.is_one_dimensional(), "a 1-D array")?;
        let target = downcast_mut::<Vec<T>, T>(decl, buffer)?;
        if decl.kind.is_fixed_size() {
            if values.len() != target.len() {
                return Err(StorageError::SizeMismatch {
                    name: decl.name.clone(),
                    expected: target.len(),
                    actual: values.len(),
                });
            }
            target.copy_from_slice(values);
        } else {
            target.clear();
            target.extend_from_slice(values);
        }
        Ok(())
    }

    /// Copy of an array's contents, 2-D arrays flattened row-major
    pub fn to_vec<T: Element>(&self, id: ArrayId) -> Result<Vec<T>> {
        let (decl, buffer) = self.buffer(id)?;
        if decl.kind == ArrayKind::Dynamic2D {
            downcast::<DynamicArray2D<T>, T>(decl, buffer).map(DynamicArray2D::flatten)
        } else {
            downcast::<Vec<T>, T>(decl, buffer).map(Vec::clone)
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn slot(&self, id: ArrayId) -> Result<&ArraySlot> {
        self.slots
            .get(id.index())
            .ok_or(StorageError::UnknownArrayId(id))
    }

    fn ensure_allocated(&self) -> Result<()> {
        match self.state {
            StorageState::Allocated => Ok(()),
            StorageState::Declared => Err(StorageError::NotAllocated),
            StorageState::Released => Err(StorageError::Released),
        }
    }

    fn buffer(&self, id: ArrayId) -> Result<(&ArrayDecl, &dyn ArrayBuffer)> {
        self.ensure_allocated()?;
        let slot = self.slot(id)?;
        let buffer = slot.buffer.as_deref().ok_or(StorageError::NotAllocated)?;
        Ok((&slot.decl, buffer))
    }

    fn buffer_mut(&mut self, id: ArrayId) -> Result<(&ArrayDecl, &mut dyn ArrayBuffer)> {
        self.ensure_allocated()?;
        let ArraySlot { decl, buffer } = self
            .slots
            .get_mut(id.index())
            .ok_or(StorageError::UnknownArrayId(id))?;
        let buffer = buffer.as_deref_mut().ok_or(StorageError::NotAllocated)?;
        Ok((&*decl, buffer))
    }
}

fn kind_error(decl: &ArrayDecl, expected: &'static str) -> StorageError {
    StorageError::KindMismatch {
        name: decl.name.clone(),
        expected,
        actual: decl.kind,
    }
}

fn ensure_kind(decl: &ArrayDecl, ok: bool, expected: &'static str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(kind_error(decl, expected))
    }
}

fn type_error<T: Element>(decl: &ArrayDecl) -> StorageError {
    StorageError::TypeMismatch {
        name: decl.name.clone(),
        expected: T::DTYPE,
        actual: decl.dtype,
    }
}

fn downcast<'a, B: 'static, T: Element>(decl: &ArrayDecl, buffer: &'a dyn ArrayBuffer) -> Result<&'a B> {
    buffer
        .as_any()
        .downcast_ref::<B>()
        .ok_or_else(|| type_error::<T>(decl))
}

fn downcast_mut<'a, B: 'static, T: Element>(
    decl: &ArrayDecl,
    buffer: &'a mut dyn ArrayBuffer,
) -> Result<&'a mut B> {
    buffer
        .as_any_mut()
        .downcast_mut::<B>()
        .ok_or_else(|| type_error::<T>(decl))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocated() -> (StorageManager, ArrayId, ArrayId, ArrayId, ArrayId) {
        let mut storage = StorageManager::new();
        let v = storage
            .declare_fixed("_array_neurongroup_v", DType::F64, 4, InitPolicy::Zeros)
            .unwrap();
        let i = storage
            .declare_fixed("_array_neurongroup_i", DType::I32, 4, InitPolicy::Arange { start: 0 })
            .unwrap();
        let w = storage
            .declare_dynamic("_dynamic_array_synapses_w", DType::F64, 0)
            .unwrap();
        let rows = storage
            .declare_dynamic_2d("_dynamic_array_monitor_v", DType::F32, 2, 0)
            .unwrap();
        storage.allocate().unwrap();
        (storage, v, i, w, rows)
    }

    #[test]
    fn test_allocate_applies_init_policies() {
        let (storage, v, i, _, _) = allocated();
        assert_eq!(storage.fixed::<f64>(v).unwrap(), &[0.0; 4]);
        assert_eq!(storage.fixed::<i32>(i).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(storage.state(), StorageState::Allocated);
    }

    #[test]
    fn test_duplicate_and_late_declarations() {
        let mut storage = StorageManager::new();
        storage.declare_dynamic("a", DType::U8, 0).unwrap();
        assert!(matches!(
            storage.declare_dynamic("a", DType::U8, 0),
            Err(StorageError::DuplicateArray(_))
        ));
        storage.allocate().unwrap();
        assert!(matches!(
            storage.declare_dynamic("b", DType::U8, 0),
            Err(StorageError::AlreadyAllocated)
        ));
        assert!(matches!(storage.allocate(), Err(StorageError::AlreadyAllocated)));
    }

    #[test]
    fn test_access_before_allocate_and_after_release() {
        let mut storage = StorageManager::new();
        let v = storage.declare_fixed("v", DType::F64, 1, InitPolicy::Zeros).unwrap();
        assert!(matches!(storage.fixed::<f64>(v), Err(StorageError::NotAllocated)));

        storage.allocate().unwrap();
        assert!(storage.release());
        assert!(matches!(storage.fixed::<f64>(v), Err(StorageError::Released)));
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut storage, ..) = allocated();
        assert!(storage.release());
        assert_eq!(storage.generation(), 1);
        assert!(!storage.release());
        assert!(!storage.release());
        assert_eq!(storage.generation(), 1);
        assert_eq!(storage.state(), StorageState::Released);
    }

    #[test]
    fn test_type_and_kind_checks() {
        let (mut storage, v, _, w, rows) = allocated();
        assert!(matches!(
            storage.fixed::<f32>(v),
            Err(StorageError::TypeMismatch { expected: DType::F32, actual: DType::F64, .. })
        ));
        assert!(matches!(storage.dynamic::<f64>(v), Err(StorageError::KindMismatch { .. })));
        assert!(matches!(storage.fixed_mut::<f64>(w), Err(StorageError::KindMismatch { .. })));
        assert!(matches!(storage.slice::<f32>(rows), Err(StorageError::KindMismatch { .. })));
        assert!(matches!(storage.len(ArrayId(99)), Err(StorageError::UnknownArrayId(_))));
        assert!(matches!(storage.id("nope"), Err(StorageError::UnknownArray(_))));
    }

    #[test]
    fn test_dynamic_growth() {
        let (mut storage, _, _, w, _) = allocated();
        storage.dynamic_mut::<f64>(w).unwrap().extend([0.5, 1.5]);
        assert_eq!(storage.len(w).unwrap(), 2);

        let copy = storage.to_vec::<f64>(w).unwrap();
        storage.resize_dynamic(w, 5).unwrap();
        assert_eq!(storage.dynamic::<f64>(w).unwrap(), &vec![0.5, 1.5, 0.0, 0.0, 0.0]);
        // Copies taken earlier are unaffected by growth
        assert_eq!(copy, vec![0.5, 1.5]);

        storage.resize_dynamic(w, 1).unwrap();
        assert_eq!(storage.slice::<f64>(w).unwrap(), &[0.5]);
    }

    #[test]
    fn test_two_dimensional_access() {
        let (mut storage, _, _, _, rows) = allocated();
        storage.resize_row(rows, 1, 3).unwrap();
        storage.resize_rows(rows, 3).unwrap();
        storage.dynamic_2d_mut::<f32>(rows).unwrap().row_mut(1).unwrap()[2] = 4.0;

        assert_eq!(storage.num_rows(rows).unwrap(), 3);
        assert_eq!(storage.len(rows).unwrap(), 3);
        assert_eq!(storage.to_vec::<f32>(rows).unwrap(), vec![0.0, 0.0, 4.0]);
        assert!(matches!(
            storage.resize_row(rows, 7, 1),
            Err(StorageError::RowOutOfRange { row: 7, rows: 3, .. })
        ));
    }

    #[test]
    fn test_fill_from_slice() {
        let (mut storage, v, _, w, _) = allocated();
        storage.fill_from_slice(v, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(storage.fixed::<f64>(v).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(
            storage.fill_from_slice(v, &[1.0]),
            Err(StorageError::SizeMismatch { expected: 4, actual: 1, .. })
        ));

        storage.fill_from_slice(w, &[9.0; 7]).unwrap();
        assert_eq!(storage.len(w).unwrap(), 7);
    }

    #[test]
    fn test_slice_pair_mut() {
        let (mut storage, v, i, _, _) = allocated();
        let (indices, values) = storage.slice_pair_mut::<i32, f64>(i, v).unwrap();
        for &idx in indices {
            values[idx as usize] += 0.25 * idx as f64;
        }
        assert_eq!(storage.fixed::<f64>(v).unwrap(), &[0.0, 0.25, 0.5, 0.75]);

        // Write slot before read slot
        let (values, _) = storage.slice_pair_mut::<f64, i32>(v, i).unwrap();
        assert_eq!(values.len(), 4);
        assert!(matches!(
            storage.slice_pair_mut::<f64, f64>(v, v),
            Err(StorageError::AliasedArrays(_))
        ));
    }

    #[test]
    fn test_persist_all_skips_static_and_writes_current_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageManager::new();
        let fixed = storage.declare_fixed("fixed", DType::I64, 3, InitPolicy::Arange { start: 5 }).unwrap();
        storage.declare_static("static", DType::F64, 2).unwrap();
        let dynamic = storage.declare_dynamic("dynamic", DType::U16, 10).unwrap();
        storage.allocate().unwrap();
        storage.resize_dynamic(dynamic, 4).unwrap();

        let results = dir.path().join("results");
        let report = storage.persist_all(&results, true).unwrap();
        assert!(report.is_complete());
        assert_eq!(
            report.written,
            vec![("fixed".to_string(), 24), ("dynamic".to_string(), 8)]
        );
        assert!(!results.join("static").exists());
        assert_eq!(fs::read(results.join("dynamic")).unwrap().len(), 8);

        let bytes = fs::read(results.join("fixed")).unwrap();
        let values: &[i64] = bytemuck::cast_slice(&bytes);
        assert_eq!(values, storage.fixed::<i64>(fixed).unwrap());
    }

    #[test]
    fn test_persist_to_unwritable_location_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();

        let (storage, ..) = allocated();
        let report = storage.persist_all(&blocker, true).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.failed.len(), 4);
        assert!(report.failed.iter().all(StorageError::is_snapshot_error));
    }

    #[test]
    fn test_load_static_arrays_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageManager::new();
        let present = storage.declare_static("present", DType::I32, 2).unwrap();
        let missing = storage.declare_static("missing", DType::I32, 2).unwrap();
        let external = storage.declare_fixed("external", DType::U8, 3, InitPolicy::External).unwrap();
        storage.declare_fixed("zeros", DType::U8, 3, InitPolicy::Zeros).unwrap();
        storage.allocate().unwrap();

        fs::write(dir.path().join("present"), bytemuck::cast_slice::<i32, u8>(&[3, -4])).unwrap();
        fs::write(dir.path().join("external"), [1u8, 2, 3]).unwrap();

        let report = storage.load_static_arrays(dir.path()).unwrap();
        assert_eq!(report.loaded, vec!["present".to_string(), "external".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].array_name(), Some("missing"));
        assert_eq!(storage.fixed::<i32>(present).unwrap(), &[3, -4]);
        assert_eq!(storage.fixed::<i32>(missing).unwrap(), &[0, 0]);
        assert_eq!(storage.fixed::<u8>(external).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_load_rejects_two_dimensional_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let (mut storage, _, _, _, rows) = allocated();
        assert!(matches!(
            storage.load(rows, dir.path()),
            Err(StorageError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_external_dynamic_array_takes_length_from_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageManager::new();
        let pre = storage
            .declare(ArrayDecl {
                name: "_dynamic_array_synapses__synaptic_pre".to_string(),
                dtype: DType::I32,
                kind: ArrayKind::Dynamic,
                size: 0,
                row_len: 0,
                init: InitPolicy::External,
            })
            .unwrap();
        let w = storage.declare_dynamic("_dynamic_array_synapses_w", DType::F64, 2).unwrap();
        storage.allocate().unwrap();

        fs::write(
            dir.path().join("_dynamic_array_synapses__synaptic_pre"),
            bytemuck::cast_slice::<i32, u8>(&[0, 0, 1]),
        )
        .unwrap();
        fs::write(dir.path().join("_dynamic_array_synapses_w"), [0u8; 8]).unwrap();

        let report = storage.load_static_arrays(dir.path()).unwrap();
        assert_eq!(report.loaded, vec!["_dynamic_array_synapses__synaptic_pre".to_string()]);
        assert_eq!(storage.dynamic::<i32>(pre).unwrap(), &vec![0, 0, 1]);
        // Not external: untouched by the bulk load, but loadable on request
        assert_eq!(storage.len(w).unwrap(), 2);
        assert_eq!(storage.load(w, dir.path()).unwrap(), 8);
        assert_eq!(storage.len(w).unwrap(), 1);
    }
}
