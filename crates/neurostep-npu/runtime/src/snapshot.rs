// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Snapshot files
//!
//! One headerless file per array, named after the array, holding the raw
//! native-endian element bytes. Loading a fixed-size array reads exactly the
//! declared size; loading a dynamic array takes its length from the file.
//! Persist writes the current length.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::buffer::ArrayBuffer;
use crate::error::{Result, StorageError};

/// Outcome of loading a set of snapshots
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Arrays populated from their snapshot
    pub loaded: Vec<String>,
    /// Arrays left with their prior contents
    pub failed: Vec<StorageError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of persisting every array
#[derive(Debug, Default)]
pub struct PersistReport {
    /// `(array name, bytes written)` in declaration order
    pub written: Vec<(String, u64)>,
    /// Arrays whose file could not be written
    pub failed: Vec<StorageError>,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn bytes_written(&self) -> u64 {
        self.written.iter().map(|(_, bytes)| bytes).sum()
    }
}

/// `<dir>/<name>`
pub fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// Fill a 1-D buffer from `path`
///
/// Reads the first `len * element_size` bytes. A shorter file leaves the
/// buffer untouched.
pub(crate) fn read_into(name: &str, path: &Path, buffer: &mut dyn ArrayBuffer) -> Result<usize> {
    let io_err = |source: std::io::Error| StorageError::Snapshot {
        name: name.to_string(),
        path: path.to_path_buf(),
        source,
    };

    let expected = buffer.len() * buffer.dtype().size();
    let file = File::open(path).map_err(io_err)?;
    let mut data = Vec::with_capacity(expected);
    file.take(expected as u64)
        .read_to_end(&mut data)
        .map_err(io_err)?;

    if data.len() < expected {
        return Err(StorageError::ShortSnapshot {
            name: name.to_string(),
            path: path.to_path_buf(),
            expected,
            actual: data.len(),
        });
    }

    match buffer.bytes_mut() {
        Some(bytes) => {
            bytes.copy_from_slice(&data);
            Ok(expected)
        }
        None => Err(StorageError::KindMismatch {
            name: name.to_string(),
            expected: "a fixed-size array",
            actual: crate::declaration::ArrayKind::Dynamic2D,
        }),
    }
}

/// Replace the contents of a dynamic 1-D buffer with the whole file at `path`
///
/// The file must hold a whole number of elements.
pub(crate) fn read_resized(name: &str, path: &Path, buffer: &mut dyn ArrayBuffer) -> Result<usize> {
    if buffer.num_rows().is_some() {
        return Err(StorageError::KindMismatch {
            name: name.to_string(),
            expected: "a 1-D array",
            actual: crate::declaration::ArrayKind::Dynamic2D,
        });
    }
    let data = std::fs::read(path).map_err(|source| StorageError::Snapshot {
        name: name.to_string(),
        path: path.to_path_buf(),
        source,
    })?;

    let element = buffer.dtype().size();
    let partial = data.len() % element;
    if partial != 0 {
        return Err(StorageError::ShortSnapshot {
            name: name.to_string(),
            path: path.to_path_buf(),
            expected: data.len() - partial + element,
            actual: data.len(),
        });
    }

    buffer.resize(data.len() / element);
    if let Some(bytes) = buffer.bytes_mut() {
        bytes.copy_from_slice(&data);
    }
    Ok(data.len())
}

/// Write a buffer to `path`, replacing any existing file
pub(crate) fn write_from(name: &str, path: &Path, buffer: &dyn ArrayBuffer) -> Result<u64> {
    let io_err = |source: std::io::Error| StorageError::Snapshot {
        name: name.to_string(),
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    buffer.write_bytes(&mut writer).map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    Ok((buffer.len() * buffer.dtype().size()) as u64)
}
