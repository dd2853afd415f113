//! Named, resizable sample buffers.
//!
//! A [`Table`] backs delay memory, convolution kernels, and waveform lookups.
//! Its allocation is always a multiple of [`VECTOR_WIDTH`] so vector reads at
//! aligned heads never run off the end; samples between the logical length
//! and the allocated capacity are kept at zero.
//!
//! The [`TableSet`] is the context's directory of tables. Objects hold a
//! [`TableId`] rather than a reference, so a table can be resized by control
//! messages between vectors without invalidating anything.

#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, string::String, vec::Vec};
#[cfg(feature = "std")]
use std::collections::BTreeMap;

use crate::vector::{VECTOR_WIDTH, ceil_to_vector};

/// Errors returned by table operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// Tables must hold at least one sample.
    #[error("table length must be positive")]
    InvalidLength,
    /// The allocator refused to grow the buffer.
    #[error("failed to allocate {requested} samples")]
    AllocationFailed {
        /// Capacity in samples that was requested.
        requested: usize,
    },
    /// No table with this name exists.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// A table with this name already exists.
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
}

/// Index of a table inside a [`TableSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) u32);

impl TableId {
    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A named float buffer with a logical length and a vector-aligned capacity.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    buffer: Vec<f32>,
    len: usize,
    head: usize,
}

impl Table {
    /// Creates a zeroed table of `len` samples.
    pub fn new(name: impl Into<String>, len: usize) -> Result<Self, TableError> {
        if len == 0 {
            return Err(TableError::InvalidLength);
        }
        let capacity = ceil_to_vector(len);
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|_| TableError::AllocationFailed {
                requested: capacity,
            })?;
        buffer.resize(capacity, 0.0);
        Ok(Self {
            name: name.into(),
            buffer,
            len,
            head: 0,
        })
    }

    /// Creates a table holding a copy of `samples`.
    pub fn from_samples(name: impl Into<String>, samples: &[f32]) -> Result<Self, TableError> {
        let mut table = Self::new(name, samples.len())?;
        table.buffer[..samples.len()].copy_from_slice(samples);
        Ok(table)
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical length in samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; tables hold at least one sample.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated capacity in samples (a multiple of [`VECTOR_WIDTH`]).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Position last published by a table writer.
    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    /// Publishes a writer position, clamped to the logical length.
    #[inline]
    pub fn set_head(&mut self, head: usize) {
        self.head = head.min(self.len);
    }

    /// The full allocated buffer, including the zeroed tail.
    #[inline]
    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    /// Mutable access to the full allocated buffer.
    ///
    /// Callers preloading data should only write the first [`len`](Self::len)
    /// samples; vector readers expect the tail to stay silent.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }

    /// The first [`len`](Self::len) samples.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.buffer[..self.len]
    }

    /// Mutable view of the first [`len`](Self::len) samples.
    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.buffer[..self.len]
    }

    /// Zeroes the contents and resets the head.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.head = 0;
    }

    /// Resizes the table to `new_len` samples.
    ///
    /// The first `min(old, new)` samples are kept and the rest is zero. Returns
    /// the signed change of the allocation in bytes, which is `0` when the
    /// vector-aligned capacity did not change. On error the table is left
    /// exactly as it was.
    pub fn resize(&mut self, new_len: usize) -> Result<isize, TableError> {
        if new_len == 0 {
            return Err(TableError::InvalidLength);
        }
        let old_capacity = self.buffer.len();
        let new_capacity = ceil_to_vector(new_len);

        if new_capacity > old_capacity {
            self.buffer
                .try_reserve_exact(new_capacity - old_capacity)
                .map_err(|_| TableError::AllocationFailed {
                    requested: new_capacity,
                })?;
            self.buffer.resize(new_capacity, 0.0);
        } else {
            self.buffer.truncate(new_capacity);
        }
        if new_len < self.len {
            self.buffer[new_len..].fill(0.0);
        }
        self.len = new_len;
        self.head = self.head.min(new_len);

        #[cfg(feature = "tracing")]
        tracing::debug!("table_resize: '{}' → {new_len} samples", self.name);

        let delta = new_capacity as isize - old_capacity as isize;
        Ok(delta * core::mem::size_of::<f32>() as isize)
    }
}

/// Directory of tables, addressable by name or [`TableId`].
#[derive(Debug, Default)]
pub struct TableSet {
    tables: Vec<Table>,
    names: BTreeMap<String, TableId>,
}

impl TableSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a zeroed table of `len` samples.
    pub fn insert(&mut self, name: &str, len: usize) -> Result<TableId, TableError> {
        self.insert_table(Table::new(name, len)?)
    }

    /// Adds an existing table.
    pub fn insert_table(&mut self, table: Table) -> Result<TableId, TableError> {
        if self.names.contains_key(table.name()) {
            return Err(TableError::DuplicateTable(table.name().into()));
        }
        let id = TableId(self.tables.len() as u32);
        self.names.insert(table.name().into(), id);
        self.tables.push(table);
        Ok(id)
    }

    /// Looks up a table id by name.
    pub fn id(&self, name: &str) -> Option<TableId> {
        self.names.get(name).copied()
    }

    /// Returns the table for `id`.
    ///
    /// Ids are only minted by this set, so a foreign id is a caller error.
    #[inline]
    pub fn get(&self, id: TableId) -> &Table {
        &self.tables[id.0 as usize]
    }

    /// Returns the table for `id` mutably.
    #[inline]
    pub fn get_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0 as usize]
    }

    /// Looks up a table by name.
    pub fn by_name(&self, name: &str) -> Option<&Table> {
        self.id(name).map(|id| self.get(id))
    }

    /// Looks up a table by name, mutably.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Table> {
        let id = self.id(name)?;
        Some(self.get_mut(id))
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True if the set holds no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Iterates tables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TableId, &Table)> {
        self.tables
            .iter()
            .enumerate()
            .map(|(i, t)| (TableId(i as u32), t))
    }

    /// Total allocated bytes across all tables.
    pub fn allocated_bytes(&self) -> usize {
        self.tables
            .iter()
            .map(|t| t.capacity() * core::mem::size_of::<f32>())
            .sum()
    }
}

const _: () = assert!(VECTOR_WIDTH.is_power_of_two());
