//! Staging area for positioned mutations.
//!
//! A `RowImage` holds the values a caller has set on a row, one slot per
//! column, each with a dirty flag. The image for the current row also keeps
//! the values originally fetched, which locate the row on the server. The
//! insert row has no original values.
//!
//! Statements are never built from a live image: the cursor takes a
//! [`RowSnapshot`] first, so the SQL text and its bind values always come
//! from the same state.

use std::sync::Arc;

use crate::error::{Error, Result};

use super::column::ColumnInfo;
use super::metadata::ColumnMetadata;
use super::row::Row;
use super::value::SqlValue;

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    /// Staged value; `None` while unset.
    value: Option<SqlValue>,
    dirty: bool,
}

impl Slot {
    const UNSET: Slot = Slot {
        value: None,
        dirty: false,
    };
}

/// Mutable staging row owned by a cursor.
#[derive(Debug, Clone)]
pub struct RowImage {
    columns: Arc<ColumnInfo>,
    original: Option<Vec<SqlValue>>,
    slots: Vec<Slot>,
}

impl RowImage {
    /// Image over a fetched row.
    pub fn for_row(row: &Row) -> Self {
        Self {
            columns: Arc::clone(row.column_info()),
            original: Some(row.values().to_vec()),
            slots: vec![Slot::UNSET; row.len()],
        }
    }

    /// Empty image for a pending insert.
    pub fn for_insert(columns: Arc<ColumnInfo>) -> Self {
        let len = columns.len();
        Self {
            columns,
            original: None,
            slots: vec![Slot::UNSET; len],
        }
    }

    pub fn columns(&self) -> &Arc<ColumnInfo> {
        &self.columns
    }

    fn column(&self, index: usize) -> Result<&ColumnMetadata> {
        self.columns
            .get(index)
            .ok_or(Error::ColumnIndexOutOfBounds {
                index,
                count: self.columns.len(),
            })
    }

    /// Stage `value` for the column at `index` and mark it dirty.
    ///
    /// The value is checked against the column's declared type first; on
    /// failure the slot is left as it was.
    pub fn set_value(&mut self, index: usize, value: SqlValue) -> Result<()> {
        let column = self.column(index)?;
        let value = column.sql_type.coerce(&column.name, value)?;
        self.slots[index] = Slot {
            value: Some(value),
            dirty: true,
        };
        Ok(())
    }

    /// Current value of a column: the staged value if set, otherwise the
    /// original one. `None` for an unset column of the insert row.
    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        let slot = self.slots.get(index)?;
        slot.value
            .as_ref()
            .or_else(|| self.original.as_ref().and_then(|o| o.get(index)))
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.dirty)
    }

    /// Whether any column is dirty.
    pub fn has_changes(&self) -> bool {
        self.slots.iter().any(|s| s.dirty)
    }

    pub fn is_insert_row(&self) -> bool {
        self.original.is_none()
    }

    /// Reset dirty flags after a successful commit.
    ///
    /// Staged values of the current row become its original values, since
    /// that is now the server state.
    pub fn clear_dirty(&mut self) {
        if let Some(original) = self.original.as_mut() {
            for (slot, orig) in self.slots.iter_mut().zip(original.iter_mut()) {
                if let Some(value) = slot.value.take() {
                    *orig = value;
                }
            }
        }
        for slot in &mut self.slots {
            slot.dirty = false;
        }
    }

    /// Drop every staged value.
    pub fn reset(&mut self) {
        self.slots.fill(Slot::UNSET);
    }

    /// Immutable copy for statement construction.
    pub fn snapshot(&self) -> RowSnapshot {
        RowSnapshot {
            columns: Arc::clone(&self.columns),
            original: self.original.clone(),
            staged: self
                .slots
                .iter()
                .map(|s| if s.dirty { s.value.clone() } else { None })
                .collect(),
        }
    }
}

/// Frozen state of a [`RowImage`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowSnapshot {
    columns: Arc<ColumnInfo>,
    original: Option<Vec<SqlValue>>,
    staged: Vec<Option<SqlValue>>,
}

impl RowSnapshot {
    pub fn columns(&self) -> &ColumnInfo {
        &self.columns
    }

    /// Originally fetched value; `None` for the insert row.
    pub fn original(&self, index: usize) -> Option<&SqlValue> {
        self.original.as_ref().and_then(|o| o.get(index))
    }

    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }

    /// Staged value of a dirty column.
    pub fn staged(&self, index: usize) -> Option<&SqlValue> {
        self.staged.get(index).and_then(Option::as_ref)
    }

    /// Dirty columns in column order.
    pub fn dirty(&self) -> impl Iterator<Item = (usize, &SqlValue)> {
        self.staged
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }

    /// Values after applying the staged changes. Unset columns of an insert
    /// row are NULL.
    pub fn merged(&self) -> Vec<SqlValue> {
        (0..self.staged.len())
            .map(|i| {
                self.staged(i)
                    .or_else(|| self.original(i))
                    .cloned()
                    .unwrap_or(SqlValue::Null)
            })
            .collect()
    }
}
