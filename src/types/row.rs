//! Fetched rows.

use std::sync::Arc;

use super::column::ColumnInfo;
use super::value::SqlValue;

/// A row as fetched, or as last written through a cursor.
///
/// Rows of one result share their column information.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<SqlValue>,
    column_info: Arc<ColumnInfo>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>, column_info: Arc<ColumnInfo>) -> Self {
        Self {
            values,
            column_info,
        }
    }

    /// Get value by column index (0-based).
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Get value by column name, matched case-insensitively.
    pub fn get_by_name(&self, name: &str) -> Option<&SqlValue> {
        self.column_info
            .find_by_name(name)
            .and_then(|idx| self.values.get(idx))
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub(crate) fn column_info(&self) -> &Arc<ColumnInfo> {
        &self.column_info
    }
}
