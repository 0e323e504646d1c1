//! Shared column information for all rows of a result set.

use super::metadata::ColumnMetadata;

/// Column definitions shared (via `Arc`) by every row and row image of a
/// result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column definitions.
    pub columns: Vec<ColumnMetadata>,
}

impl ColumnInfo {
    /// Create new column info from columns.
    pub fn new(columns: Vec<ColumnMetadata>) -> Self {
        Self { columns }
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column by index.
    pub fn get(&self, index: usize) -> Option<&ColumnMetadata> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter()
    }

    /// Find column index by name.
    ///
    /// An exact match wins; otherwise names are compared case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                let name_upper = name.to_uppercase();
                self.columns
                    .iter()
                    .position(|c| c.name.to_uppercase() == name_upper)
            })
    }
}
