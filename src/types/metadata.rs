//! Column and table metadata of a prepared query.

use std::sync::Arc;

use crate::codec;
use crate::error::{Error, Result};

use super::column::ColumnInfo;
use super::sql_type::SqlType;
use super::value::{SqlValue, WireValue};

/// Metadata of one result column, as described by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub sql_type: SqlType,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Whether the server supplies a value when an insert omits the column.
    pub has_default: bool,
    /// Table the column belongs to, when it is a plain table column.
    pub relation: Option<String>,
    /// Whether the column is part of the table's primary key.
    pub key: bool,
}

impl ColumnMetadata {
    /// Create new column metadata with minimal info.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            has_default: false,
            relation: None,
            key: false,
        }
    }

    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Mark as primary key column (implies NOT NULL).
    pub fn primary_key(mut self) -> Self {
        self.key = true;
        self.nullable = false;
        self
    }

    /// Convert a staged value into its wire form for this column.
    ///
    /// NUMERIC/DECIMAL values are rounded to the declared scale here.
    pub fn bind(&self, value: &SqlValue) -> Result<WireValue> {
        if value.is_null() {
            return Ok(WireValue::Null);
        }
        if !self.sql_type.is_fixed_point() {
            return Ok(WireValue::Value(value.clone()));
        }

        let exact = value
            .as_decimal()
            .ok_or_else(|| Error::type_mismatch(&self.name, self.sql_type, value.kind()))?;
        codec::encode(
            &exact,
            self.sql_type.precision(),
            u32::from(self.sql_type.scale()),
        )
        .map(WireValue::Scaled)
        .map_err(|e| e.with_column(&self.name))
    }

    /// Convert a fetched wire value into a column value.
    pub fn decode(&self, raw: WireValue) -> Result<SqlValue> {
        match raw {
            WireValue::Null => Ok(SqlValue::Null),
            WireValue::Scaled(scaled) if self.sql_type.is_fixed_point() => {
                Ok(SqlValue::Decimal(codec::decode(&scaled)))
            }
            WireValue::Scaled(_) => Err(Error::type_mismatch(
                &self.name,
                self.sql_type,
                "scaled integer",
            )),
            WireValue::Value(value) => Ok(value),
        }
    }
}

/// The table behind an updatable result set.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    /// Table name as reported by the server.
    pub name: String,
    /// Result columns, all belonging to `name`.
    pub columns: Arc<ColumnInfo>,
    /// Indexes into `columns` of the primary key columns. Empty when the
    /// table has no declared key.
    pub key_columns: Vec<usize>,
}

impl TableMetadata {
    /// Derive the owning table from result column metadata.
    ///
    /// Every column must belong to the same table.
    pub fn from_columns(columns: Arc<ColumnInfo>) -> Result<Self> {
        let mut name: Option<&str> = None;
        for col in columns.iter() {
            let Some(relation) = col.relation.as_deref() else {
                return Err(Error::NotUpdatable {
                    reason: format!("column {} is not a table column", col.name),
                });
            };
            match name {
                None => name = Some(relation),
                Some(existing) if existing == relation => {}
                Some(existing) => {
                    return Err(Error::NotUpdatable {
                        reason: format!(
                            "columns come from more than one table ({}, {})",
                            existing, relation
                        ),
                    })
                }
            }
        }
        let name = name
            .ok_or_else(|| Error::NotUpdatable {
                reason: "query has no columns".to_string(),
            })?
            .to_string();

        let key_columns = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key)
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            name,
            columns,
            key_columns,
        })
    }

    /// Whether rows are located by the full original row instead of a key.
    pub fn uses_full_row_match(&self) -> bool {
        self.key_columns.is_empty()
    }
}
