//! Positioned-mutation statement synthesis.
//!
//! `RowUpdater` turns a [`RowSnapshot`] into parameterized UPDATE, INSERT,
//! DELETE and refresh SELECT statements against the table behind a result
//! set. Identifiers are written through the session's [`Dialect`]; values of
//! NUMERIC/DECIMAL columns are bound through the fixed-point codec with the
//! column's declared precision and scale.
//!
//! Rows are located by their primary key. A table without a declared key is
//! matched on every column of the original row, which can hit more than one
//! physical row when rows are duplicated.

use std::fmt;

use crate::codec;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::types::{ColumnMetadata, RowSnapshot, SqlType, SqlValue, TableMetadata, WireValue};

/// Kind of synthesized statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Update,
    Insert,
    Delete,
    Refresh,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementKind::Update => "UPDATE",
            StatementKind::Insert => "INSERT",
            StatementKind::Delete => "DELETE",
            StatementKind::Refresh => "SELECT",
        })
    }
}

/// SQL text plus bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    /// Target table name (unquoted).
    pub table: String,
    pub sql: String,
    pub binds: Vec<WireValue>,
    /// Declared type of the column behind each bind.
    pub bind_types: Vec<SqlType>,
}

impl Statement {
    fn new(kind: StatementKind, table: &str) -> Self {
        Self {
            kind,
            table: table.to_string(),
            sql: String::new(),
            binds: Vec::new(),
            bind_types: Vec::new(),
        }
    }

    fn push_bind(&mut self, column: &ColumnMetadata, value: &SqlValue) -> Result<()> {
        self.binds.push(column.bind(value)?);
        self.bind_types.push(column.sql_type);
        Ok(())
    }

    /// The SQL text with bind values written inline as literals.
    ///
    /// For logs and diagnostics only; execution always uses placeholders.
    pub fn display_sql(&self, dialect: Dialect) -> String {
        let mut out = String::with_capacity(self.sql.len() + self.binds.len() * 8);
        let mut binds = self.binds.iter().zip(self.bind_types.iter());
        let mut quote: Option<char> = None;

        for ch in self.sql.chars() {
            match (quote, ch) {
                (None, '"' | '\'') => quote = Some(ch),
                (Some(q), c) if c == q => quote = None,
                (None, '?') => {
                    if let Some((value, ty)) = binds.next() {
                        out.push_str(&literal(dialect, value, ty));
                        continue;
                    }
                }
                _ => {}
            }
            out.push(ch);
        }
        out
    }
}

fn literal(dialect: Dialect, value: &WireValue, ty: &SqlType) -> String {
    match value {
        WireValue::Null => "NULL".to_string(),
        WireValue::Scaled(raw) => {
            dialect.numeric_literal(&codec::decode(raw), ty.precision(), ty.scale())
        }
        WireValue::Value(v) => match v {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(_) | SqlValue::Double(_) | SqlValue::Boolean(_) => v.to_string(),
            SqlValue::Decimal(d) => dialect.numeric_literal(d, ty.precision(), ty.scale()),
            SqlValue::Text(s) => dialect.string_literal(s),
            SqlValue::Date(_) => format!("DATE {}", dialect.string_literal(&v.to_string())),
            SqlValue::Timestamp(_) => {
                format!("TIMESTAMP {}", dialect.string_literal(&v.to_string()))
            }
            SqlValue::Binary(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                format!("X'{}'", hex)
            }
        },
    }
}

/// Builds positioned statements for one table in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct RowUpdater<'a> {
    table: &'a TableMetadata,
    dialect: Dialect,
}

impl<'a> RowUpdater<'a> {
    pub fn new(table: &'a TableMetadata, dialect: Dialect) -> Self {
        Self { table, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn column(&self, index: usize) -> &ColumnMetadata {
        &self.table.columns.columns[index]
    }

    fn quoted_table(&self) -> String {
        self.dialect.quote(&self.table.name)
    }

    /// Columns that identify a row: the primary key, or every column.
    fn locator_columns(&self) -> Vec<usize> {
        if self.table.uses_full_row_match() {
            (0..self.table.columns.len()).collect()
        } else {
            self.table.key_columns.clone()
        }
    }

    /// Append ` WHERE ...` locating the row whose values `value_of` returns.
    fn push_where<'v>(
        &self,
        stmt: &mut Statement,
        value_of: impl Fn(usize) -> Option<&'v SqlValue>,
    ) -> Result<()> {
        stmt.sql.push_str(" WHERE ");
        for (n, index) in self.locator_columns().into_iter().enumerate() {
            if n > 0 {
                stmt.sql.push_str(" AND ");
            }
            let column = self.column(index);
            stmt.sql.push_str(&self.dialect.quote(&column.name));
            match value_of(index) {
                Some(value) if !value.is_null() => {
                    stmt.sql.push_str(" = ?");
                    stmt.push_bind(column, value)?;
                }
                _ => stmt.sql.push_str(" IS NULL"),
            }
        }
        Ok(())
    }

    fn require_original(&self, snapshot: &RowSnapshot, operation: &'static str) -> Result<()> {
        if !snapshot.has_original() {
            return Err(Error::position(operation, "row has not been fetched"));
        }
        Ok(())
    }

    /// `UPDATE <table> SET <dirty columns> WHERE <original key>`.
    pub fn build_update(&self, snapshot: &RowSnapshot) -> Result<Statement> {
        self.require_original(snapshot, "update_row")?;

        let mut stmt = Statement::new(StatementKind::Update, &self.table.name);
        stmt.sql = format!("UPDATE {} SET ", self.quoted_table());

        let mut dirty = snapshot.dirty().peekable();
        if dirty.peek().is_none() {
            return Err(Error::NoChange {
                table: self.table.name.clone(),
            });
        }
        for (n, (index, value)) in dirty.enumerate() {
            if n > 0 {
                stmt.sql.push_str(", ");
            }
            let column = self.column(index);
            stmt.sql.push_str(&self.dialect.quote(&column.name));
            stmt.sql.push_str(" = ?");
            stmt.push_bind(column, value)?;
        }

        self.push_where(&mut stmt, |i| snapshot.original(i))?;
        Ok(stmt)
    }

    /// `INSERT INTO <table> (<set columns>) VALUES (?, ...)`.
    ///
    /// Unset columns are left to the server default. With nothing set at all
    /// the statement is `INSERT INTO <table> DEFAULT VALUES`.
    pub fn build_insert(&self, snapshot: &RowSnapshot) -> Result<Statement> {
        for (index, column) in self.table.columns.iter().enumerate() {
            if snapshot.staged(index).is_none() && !column.nullable && !column.has_default {
                return Err(Error::MissingRequiredColumn {
                    table: self.table.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        let mut stmt = Statement::new(StatementKind::Insert, &self.table.name);
        let mut names = Vec::new();
        for (index, value) in snapshot.dirty() {
            let column = self.column(index);
            names.push(self.dialect.quote(&column.name));
            stmt.push_bind(column, value)?;
        }

        stmt.sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.quoted_table())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.quoted_table(),
                names.join(", "),
                vec!["?"; names.len()].join(", ")
            )
        };
        Ok(stmt)
    }

    /// `DELETE FROM <table> WHERE <original key>`.
    pub fn build_delete(&self, snapshot: &RowSnapshot) -> Result<Statement> {
        self.require_original(snapshot, "delete_row")?;

        let mut stmt = Statement::new(StatementKind::Delete, &self.table.name);
        stmt.sql = format!("DELETE FROM {}", self.quoted_table());
        self.push_where(&mut stmt, |i| snapshot.original(i))?;
        Ok(stmt)
    }

    /// `SELECT <columns> FROM <table> WHERE <key>` for re-reading a row whose
    /// current values are `values`.
    pub fn build_refresh(&self, values: &[SqlValue]) -> Result<Statement> {
        let mut stmt = Statement::new(StatementKind::Refresh, &self.table.name);
        let names: Vec<String> = self
            .table
            .columns
            .iter()
            .map(|c| self.dialect.quote(&c.name))
            .collect();
        stmt.sql = format!("SELECT {} FROM {}", names.join(", "), self.quoted_table());
        self.push_where(&mut stmt, |i| values.get(i))?;
        Ok(stmt)
    }
}
