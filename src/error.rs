//! Error types for updatable cursors and fixed-point marshalling.

use std::panic::Location;
use thiserror::Error;

/// Result type alias for cursor and codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for cursor, synthesizer and codec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Mutation attempted without a valid current row or insert row.
    #[error("Invalid cursor position for {operation}: {reason}")]
    InvalidCursorPosition {
        operation: &'static str,
        reason: String,
    },

    /// Update requested while no column is dirty.
    #[error("No changes to write for table {table}")]
    NoChange { table: String },

    /// Insert leaves a NOT NULL column without default unset.
    #[error("Column {column} of table {table} is NOT NULL and has no default, but was not set")]
    MissingRequiredColumn { table: String, column: String },

    /// Value type is incompatible with the column's declared type.
    #[error("Type mismatch for column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// Fixed-point rescale exceeds the declared precision or wire width.
    #[error("Numeric overflow: {value} does not fit {target}{}", column_suffix(.column))]
    Overflow {
        column: Option<String>,
        value: String,
        target: String,
    },

    /// Error reported by the execution primitive (e.g. constraint violation).
    #[error("Execution failed (SQLCODE {code}): {message}")]
    Execution { code: i32, message: String },

    /// Positioned UPDATE/DELETE did not match any row.
    #[error("{operation} on table {table} did not match any row")]
    RowNotLocated {
        operation: &'static str,
        table: String,
    },

    /// The query cannot be used for positioned mutation.
    #[error("Result set is not updatable: {reason}")]
    NotUpdatable { reason: String },

    /// Cursor was used after close.
    #[error("Cursor is closed")]
    CursorClosed,

    /// Column not found.
    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    /// Column index out of bounds.
    #[error("Column index {index} out of bounds (columns: {count})")]
    ColumnIndexOutOfBounds { index: usize, count: usize },

    /// Text could not be parsed as an exact decimal.
    #[error("Invalid decimal literal: {input:?}")]
    InvalidDecimal { input: String },

    /// Dialect number not known to the dialect policy table.
    #[error("Unsupported SQL dialect: {dialect}")]
    UnsupportedDialect { dialect: u16 },

    /// Invalid session parameter string.
    #[error("Invalid session parameters: {message}")]
    InvalidParams { message: String },

    /// Buffer too small.
    #[error("Buffer too small: need {needed} bytes, have {available} filed at {location}")]
    BufferTooSmall {
        needed: usize,
        available: usize,
        location: &'static Location<'static>,
    },
}

fn column_suffix(column: &Option<String>) -> String {
    match column {
        Some(name) => format!(" (column {})", name),
        None => String::new(),
    }
}

impl Error {
    /// Create an execution error, as returned by an [`Executor`](crate::Executor).
    pub fn execution(code: i32, message: impl Into<String>) -> Self {
        Self::Execution {
            code,
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(
        column: impl Into<String>,
        expected: impl ToString,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected: expected.to_string(),
            actual: actual.into(),
        }
    }

    /// Create an invalid cursor position error.
    pub fn position(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidCursorPosition {
            operation,
            reason: reason.into(),
        }
    }

    /// Attach a column name to an overflow error that does not carry one yet.
    pub fn with_column(self, name: &str) -> Self {
        match self {
            Self::Overflow {
                column: None,
                value,
                target,
            } => Self::Overflow {
                column: Some(name.to_string()),
                value,
                target,
            },
            other => other,
        }
    }
}
