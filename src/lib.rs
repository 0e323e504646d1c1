//! Updatable scrollable cursors and exact fixed-point marshalling.
//!
//! This crate sits between an application and a statement execution
//! primitive ([`Executor`]). It turns a plain query result into a cursor that
//! can be scrolled and mutated in place: positioned UPDATE, INSERT and DELETE
//! statements are synthesized for the caller, with identifiers written the
//! way the session's SQL dialect expects. Dialect 1 has no quoted
//! identifiers; dialect 3 quotes every identifier.
//!
//! NUMERIC and DECIMAL values travel as scaled integers sized by the column's
//! precision, and are rounded half-up to the declared scale when bound, so a
//! value always reads back exactly as stored.
//!
//! # Example
//!
//! ```ignore
//! use fb_updatable_rs::{Result, Session, SessionParams};
//!
//! async fn rename(executor: impl fb_updatable_rs::Executor) -> Result<()> {
//!     let params = SessionParams::parse("sql_dialect=1")?;
//!     let mut session = Session::new(executor, params).await?;
//!
//!     let mut cursor = session
//!         .open_cursor("SELECT id, str FROM test_table WHERE id = 1", &[])
//!         .await?;
//!     if cursor.next().await? {
//!         // UPDATE TEST_TABLE SET STR = ? WHERE ID = ?
//!         cursor.update_value_by_name("STR", "newString1")?;
//!         cursor.update_row().await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod params;
pub mod session;
pub mod types;
pub mod updater;

// Re-export main types
pub use codec::{ScaledDecimal, ScaledInteger, WireWidth};
pub use cursor::{Cursor, CursorState, CursorStreamExt, ScrollableCursor};
pub use dialect::Dialect;
pub use error::{Error, Result};
pub use params::SessionParams;
pub use session::{ExecuteOutcome, Executor, QueryResult, RawResultSet, Session};
pub use types::{
    ColumnInfo, ColumnMetadata, Row, RowImage, RowSnapshot, SqlType, SqlValue, TableMetadata,
    WireValue,
};
pub use updater::{RowUpdater, Statement, StatementKind};
