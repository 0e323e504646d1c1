//! Cursors over query results.
//!
//! The `Cursor` trait defines the common forward iteration interface.
//! `ScrollableCursor` implements it over a cached result set and adds
//! free positioning plus positioned UPDATE/INSERT/DELETE of the current row.
//!
//! A scrollable cursor is in one of three states:
//!
//! * `Browsing`: positioned before the first row, on a row, or after the
//!   last row. The current row can be updated or deleted.
//! * `OnInsertRow`: values are staged on a separate insert row, entered with
//!   [`ScrollableCursor::move_to_insert_row`]. The position held before is
//!   kept and restored when the insert row is left.
//! * `Closed`: terminal.
//!
//! The cursor is scroll-insensitive: it sees the rows of the original query
//! plus its own changes, not changes made by others.

use std::future::Future;
use std::sync::Arc;

use futures::Stream;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::session::{Executor, QueryResult, Session};
use crate::types::{ColumnInfo, ColumnMetadata, Row, RowImage, SqlValue, TableMetadata};
use crate::updater::RowUpdater;

static NULL: SqlValue = SqlValue::Null;

fn updatable(table: &std::result::Result<TableMetadata, String>) -> Result<&TableMetadata> {
    table.as_ref().map_err(|reason| Error::NotUpdatable {
        reason: reason.clone(),
    })
}

/// Re-read a row that was just written.
///
/// The write has already happened, so this never fails: when the row cannot
/// be re-read the values that were sent stand in for it.
async fn reread_written<E: Executor>(
    session: &mut Session<E>,
    updater: &RowUpdater<'_>,
    columns: &Arc<ColumnInfo>,
    written: Vec<SqlValue>,
    operation: &'static str,
) -> Row {
    let refreshed = match updater.build_refresh(&written) {
        Ok(stmt) => session.fetch_one(&stmt, columns).await,
        Err(e) => Err(e),
    };
    match refreshed {
        Ok(Some(row)) => row,
        Ok(None) => {
            tracing::debug!(operation, "written row not visible to refresh");
            Row::new(written, Arc::clone(columns))
        }
        Err(e) => {
            tracing::warn!(
                operation,
                error = %e,
                "refresh after write failed, keeping written values"
            );
            Row::new(written, Arc::clone(columns))
        }
    }
}

/// Base trait for all cursor types.
///
/// Each cursor implementation specifies its Item type and implements
/// the async methods for fetching items. Cursors hold a mutable reference
/// to their session, ensuring only one active cursor per session at a time.
///
/// # Example
///
/// ```ignore
/// async fn count_rows<C: Cursor<Item = Row>>(cursor: &mut C) -> Result<u64> {
///     let mut count = 0;
///     while Cursor::next(cursor).await?.is_some() {
///         count += 1;
///     }
///     Ok(count)
/// }
/// ```
pub trait Cursor {
    /// The type of item this cursor yields.
    type Item;

    /// Column metadata for this cursor.
    fn columns(&self) -> &[ColumnMetadata];

    /// Number of rows held by the cursor.
    fn rowcount(&self) -> u64;

    fn is_closed(&self) -> bool;

    /// Check if more items are available after the current position.
    fn has_more(&self) -> bool;

    /// Close the cursor and release its rows.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Advance and return the next item.
    ///
    /// Returns `Ok(None)` when exhausted.
    fn next(&mut self) -> impl Future<Output = Result<Option<Self::Item>>> + Send;

    /// Fetch all remaining items into a vector.
    fn fetch_all(&mut self) -> impl Future<Output = Result<Vec<Self::Item>>> + Send;
}

/// State of a scrollable cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Browsing,
    OnInsertRow,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    On(usize),
    /// The row at this index was deleted; the next row moved into its slot.
    Vacated(usize),
    AfterLast,
}

/// Scrollable, updatable cursor over a single-table query.
///
/// Created by [`Session::open_cursor`]. Navigation methods return `true`
/// when the cursor lands on a row.
///
/// # Example
///
/// ```ignore
/// let mut cursor = session.open_cursor("SELECT id, str FROM test_table", &[]).await?;
///
/// cursor.absolute(1).await?;
/// cursor.update_value_by_name("STR", "newString1")?;
/// cursor.update_row().await?;
///
/// cursor.move_to_insert_row()?;
/// cursor.update_value(0, 2)?;
/// cursor.update_value(1, "newString2")?;
/// cursor.insert_row().await?;
/// ```
pub struct ScrollableCursor<'s, E: Executor> {
    session: &'s mut Session<E>,
    /// Captured at open; never changes.
    dialect: Dialect,
    columns: Arc<ColumnInfo>,
    /// Target table, or the reason the query is not updatable.
    table: std::result::Result<TableMetadata, String>,
    rows: Vec<Row>,
    position: Position,
    state: CursorState,
    /// Staging image of the current row, present while on a row.
    current: Option<RowImage>,
    /// Staging image of the insert row, present while on the insert row.
    insert: Option<RowImage>,
}

impl<'s, E: Executor> ScrollableCursor<'s, E> {
    pub(crate) fn new(session: &'s mut Session<E>, result: QueryResult) -> Self {
        let table =
            TableMetadata::from_columns(Arc::clone(&result.columns)).map_err(|e| match e {
                Error::NotUpdatable { reason } => reason,
                other => other.to_string(),
            });
        if let Err(reason) = &table {
            tracing::debug!(%reason, "cursor opened read-only");
        }
        Self {
            dialect: session.dialect(),
            session,
            columns: result.columns,
            table,
            rows: result.rows,
            position: Position::BeforeFirst,
            state: CursorState::Browsing,
            current: None,
            insert: None,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Target table, when the query is updatable.
    pub fn table(&self) -> Option<&TableMetadata> {
        self.table.as_ref().ok()
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.column_names()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == CursorState::Closed {
            return Err(Error::CursorClosed);
        }
        Ok(())
    }

    /// Index of the current row, requiring Browsing state.
    fn current_index(&self, operation: &'static str) -> Result<usize> {
        self.ensure_open()?;
        if self.state == CursorState::OnInsertRow {
            return Err(Error::position(operation, "cursor is on the insert row"));
        }
        match self.position {
            Position::On(index) => Ok(index),
            Position::Vacated(_) => Err(Error::position(operation, "current row was deleted")),
            Position::BeforeFirst => {
                Err(Error::position(operation, "cursor is before the first row"))
            }
            Position::AfterLast => Err(Error::position(operation, "cursor is after the last row")),
        }
    }

    /// Move to `position`, leaving the insert row and discarding staged
    /// changes of the previous current row.
    fn reposition(&mut self, position: Position) -> bool {
        if self.state == CursorState::OnInsertRow {
            self.state = CursorState::Browsing;
            self.insert = None;
        }
        if let Some(image) = &self.current {
            if image.has_changes() {
                tracing::debug!("discarding staged changes on reposition");
            }
        }
        self.position = position;
        self.current = match position {
            Position::On(index) => self.rows.get(index).map(RowImage::for_row),
            _ => None,
        };
        self.current.is_some()
    }

    /// Move to a 1-based row number; 0 and below is before the first row,
    /// past the end is after the last row.
    fn move_to(&mut self, row_number: i64) -> bool {
        let len = self.rows.len() as i64;
        let position = if row_number <= 0 {
            Position::BeforeFirst
        } else if row_number > len {
            Position::AfterLast
        } else {
            Position::On((row_number - 1) as usize)
        };
        self.reposition(position)
    }

    /// Advance to the next row.
    ///
    /// After a delete, this lands on the row that followed the deleted one.
    pub async fn next(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let len = self.rows.len();
        let position = match self.position {
            Position::BeforeFirst if len > 0 => Position::On(0),
            Position::On(i) if i + 1 < len => Position::On(i + 1),
            Position::Vacated(i) if i < len => Position::On(i),
            _ => Position::AfterLast,
        };
        Ok(self.reposition(position))
    }

    /// Move to the previous row.
    ///
    /// After a delete, this lands on the row that preceded the deleted one.
    pub async fn previous(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let len = self.rows.len();
        let position = match self.position {
            Position::On(i) | Position::Vacated(i) if i > 0 => Position::On(i - 1),
            Position::AfterLast if len > 0 => Position::On(len - 1),
            _ => Position::BeforeFirst,
        };
        Ok(self.reposition(position))
    }

    pub async fn first(&mut self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.move_to(1))
    }

    pub async fn last(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let len = self.rows.len() as i64;
        Ok(self.move_to(len))
    }

    /// Move to an absolute 1-based row. Negative values count back from the
    /// last row: `-1` is the last row.
    pub async fn absolute(&mut self, row: i64) -> Result<bool> {
        self.ensure_open()?;
        let len = self.rows.len() as i64;
        let target = if row < 0 { len + row + 1 } else { row };
        Ok(self.move_to(target))
    }

    /// Move `offset` rows forward (or backward when negative).
    pub async fn relative(&mut self, offset: i64) -> Result<bool> {
        self.ensure_open()?;
        let base = match self.position {
            Position::BeforeFirst => 0,
            Position::On(i) => i as i64 + 1,
            Position::Vacated(i) => i as i64,
            Position::AfterLast => self.rows.len() as i64 + 1,
        };
        Ok(self.move_to(base.saturating_add(offset)))
    }

    pub async fn before_first(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.reposition(Position::BeforeFirst);
        Ok(())
    }

    pub async fn after_last(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.reposition(Position::AfterLast);
        Ok(())
    }

    /// 1-based number of the current row.
    pub fn row_number(&self) -> Option<usize> {
        match (self.state, self.position) {
            (CursorState::Browsing, Position::On(i)) => Some(i + 1),
            _ => None,
        }
    }

    /// Whether the cursor is before the first row of a non-empty result.
    pub fn is_before_first(&self) -> bool {
        self.state != CursorState::Closed
            && self.position == Position::BeforeFirst
            && !self.rows.is_empty()
    }

    /// Whether the cursor is after the last row of a non-empty result.
    pub fn is_after_last(&self) -> bool {
        self.state != CursorState::Closed
            && self.position == Position::AfterLast
            && !self.rows.is_empty()
    }

    /// The current row as fetched (or last refreshed), without staged
    /// changes.
    pub fn current_row(&self) -> Option<&Row> {
        match (self.state, self.position) {
            (CursorState::Browsing, Position::On(i)) => self.rows.get(i),
            _ => None,
        }
    }

    /// Value of a column on the current row or the insert row.
    ///
    /// Staged values are visible before they are written. Unset columns of
    /// the insert row read as NULL.
    pub fn get(&self, index: usize) -> Result<&SqlValue> {
        self.ensure_open()?;
        if index >= self.columns.len() {
            return Err(Error::ColumnIndexOutOfBounds {
                index,
                count: self.columns.len(),
            });
        }
        let image = match self.state {
            CursorState::OnInsertRow => self.insert.as_ref(),
            _ => {
                self.current_index("get")?;
                self.current.as_ref()
            }
        };
        Ok(image.and_then(|i| i.value(index)).unwrap_or(&NULL))
    }

    /// Get value by column name.
    pub fn get_by_name(&self, name: &str) -> Result<&SqlValue> {
        self.get(self.column_index(name)?)
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .find_by_name(name)
            .ok_or_else(|| Error::ColumnNotFound {
                name: name.to_string(),
            })
    }

    fn updatable(&self) -> Result<&TableMetadata> {
        updatable(&self.table)
    }

    /// The image setters write to: the insert row or the current row.
    fn target_image(&mut self, operation: &'static str) -> Result<&mut RowImage> {
        self.ensure_open()?;
        self.updatable()?;
        if self.state == CursorState::OnInsertRow {
            return self
                .insert
                .as_mut()
                .ok_or_else(|| Error::position(operation, "insert row is missing"));
        }
        self.current_index(operation)?;
        self.current
            .as_mut()
            .ok_or_else(|| Error::position(operation, "no current row"))
    }

    /// Stage a column value on the current row or the insert row.
    pub fn update_value(&mut self, index: usize, value: impl Into<SqlValue>) -> Result<()> {
        self.target_image("update_value")?
            .set_value(index, value.into())
    }

    pub fn update_value_by_name(&mut self, name: &str, value: impl Into<SqlValue>) -> Result<()> {
        let index = self.column_index(name)?;
        self.update_value(index, value)
    }

    /// Stage NULL for a column.
    pub fn update_null(&mut self, index: usize) -> Result<()> {
        self.update_value(index, SqlValue::Null)
    }

    /// Drop the staged changes of the current row.
    pub fn cancel_row_updates(&mut self) -> Result<()> {
        self.current_index("cancel_row_updates")?;
        if let Some(image) = self.current.as_mut() {
            image.reset();
        }
        Ok(())
    }

    /// Enter insert mode with an empty insert row.
    pub fn move_to_insert_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.updatable()?;
        self.insert = Some(RowImage::for_insert(Arc::clone(&self.columns)));
        self.state = CursorState::OnInsertRow;
        Ok(())
    }

    /// Leave insert mode, returning to the row that was current before.
    pub fn move_to_current_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state == CursorState::OnInsertRow {
            self.state = CursorState::Browsing;
            self.insert = None;
        }
        Ok(())
    }

    /// Write the staged changes of the current row.
    ///
    /// The row is located by its original key values. On success the cached
    /// row is re-read from the server, so server-computed values become
    /// visible. Once the UPDATE succeeded this returns `Ok` even if the
    /// re-read fails; the cached row then holds the written values.
    pub async fn update_row(&mut self) -> Result<()> {
        let index = self.current_index("update_row")?;
        let table = updatable(&self.table)?;
        let image = self
            .current
            .as_mut()
            .ok_or_else(|| Error::position("update_row", "no current row"))?;

        let snapshot = image.snapshot();
        let updater = RowUpdater::new(table, self.dialect);
        let stmt = updater.build_update(&snapshot)?;

        let affected = self.session.run(&stmt).await?.rows_affected();
        if affected == 0 {
            return Err(Error::RowNotLocated {
                operation: "update_row",
                table: table.name.clone(),
            });
        }
        if affected > 1 {
            tracing::warn!(table = %table.name, affected, "update matched more than one row");
        }
        image.clear_dirty();

        let row = reread_written(
            &mut *self.session,
            &updater,
            &self.columns,
            snapshot.merged(),
            "update_row",
        )
        .await;
        self.current = Some(RowImage::for_row(&row));
        self.rows[index] = row;
        Ok(())
    }

    /// Insert the staged insert row.
    ///
    /// On success the cursor returns to the row that was current before
    /// insert mode, and the new row is appended to the cached rows. If the
    /// INSERT itself fails the cursor stays on the insert row with its values
    /// intact; a failed re-read after a successful INSERT is not an error.
    pub async fn insert_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state != CursorState::OnInsertRow {
            return Err(Error::position("insert_row", "cursor is not on the insert row"));
        }
        let table = updatable(&self.table)?;
        let image = self
            .insert
            .as_ref()
            .ok_or_else(|| Error::position("insert_row", "insert row is missing"))?;

        let snapshot = image.snapshot();
        let updater = RowUpdater::new(table, self.dialect);
        let stmt = updater.build_insert(&snapshot)?;
        self.session.run(&stmt).await?;

        // The row can only be re-read if every locating column was supplied.
        let locatable = if table.uses_full_row_match() {
            snapshot.dirty().count() == table.columns.len()
        } else {
            table
                .key_columns
                .iter()
                .all(|&k| snapshot.staged(k).is_some())
        };
        let merged = snapshot.merged();
        let row = if locatable {
            reread_written(&mut *self.session, &updater, &self.columns, merged, "insert_row").await
        } else {
            Row::new(merged, Arc::clone(&self.columns))
        };

        self.rows.push(row);
        self.insert = None;
        self.state = CursorState::Browsing;
        Ok(())
    }

    /// Delete the current row.
    ///
    /// Afterwards there is no current row until the cursor is moved.
    pub async fn delete_row(&mut self) -> Result<()> {
        let index = self.current_index("delete_row")?;
        let table = updatable(&self.table)?;
        let image = self
            .current
            .as_ref()
            .ok_or_else(|| Error::position("delete_row", "no current row"))?;

        let stmt = RowUpdater::new(table, self.dialect).build_delete(&image.snapshot())?;
        let affected = self.session.run(&stmt).await?.rows_affected();
        if affected == 0 {
            return Err(Error::RowNotLocated {
                operation: "delete_row",
                table: table.name.clone(),
            });
        }
        if affected > 1 {
            tracing::warn!(table = %table.name, affected, "delete matched more than one row");
        }

        self.rows.remove(index);
        self.position = Position::Vacated(index);
        self.current = None;
        Ok(())
    }

    /// Re-read the current row from the server, dropping staged changes.
    pub async fn refresh_row(&mut self) -> Result<()> {
        let index = self.current_index("refresh_row")?;
        let table = updatable(&self.table)?;

        let stmt = RowUpdater::new(table, self.dialect).build_refresh(self.rows[index].values())?;
        match self.session.fetch_one(&stmt, &self.columns).await? {
            Some(row) => {
                self.current = Some(RowImage::for_row(&row));
                self.rows[index] = row;
                Ok(())
            }
            None => Err(Error::RowNotLocated {
                operation: "refresh_row",
                table: table.name.clone(),
            }),
        }
    }

    /// Close the cursor. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state != CursorState::Closed {
            self.state = CursorState::Closed;
            self.rows.clear();
            self.current = None;
            self.insert = None;
            self.position = Position::AfterLast;
        }
        Ok(())
    }
}

impl<'s, E: Executor> Cursor for ScrollableCursor<'s, E> {
    type Item = Row;

    fn columns(&self) -> &[ColumnMetadata] {
        &self.columns.columns
    }

    fn rowcount(&self) -> u64 {
        self.rows.len() as u64
    }

    fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    fn has_more(&self) -> bool {
        if self.state == CursorState::Closed {
            return false;
        }
        let len = self.rows.len();
        match self.position {
            Position::BeforeFirst => len > 0,
            Position::On(i) => i + 1 < len,
            Position::Vacated(i) => i < len,
            Position::AfterLast => false,
        }
    }

    async fn close(&mut self) -> Result<()> {
        ScrollableCursor::close(self).await
    }

    async fn next(&mut self) -> Result<Option<Self::Item>> {
        if ScrollableCursor::next(self).await? {
            Ok(self.current_row().cloned())
        } else {
            Ok(None)
        }
    }

    async fn fetch_all(&mut self) -> Result<Vec<Self::Item>> {
        let mut all_rows = Vec::new();
        while let Some(row) = Cursor::next(self).await? {
            all_rows.push(row);
        }
        Ok(all_rows)
    }
}

/// Extension trait for converting Cursor to Stream.
///
/// # Example
///
/// ```ignore
/// use futures::stream::TryStreamExt;
///
/// let cursor = session.open_cursor("SELECT id, str FROM test_table", &[]).await?;
/// let names: Vec<String> = cursor
///     .into_stream()
///     .map_ok(|row| row.get(1).unwrap().to_string())
///     .try_collect()
///     .await?;
/// ```
pub trait CursorStreamExt: Cursor + Sized {
    /// Convert this cursor into a Stream yielding `Result<Item>`.
    ///
    /// The stream takes ownership of the cursor. Each call to `poll_next`
    /// will call `cursor.next()` internally.
    fn into_stream(self) -> impl Stream<Item = Result<Self::Item>>;
}

impl<C: Cursor + Unpin> CursorStreamExt for C {
    fn into_stream(self) -> impl Stream<Item = Result<Self::Item>> {
        use futures::stream;

        stream::unfold(Some(self), |opt_cursor| async move {
            let mut cursor = opt_cursor?;
            match cursor.next().await {
                Ok(Some(item)) => Some((Ok(item), Some(cursor))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
