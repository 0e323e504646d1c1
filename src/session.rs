//! Session context and the execution primitive it drives.
//!
//! A [`Session`] owns an [`Executor`], the component that actually talks to
//! the server, together with the session's dialect and commit mode. Queries
//! come back as raw result sets and are decoded into [`Row`]s here; updatable
//! cursors borrow the session for their whole lifetime.

use std::future::Future;
use std::sync::Arc;

use crate::cursor::ScrollableCursor;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::params::SessionParams;
use crate::types::{ColumnInfo, ColumnMetadata, Row, SqlValue, WireValue};
use crate::updater::Statement;

/// Rows as returned by the server, before decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    /// Column descriptions, including owning relation and key flags.
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<WireValue>>,
}

/// Outcome of one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteOutcome {
    /// Number of rows changed by a DML statement.
    RowsAffected(u64),
    /// Result set of a query.
    Rows(RawResultSet),
}

impl ExecuteOutcome {
    /// Rows changed, or rows returned for a query.
    pub fn rows_affected(&self) -> u64 {
        match self {
            ExecuteOutcome::RowsAffected(n) => *n,
            ExecuteOutcome::Rows(set) => set.rows.len() as u64,
        }
    }
}

/// The statement execution primitive a session runs on.
///
/// Implementations execute one parameterized statement at a time; `?`
/// placeholders are bound positionally from `binds`. Server errors should be
/// reported as [`Error::Execution`].
pub trait Executor: Send {
    /// Execute one statement.
    fn execute(
        &mut self,
        sql: &str,
        binds: &[WireValue],
    ) -> impl Future<Output = Result<ExecuteOutcome>> + Send;

    /// Switch the commit mode.
    fn set_autocommit(&mut self, autocommit: bool) -> impl Future<Output = Result<()>> + Send;

    /// Commit the current transaction.
    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Result of a query execution.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Column metadata, shared with every row.
    pub columns: Arc<ColumnInfo>,
    /// Rows returned.
    pub rows: Vec<Row>,
    /// Total row count.
    pub row_count: u64,
}

impl QueryResult {
    fn empty() -> Self {
        Self {
            columns: Arc::new(ColumnInfo::new(Vec::new())),
            rows: Vec::new(),
            row_count: 0,
        }
    }

    /// Decode a raw result set.
    pub fn decode(raw: RawResultSet) -> Result<Self> {
        let columns = Arc::new(ColumnInfo::new(raw.columns));
        let rows = raw
            .rows
            .into_iter()
            .map(|values| decode_row(&columns, values))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns,
            row_count: rows.len() as u64,
            rows,
        })
    }

    /// Get the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.column_names()
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

pub(crate) fn decode_row(columns: &Arc<ColumnInfo>, values: Vec<WireValue>) -> Result<Row> {
    if values.len() != columns.len() {
        return Err(Error::ColumnIndexOutOfBounds {
            index: values.len(),
            count: columns.len(),
        });
    }
    let values = columns
        .iter()
        .zip(values)
        .map(|(column, raw)| column.decode(raw))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(values, Arc::clone(columns)))
}

fn to_wire(binds: &[SqlValue]) -> Vec<WireValue> {
    binds
        .iter()
        .map(|v| match v {
            SqlValue::Null => WireValue::Null,
            other => WireValue::Value(other.clone()),
        })
        .collect()
}

/// A database session.
pub struct Session<E> {
    executor: E,
    dialect: Dialect,
    autocommit: bool,
}

impl<E: Executor> Session<E> {
    /// Open a session over `executor`, applying the commit mode from `params`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let params = SessionParams::parse("sql_dialect=1;autocommit=false")?;
    /// let mut session = Session::new(executor, params).await?;
    ///
    /// let mut cursor = session.open_cursor("SELECT id, str FROM test_table", &[]).await?;
    /// while cursor.next().await? {
    ///     cursor.update_value_by_name("STR", "changed")?;
    ///     cursor.update_row().await?;
    /// }
    /// ```
    pub async fn new(mut executor: E, params: SessionParams) -> Result<Self> {
        executor.set_autocommit(params.autocommit).await?;
        tracing::debug!(
            dialect = params.dialect.number(),
            autocommit = params.autocommit,
            "session opened"
        );
        Ok(Self {
            executor,
            dialect: params.dialect,
            autocommit: params.autocommit,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    /// Set auto-commit mode.
    pub async fn set_autocommit(&mut self, autocommit: bool) -> Result<()> {
        self.executor.set_autocommit(autocommit).await?;
        self.autocommit = autocommit;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        tracing::debug!("commit");
        self.executor.commit().await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        tracing::debug!("rollback");
        self.executor.rollback().await
    }

    /// Get a reference to the executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Get a mutable reference to the executor.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Consume the session and return its executor.
    pub fn into_inner(self) -> E {
        self.executor
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&mut self, sql: &str, binds: &[SqlValue]) -> Result<u64> {
        tracing::debug!(sql, binds = binds.len(), "execute");
        let outcome = self.executor.execute(sql, &to_wire(binds)).await?;
        Ok(outcome.rows_affected())
    }

    /// Execute a query and return all rows.
    ///
    /// A statement that produces no result set yields an empty result.
    pub async fn query(&mut self, sql: &str, binds: &[SqlValue]) -> Result<QueryResult> {
        tracing::debug!(sql, binds = binds.len(), "query");
        match self.executor.execute(sql, &to_wire(binds)).await? {
            ExecuteOutcome::Rows(raw) => QueryResult::decode(raw),
            ExecuteOutcome::RowsAffected(_) => Ok(QueryResult::empty()),
        }
    }

    /// Open a scrollable, updatable cursor over a query.
    ///
    /// The cursor borrows the session mutably, so only one cursor can be
    /// active per session at a time. Queries over more than one table, or
    /// with computed columns, still open but reject mutations with
    /// [`Error::NotUpdatable`].
    pub async fn open_cursor(
        &mut self,
        sql: &str,
        binds: &[SqlValue],
    ) -> Result<ScrollableCursor<'_, E>> {
        let result = self.query(sql, binds).await?;
        Ok(ScrollableCursor::new(self, result))
    }

    /// Run a synthesized statement.
    pub(crate) async fn run(&mut self, stmt: &Statement) -> Result<ExecuteOutcome> {
        tracing::debug!(
            kind = %stmt.kind,
            table = %stmt.table,
            sql = %stmt.display_sql(self.dialect),
            "positioned statement"
        );
        self.executor.execute(&stmt.sql, &stmt.binds).await
    }

    /// Run a refresh SELECT and return its first row, decoded against
    /// `columns`.
    pub(crate) async fn fetch_one(
        &mut self,
        stmt: &Statement,
        columns: &Arc<ColumnInfo>,
    ) -> Result<Option<Row>> {
        match self.run(stmt).await? {
            ExecuteOutcome::Rows(raw) => {
                if raw.rows.len() > 1 {
                    tracing::warn!(
                        table = %stmt.table,
                        matched = raw.rows.len(),
                        "refresh matched more than one row"
                    );
                }
                raw.rows
                    .into_iter()
                    .next()
                    .map(|values| decode_row(columns, values))
                    .transpose()
            }
            ExecuteOutcome::RowsAffected(_) => Ok(None),
        }
    }
}
