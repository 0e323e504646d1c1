//! In-memory server used by the integration tests.
//!
//! Statements are parsed with `sqlparser` and must be the shapes a cursor
//! issues: SELECT/UPDATE/INSERT/DELETE against one table with `AND`-joined
//! equality and `IS NULL` predicates. Identifiers follow the session dialect:
//! in dialect 1 a double-quoted token is a string literal, in dialect 3 it is
//! a case-sensitive identifier. Unquoted identifiers fold to upper case.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt::Display;

use fb_updatable_rs::codec;
use fb_updatable_rs::{
    ColumnMetadata, Dialect, Error, ExecuteOutcome, Executor, RawResultSet, Result, SqlType,
    SqlValue, WireValue,
};
use sqlparser::ast::{
    BinaryOperator, Expr, FromTable, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
    Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub default: Option<SqlValue>,
    pub key: bool,
}

impl ColumnDef {
    pub fn new(name: &str, sql_type: SqlType) -> Self {
        Self {
            name: name.to_string(),
            sql_type,
            not_null: false,
            default: None,
            key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.key = true;
        self.not_null = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<SqlValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<SqlValue>>,
}

#[derive(Debug)]
pub struct MemoryServer {
    dialect: Dialect,
    tables: HashMap<String, Table>,
    committed: HashMap<String, Table>,
    autocommit: bool,
    /// Every statement received, with its binds.
    pub statements: Vec<(String, Vec<WireValue>)>,
    /// Fail the first SELECT that follows a write with this error.
    pub fail_refresh: Option<(i32, String)>,
    wrote: bool,
}

impl MemoryServer {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: HashMap::new(),
            committed: HashMap::new(),
            autocommit: true,
            statements: Vec::new(),
            fail_refresh: None,
            wrote: false,
        }
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnDef>) -> Self {
        let table = Table {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        };
        self.tables.insert(name.to_string(), table.clone());
        self.committed.insert(name.to_string(), table);
        self
    }

    pub fn with_row(mut self, table: &str, values: Vec<SqlValue>) -> Self {
        if let Some(t) = self.tables.get_mut(table) {
            t.rows.push(values);
        }
        self.committed = self.tables.clone();
        self
    }

    pub fn failing_refresh(mut self, code: i32, message: &str) -> Self {
        self.fail_refresh = Some((code, message.to_string()));
        self
    }

    pub fn table(&self, name: &str) -> &Table {
        &self.tables[name]
    }

    fn run(&mut self, sql: &str, binds: &[WireValue]) -> Result<ExecuteOutcome> {
        let statement = parse(sql, self.dialect)?;
        let stmt = Translator::new(self.dialect, binds).statement(&statement)?;

        match stmt {
            Parsed::Select {
                table,
                columns,
                filter,
            } => {
                if self.wrote {
                    if let Some((code, message)) = self.fail_refresh.take() {
                        return Err(Error::execution(code, message));
                    }
                }
                let t = self.lookup(&table)?;
                let indexes = match columns {
                    None => (0..t.columns.len()).collect(),
                    Some(names) => names
                        .iter()
                        .map(|n| column_index(t, n))
                        .collect::<Result<Vec<_>>>()?,
                };
                let filter = resolve_filter(t, filter)?;
                let metadata = indexes
                    .iter()
                    .map(|&i| describe(t, i))
                    .collect::<Vec<_>>();
                let mut rows = Vec::new();
                for row in t.rows.iter().filter(|r| row_matches(r, &filter)) {
                    rows.push(
                        indexes
                            .iter()
                            .map(|&i| to_wire(&t.columns[i].sql_type, &row[i]))
                            .collect::<Result<Vec<_>>>()?,
                    );
                }
                Ok(ExecuteOutcome::Rows(RawResultSet {
                    columns: metadata,
                    rows,
                }))
            }
            Parsed::Update {
                table,
                assignments,
                filter,
            } => {
                let name = self.lookup(&table)?.name.clone();
                let t = self.tables.get_mut(&name).ok_or_else(|| unknown_table(&table))?;
                let filter = resolve_filter(t, filter)?;
                let mut assigns = Vec::new();
                for (column, value) in assignments {
                    let index = column_index(t, &column)?;
                    assigns.push((index, store(&t.columns[index], value)?));
                }

                let mut updated = t.rows.clone();
                let mut count = 0;
                for row in updated.iter_mut().filter(|r| row_matches(r, &filter)) {
                    for (index, value) in &assigns {
                        row[*index] = value.clone();
                    }
                    count += 1;
                }
                check_keys(t, &updated)?;
                t.rows = updated;
                self.after_write();
                Ok(ExecuteOutcome::RowsAffected(count))
            }
            Parsed::Insert {
                table,
                columns,
                values,
            } => {
                let name = self.lookup(&table)?.name.clone();
                let t = self.tables.get_mut(&name).ok_or_else(|| unknown_table(&table))?;
                let mut row: Vec<Option<SqlValue>> = vec![None; t.columns.len()];
                for (column, value) in columns.iter().zip(values) {
                    let index = column_index(t, column)?;
                    row[index] = Some(store(&t.columns[index], value)?);
                }
                let row = row
                    .into_iter()
                    .zip(&t.columns)
                    .map(|(v, c)| match v {
                        Some(v) => Ok(v),
                        None => store(c, c.default.clone().unwrap_or(SqlValue::Null)),
                    })
                    .collect::<Result<Vec<_>>>()?;

                let mut updated = t.rows.clone();
                updated.push(row);
                check_keys(t, &updated)?;
                t.rows = updated;
                self.after_write();
                Ok(ExecuteOutcome::RowsAffected(1))
            }
            Parsed::Delete { table, filter } => {
                let name = self.lookup(&table)?.name.clone();
                let t = self.tables.get_mut(&name).ok_or_else(|| unknown_table(&table))?;
                let filter = resolve_filter(t, filter)?;
                let before = t.rows.len();
                t.rows.retain(|r| !row_matches(r, &filter));
                let count = (before - t.rows.len()) as u64;
                self.after_write();
                Ok(ExecuteOutcome::RowsAffected(count))
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<&Table> {
        self.tables
            .values()
            .find(|t| t.name == name)
            .ok_or_else(|| unknown_table(name))
    }

    fn after_write(&mut self) {
        self.wrote = true;
        if self.autocommit {
            self.committed = self.tables.clone();
        }
    }
}

impl Executor for MemoryServer {
    async fn execute(&mut self, sql: &str, binds: &[WireValue]) -> Result<ExecuteOutcome> {
        self.statements.push((sql.to_string(), binds.to_vec()));
        self.run(sql, binds)
    }

    async fn set_autocommit(&mut self, autocommit: bool) -> Result<()> {
        self.autocommit = autocommit;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.committed = self.tables.clone();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.tables = self.committed.clone();
        Ok(())
    }
}

fn unknown_table(name: &str) -> Error {
    Error::execution(-204, format!("Table unknown: {}", name))
}

fn column_index(table: &Table, name: &str) -> Result<usize> {
    table
        .columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| Error::execution(-206, format!("Column unknown: {}", name)))
}

fn describe(table: &Table, index: usize) -> ColumnMetadata {
    let def = &table.columns[index];
    let mut meta =
        ColumnMetadata::new(def.name.clone(), def.sql_type).with_relation(table.name.clone());
    if def.not_null {
        meta = meta.not_null();
    }
    if def.default.is_some() {
        meta = meta.with_default();
    }
    if def.key {
        meta = meta.primary_key();
    }
    meta
}

fn from_wire(value: &WireValue) -> SqlValue {
    match value {
        WireValue::Null => SqlValue::Null,
        WireValue::Value(v) => v.clone(),
        WireValue::Scaled(raw) => SqlValue::Decimal(codec::decode(raw)),
    }
}

fn to_wire(sql_type: &SqlType, value: &SqlValue) -> Result<WireValue> {
    match value {
        SqlValue::Null => Ok(WireValue::Null),
        SqlValue::Decimal(d) if sql_type.is_fixed_point() => Ok(WireValue::Scaled(codec::encode(
            d,
            sql_type.precision(),
            u32::from(sql_type.scale()),
        )?)),
        other => Ok(WireValue::Value(other.clone())),
    }
}

/// Convert an incoming value to the column's storage form.
fn store(column: &ColumnDef, value: SqlValue) -> Result<SqlValue> {
    if value.is_null() {
        if column.not_null {
            return Err(Error::execution(
                -625,
                format!("validation error for column {}, value \"*** null ***\"", column.name),
            ));
        }
        return Ok(SqlValue::Null);
    }
    let value = column
        .sql_type
        .coerce(&column.name, value)
        .map_err(|e| Error::execution(-802, e.to_string()))?;
    match value {
        SqlValue::Decimal(d) => Ok(SqlValue::Decimal(
            d.rescale(u32::from(column.sql_type.scale())),
        )),
        other => Ok(other),
    }
}

fn check_keys(table: &Table, rows: &[Vec<SqlValue>]) -> Result<()> {
    let keys: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.key)
        .map(|(i, _)| i)
        .collect();
    if keys.is_empty() {
        return Ok(());
    }
    for (n, a) in rows.iter().enumerate() {
        for b in &rows[n + 1..] {
            if keys.iter().all(|&k| a[k].matches(&b[k])) {
                return Err(Error::execution(
                    -803,
                    format!(
                        "violation of PRIMARY or UNIQUE KEY constraint on table \"{}\"",
                        table.name
                    ),
                ));
            }
        }
    }
    Ok(())
}

enum Condition {
    Equals(usize, SqlValue),
    IsNull(usize),
}

fn resolve_filter(table: &Table, filter: Filter) -> Result<Vec<Condition>> {
    filter
        .into_iter()
        .map(|(column, value)| {
            let index = column_index(table, &column)?;
            Ok(match value {
                None | Some(SqlValue::Null) => Condition::IsNull(index),
                Some(v) => Condition::Equals(index, store(&table.columns[index], v)?),
            })
        })
        .collect()
}

fn row_matches(row: &[SqlValue], filter: &[Condition]) -> bool {
    filter.iter().all(|c| match c {
        Condition::Equals(i, v) => row[*i].matches(v),
        Condition::IsNull(i) => row[*i].is_null(),
    })
}

/// Dialect 1 has no delimited identifiers, so `"x"` tokenizes as a string.
#[derive(Debug)]
struct LegacySql;

impl sqlparser::dialect::Dialect for LegacySql {
    fn is_identifier_start(&self, ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    fn is_identifier_part(&self, ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
    }

    fn is_delimited_identifier_start(&self, _ch: char) -> bool {
        false
    }
}

fn syntax_error(detail: impl Display) -> Error {
    Error::execution(-104, format!("Dynamic SQL Error: {}", detail))
}

fn parse(sql: &str, dialect: Dialect) -> Result<Statement> {
    let parsed = match dialect {
        Dialect::Legacy => Parser::parse_sql(&LegacySql, sql),
        Dialect::Standard => Parser::parse_sql(&GenericDialect {}, sql),
    };
    let mut statements = parsed.map_err(syntax_error)?;
    if statements.len() != 1 {
        return Err(syntax_error("expected exactly one statement"));
    }
    Ok(statements.remove(0))
}

type Filter = Vec<(String, Option<SqlValue>)>;

enum Parsed {
    Select {
        table: String,
        columns: Option<Vec<String>>,
        filter: Filter,
    },
    Update {
        table: String,
        assignments: Vec<(String, SqlValue)>,
        filter: Filter,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<SqlValue>,
    },
    Delete {
        table: String,
        filter: Filter,
    },
}

/// Walks a parsed statement, resolving names for the session dialect and
/// handing out bind values to `?` placeholders in statement order.
struct Translator {
    dialect: Dialect,
    binds: Vec<SqlValue>,
    next: usize,
}

impl Translator {
    fn new(dialect: Dialect, binds: &[WireValue]) -> Self {
        Self {
            dialect,
            binds: binds.iter().map(from_wire).collect(),
            next: 0,
        }
    }

    /// A name as the server stores it: quoted names keep their case,
    /// unquoted names fold to upper case. Dialect 1 has no quoted names.
    fn name(&self, written: impl Display) -> Result<String> {
        let text = written.to_string();
        if text.starts_with('\'') || (self.dialect == Dialect::Legacy && text.starts_with('"')) {
            return Err(syntax_error(format!("string {} where a name is expected", text)));
        }
        Ok(match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            Some(inner) => inner.replace("\"\"", "\""),
            None => text.to_uppercase(),
        })
    }

    fn take_bind(&mut self) -> Result<SqlValue> {
        let value = self
            .binds
            .get(self.next)
            .cloned()
            .ok_or_else(|| Error::execution(-313, "missing bind value"))?;
        self.next += 1;
        Ok(value)
    }

    fn statement(&mut self, statement: &Statement) -> Result<Parsed> {
        let parsed = match statement {
            Statement::Query(query) => {
                let SetExpr::Select(select) = query.body.as_ref() else {
                    return Err(syntax_error(query));
                };
                let table = self.single_table(&select.from)?;
                let columns = match select.projection.as_slice() {
                    [SelectItem::Wildcard(_)] => None,
                    items => Some(
                        items
                            .iter()
                            .map(|item| match item {
                                SelectItem::UnnamedExpr(expr) => self.column(expr),
                                other => Err(syntax_error(other)),
                            })
                            .collect::<Result<Vec<_>>>()?,
                    ),
                };
                let filter = self.filter(select.selection.as_ref())?;
                Parsed::Select {
                    table,
                    columns,
                    filter,
                }
            }
            Statement::Update(update) => {
                let table = self.single_table(std::slice::from_ref(&update.table))?;
                let mut assignments = Vec::new();
                for assignment in &update.assignments {
                    let column = self.name(&assignment.target)?;
                    assignments.push((column, self.literal(&assignment.value)?));
                }
                let filter = self.filter(update.selection.as_ref())?;
                Parsed::Update {
                    table,
                    assignments,
                    filter,
                }
            }
            Statement::Insert(insert) => {
                let table = self.name(&insert.table)?;
                let columns = insert
                    .columns
                    .iter()
                    .map(|c| self.name(c))
                    .collect::<Result<Vec<_>>>()?;
                // DEFAULT VALUES has no source.
                let values = match &insert.source {
                    None => Vec::new(),
                    Some(source) => match source.body.as_ref() {
                        SetExpr::Values(values) if values.rows.len() == 1 => values.rows[0]
                            .iter()
                            .map(|expr| self.literal(expr))
                            .collect::<Result<Vec<_>>>()?,
                        other => return Err(syntax_error(other)),
                    },
                };
                if columns.len() != values.len() {
                    return Err(Error::execution(
                        -804,
                        "count of column list and value list do not match",
                    ));
                }
                Parsed::Insert {
                    table,
                    columns,
                    values,
                }
            }
            Statement::Delete(delete) => {
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                        tables
                    }
                };
                let table = self.single_table(tables)?;
                let filter = self.filter(delete.selection.as_ref())?;
                Parsed::Delete { table, filter }
            }
            other => return Err(syntax_error(other)),
        };

        if self.next != self.binds.len() {
            return Err(Error::execution(
                -313,
                format!(
                    "count of column list and variable list do not match: \
                     {} placeholders, {} binds",
                    self.next,
                    self.binds.len()
                ),
            ));
        }
        Ok(parsed)
    }

    fn single_table(&self, from: &[TableWithJoins]) -> Result<String> {
        match from {
            [only] if only.joins.is_empty() => match &only.relation {
                TableFactor::Table { name, .. } => self.name(name),
                other => Err(syntax_error(other)),
            },
            _ => Err(syntax_error("expected a single table")),
        }
    }

    fn column(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Identifier(ident) => self.name(ident),
            other => Err(syntax_error(other)),
        }
    }

    fn literal(&mut self, expr: &Expr) -> Result<SqlValue> {
        let Expr::Value(value) = expr else {
            return Err(syntax_error(expr));
        };
        match &value.value {
            Value::Placeholder(_) => self.take_bind(),
            // In dialect 1 a double-quoted token is a string.
            Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
                Ok(SqlValue::Text(s.clone()))
            }
            Value::Number(n, _) if n.contains('.') => n
                .parse()
                .map(SqlValue::Decimal)
                .map_err(|_| syntax_error(expr)),
            Value::Number(n, _) => n
                .parse()
                .map(SqlValue::Integer)
                .map_err(|_| syntax_error(expr)),
            Value::Null => Ok(SqlValue::Null),
            _ => Err(syntax_error(expr)),
        }
    }

    fn filter(&mut self, selection: Option<&Expr>) -> Result<Filter> {
        let mut conditions = Vec::new();
        if let Some(expr) = selection {
            self.conditions(expr, &mut conditions)?;
        }
        Ok(conditions)
    }

    fn conditions(&mut self, expr: &Expr, out: &mut Filter) -> Result<()> {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                self.conditions(left, out)?;
                self.conditions(right, out)
            }
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            } => {
                let column = self.column(left)?;
                out.push((column, Some(self.literal(right)?)));
                Ok(())
            }
            Expr::IsNull(inner) => {
                out.push((self.column(inner)?, None));
                Ok(())
            }
            Expr::Nested(inner) => self.conditions(inner, out),
            other => Err(syntax_error(other)),
        }
    }
}

/// `TEST_TABLE(ID INTEGER NOT NULL PRIMARY KEY, STR VARCHAR(10))` holding
/// the row `(0, 'oldString0')`.
pub fn test_table_server(dialect: Dialect) -> MemoryServer {
    MemoryServer::new(dialect)
        .with_table(
            "TEST_TABLE",
            vec![
                ColumnDef::new("ID", SqlType::Integer).primary_key(),
                ColumnDef::new("STR", SqlType::Varchar { max_len: 10 }),
            ],
        )
        .with_row(
            "TEST_TABLE",
            vec![SqlValue::Integer(0), SqlValue::from("oldString0")],
        )
}

/// `TESTNUMERIC(ID INTEGER NOT NULL PRIMARY KEY, NUMERICVALUE NUMERIC(18,2))`.
pub fn numeric_server(dialect: Dialect) -> MemoryServer {
    MemoryServer::new(dialect).with_table(
        "TESTNUMERIC",
        vec![
            ColumnDef::new("ID", SqlType::Integer).primary_key(),
            ColumnDef::new(
                "NUMERICVALUE",
                SqlType::Numeric {
                    precision: 18,
                    scale: 2,
                },
            ),
        ],
    )
}
