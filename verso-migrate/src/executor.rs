//! The transactional executor seam.
//!
//! The engine never talks to a driver directly. Backends implement
//! [`Connection`] and [`Transaction`]; migration bodies and the history
//! store only see [`Executor`].

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{MigrateResult, MigrationError};

/// A parameter or column value exchanged with a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Interpret the value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a timestamp.
    ///
    /// Text is accepted in RFC 3339 or in the `YYYY-MM-DD HH:MM:SS[.f]` form
    /// that `CURRENT_TIMESTAMP` produces on SQLite.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// A result row returned by [`Executor::query`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Create a row from column names and values.
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at a column index.
    pub fn value(&self, idx: usize) -> MigrateResult<&SqlValue> {
        self.values
            .get(idx)
            .ok_or_else(|| MigrationError::database(format!("column index {} out of range", idx)))
    }

    /// Raw value by column name.
    pub fn value_by_name(&self, column: &str) -> MigrateResult<&SqlValue> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| MigrationError::database(format!("no column named '{}'", column)))?;
        self.value(idx)
    }

    /// Text value at a column index.
    pub fn get_str(&self, idx: usize) -> MigrateResult<&str> {
        let value = self.value(idx)?;
        value.as_str().ok_or_else(|| {
            MigrationError::database(format!("column {} is not text: {:?}", idx, value))
        })
    }

    /// Timestamp value at a column index.
    pub fn get_timestamp(&self, idx: usize) -> MigrateResult<DateTime<Utc>> {
        let value = self.value(idx)?;
        value.as_timestamp().ok_or_else(|| {
            MigrationError::database(format!("column {} is not a timestamp: {:?}", idx, value))
        })
    }
}

/// SQL dialect of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Positional placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${}", n),
            Self::Sqlite => format!("?{}", n),
        }
    }

    /// Quote an identifier.
    pub fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the history table.
    pub fn create_history_table(&self, table: &str) -> String {
        let (text, timestamp) = match self {
            Self::Postgres => ("VARCHAR(255)", "TIMESTAMP"),
            Self::Sqlite => ("TEXT", "TEXT"),
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             version {text} PRIMARY KEY,\n    \
             name {text} NOT NULL,\n    \
             executed_at {timestamp} NOT NULL DEFAULT CURRENT_TIMESTAMP\n)",
            self.quote(table),
        )
    }
}

/// Statement execution against a connection or an open transaction.
#[async_trait::async_trait]
pub trait Executor: Send {
    /// Execute a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64>;

    /// Run a query and return all rows.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>>;

    /// Run a query and return the first row, if any.
    async fn query_opt(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Option<Row>> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    /// Execute one or more statements without parameters.
    async fn batch_execute(&mut self, sql: &str) -> MigrateResult<()>;
}

/// An open transaction.
///
/// Dropping a transaction without calling [`commit`](Transaction::commit)
/// or [`rollback`](Transaction::rollback) must discard its changes.
#[async_trait::async_trait]
pub trait Transaction: Executor {
    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    /// Roll back the transaction.
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// An already-open database handle supplied by a backend.
#[async_trait::async_trait]
pub trait Connection: Executor {
    /// SQL dialect spoken by this connection.
    fn dialect(&self) -> Dialect;

    /// Short backend name used in diagnostics.
    fn backend_name(&self) -> &'static str;

    /// Begin a transaction.
    async fn begin(&mut self) -> MigrateResult<Box<dyn Transaction + '_>>;

    /// Check that the connection is usable.
    async fn ping(&mut self) -> MigrateResult<()> {
        self.query("SELECT 1", &[]).await.map(|_| ())
    }
}
