//! SQLite connection and transaction.

use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tracing::{debug, info, warn};
use verso_migrate::{Connection, Dialect, Executor, MigrateResult, Row, SqlValue, Transaction};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::SqliteResult;
use crate::types::{from_sqlite_value, to_sqlite_value};

/// A single SQLite connection driven through `tokio-rusqlite`.
///
/// Transactions are opened with `BEGIN IMMEDIATE` so the write lock is taken
/// up front. A transaction dropped without commit or rollback is rolled back
/// before the connection is used again.
pub struct SqliteConnection {
    conn: tokio_rusqlite::Connection,
    config: SqliteConfig,
    abandoned: bool,
}

impl SqliteConnection {
    /// Open a connection and apply the configured pragmas.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => tokio_rusqlite::Connection::open_in_memory().await?,
            DatabasePath::File(path) => tokio_rusqlite::Connection::open(path).await?,
        };

        let init_sql = config.init_sql();
        conn.call(move |conn| {
            conn.execute_batch(&init_sql)?;
            Ok(())
        })
        .await?;

        info!(path = %config.path.display(), "Opened SQLite database");

        Ok(Self {
            conn,
            config,
            abandoned: false,
        })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::memory()).await
    }

    /// Open the database described by a URL.
    pub async fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        Self::open(SqliteConfig::from_url(url)?).await
    }

    /// The configuration this connection was opened with.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// The underlying `tokio-rusqlite` handle.
    pub fn inner(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    async fn recover(&mut self) -> SqliteResult<()> {
        if self.abandoned {
            warn!("Rolling back abandoned transaction");
            run_rollback(&self.conn).await?;
            self.abandoned = false;
        }
        Ok(())
    }
}

fn bind(params: &[SqlValue]) -> Vec<Value> {
    params.iter().map(to_sqlite_value).collect()
}

async fn run_execute(
    conn: &tokio_rusqlite::Connection,
    sql: &str,
    params: &[SqlValue],
) -> SqliteResult<u64> {
    let sql = sql.to_string();
    let params = bind(params);
    debug!(sql = %sql, params = params.len(), "Executing statement");

    let affected = conn
        .call(move |conn| Ok(conn.execute(&sql, params_from_iter(params.iter()))?))
        .await?;
    Ok(affected as u64)
}

async fn run_query(
    conn: &tokio_rusqlite::Connection,
    sql: &str,
    params: &[SqlValue],
) -> SqliteResult<Vec<Row>> {
    let sql = sql.to_string();
    let params = bind(params);
    debug!(sql = %sql, params = params.len(), "Executing query");

    let rows = conn
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .iter()
                .map(|s| s.to_string())
                .collect();

            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let values = (0..columns.len())
                    .map(|i| row.get_ref(i).map(from_sqlite_value))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(Row::new(columns.clone(), values));
            }
            Ok(out)
        })
        .await?;
    Ok(rows)
}

async fn run_batch(conn: &tokio_rusqlite::Connection, sql: &str) -> SqliteResult<()> {
    let sql = sql.to_string();
    debug!(sql = %sql, "Executing batch");

    conn.call(move |conn| Ok(conn.execute_batch(&sql)?)).await?;
    Ok(())
}

async fn run_rollback(conn: &tokio_rusqlite::Connection) -> SqliteResult<()> {
    conn.call(|conn| {
        // Some errors already end the transaction on SQLite's side.
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    })
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl Executor for SqliteConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        self.recover().await?;
        Ok(run_execute(&self.conn, sql, params).await?)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        self.recover().await?;
        Ok(run_query(&self.conn, sql, params).await?)
    }

    async fn batch_execute(&mut self, sql: &str) -> MigrateResult<()> {
        self.recover().await?;
        Ok(run_batch(&self.conn, sql).await?)
    }
}

#[async_trait::async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn begin(&mut self) -> MigrateResult<Box<dyn Transaction + '_>> {
        self.recover().await?;
        run_batch(&self.conn, "BEGIN IMMEDIATE").await?;
        Ok(Box::new(SqliteTransaction {
            conn: self,
            finished: false,
        }))
    }
}

/// An open `BEGIN IMMEDIATE` transaction.
pub struct SqliteTransaction<'a> {
    conn: &'a mut SqliteConnection,
    finished: bool,
}

#[async_trait::async_trait]
impl<'a> Executor for SqliteTransaction<'a> {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        Ok(run_execute(&self.conn.conn, sql, params).await?)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        Ok(run_query(&self.conn.conn, sql, params).await?)
    }

    async fn batch_execute(&mut self, sql: &str) -> MigrateResult<()> {
        Ok(run_batch(&self.conn.conn, sql).await?)
    }
}

#[async_trait::async_trait]
impl<'a> Transaction for SqliteTransaction<'a> {
    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        let mut this = self;
        run_batch(&this.conn.conn, "COMMIT").await?;
        this.finished = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        let mut this = self;
        run_rollback(&this.conn.conn).await?;
        this.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Transaction dropped without commit or rollback");
            self.conn.abandoned = true;
        }
    }
}
