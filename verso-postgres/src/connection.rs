//! PostgreSQL connection wrapper.

use deadpool_postgres::Object;
use tokio_postgres::GenericClient;
use tokio_postgres::types::ToSql;
use tracing::debug;
use verso_migrate::{Connection, Dialect, Executor, MigrateResult, Row, SqlValue, Transaction};

use crate::error::PgResult;
use crate::types::{bind, from_pg_row};

/// A pooled PostgreSQL connection.
pub struct PgConnection {
    client: Object,
}

impl PgConnection {
    pub(crate) fn new(client: Object) -> Self {
        Self { client }
    }

    /// Get the underlying pooled client.
    pub fn inner(&self) -> &Object {
        &self.client
    }
}

async fn run_execute<C>(client: &C, sql: &str, params: &[SqlValue]) -> PgResult<u64>
where
    C: GenericClient + Sync,
{
    debug!(sql = %sql, params = params.len(), "Executing statement");
    let bound = bind(params);
    let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    Ok(client.execute(sql, &refs).await?)
}

async fn run_query<C>(client: &C, sql: &str, params: &[SqlValue]) -> PgResult<Vec<Row>>
where
    C: GenericClient + Sync,
{
    debug!(sql = %sql, params = params.len(), "Executing query");
    let bound = bind(params);
    let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    let rows = client.query(sql, &refs).await?;
    rows.iter().map(from_pg_row).collect()
}

async fn run_batch<C>(client: &C, sql: &str) -> PgResult<()>
where
    C: GenericClient + Sync,
{
    debug!(sql = %sql, "Executing batch");
    client.batch_execute(sql).await?;
    Ok(())
}

#[async_trait::async_trait]
impl Executor for PgConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        Ok(run_execute(&**self.client, sql, params).await?)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        Ok(run_query(&**self.client, sql, params).await?)
    }

    async fn batch_execute(&mut self, sql: &str) -> MigrateResult<()> {
        Ok(run_batch(&**self.client, sql).await?)
    }
}

#[async_trait::async_trait]
impl Connection for PgConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&mut self) -> MigrateResult<Box<dyn Transaction + '_>> {
        debug!("Beginning transaction");
        let txn = self.client.transaction().await.map_err(crate::error::PgError::from)?;
        Ok(Box::new(PgTransaction { txn }))
    }
}

/// A PostgreSQL transaction.
///
/// Dropping it without committing rolls it back.
pub struct PgTransaction<'a> {
    txn: deadpool_postgres::Transaction<'a>,
}

#[async_trait::async_trait]
impl<'a> Executor for PgTransaction<'a> {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        Ok(run_execute(&*self.txn, sql, params).await?)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        Ok(run_query(&*self.txn, sql, params).await?)
    }

    async fn batch_execute(&mut self, sql: &str) -> MigrateResult<()> {
        Ok(run_batch(&*self.txn, sql).await?)
    }
}

#[async_trait::async_trait]
impl<'a> Transaction for PgTransaction<'a> {
    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        debug!("Committing transaction");
        self.txn.commit().await.map_err(crate::error::PgError::from)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        debug!("Rolling back transaction");
        self.txn.rollback().await.map_err(crate::error::PgError::from)?;
        Ok(())
    }
}
