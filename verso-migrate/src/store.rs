//! Migration history tracking.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MigrateResult;
use crate::executor::{Dialect, Executor, SqlValue};
use crate::version::VersionOrdering;

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration version.
    pub version: String,
    /// Migration name.
    pub name: String,
    /// When the migration was applied.
    pub executed_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// Create a record stamped with the current time.
    ///
    /// Truncated to microseconds, the finest precision both backends keep.
    pub fn now(version: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            name: name.into(),
            executed_at: Utc::now().trunc_subsecs(6),
        }
    }
}

/// Reads and writes the history table.
///
/// Every method runs against the executor it is given, so inserts and
/// deletes share the transaction of the migration body they record.
#[derive(Debug, Clone)]
pub struct SchemaRecordStore {
    table: String,
    dialect: Dialect,
    ordering: VersionOrdering,
}

impl SchemaRecordStore {
    /// Create a store for `table`.
    pub fn new(table: impl Into<String>, dialect: Dialect, ordering: VersionOrdering) -> Self {
        Self {
            table: table.into(),
            dialect,
            ordering,
        }
    }

    /// The history table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted(&self) -> String {
        self.dialect.quote(&self.table)
    }

    /// Create the history table if it does not exist.
    pub async fn ensure_table<E>(&self, exec: &mut E) -> MigrateResult<()>
    where
        E: Executor + ?Sized,
    {
        let sql = self.dialect.create_history_table(&self.table);
        debug!(table = %self.table, "Ensuring history table");
        exec.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Recorded versions, ascending or descending.
    pub async fn list_applied<E>(&self, exec: &mut E, ascending: bool) -> MigrateResult<Vec<String>>
    where
        E: Executor + ?Sized,
    {
        let sql = format!("SELECT version FROM {}", self.quoted());
        let rows = exec.query(&sql, &[]).await?;

        let mut versions = rows
            .iter()
            .map(|row| row.get_str(0).map(String::from))
            .collect::<MigrateResult<Vec<_>>>()?;

        self.ordering.sort(&mut versions);
        if !ascending {
            versions.reverse();
        }
        Ok(versions)
    }

    /// Full records, ascending by version.
    pub async fn list_applied_detailed<E>(&self, exec: &mut E) -> MigrateResult<Vec<MigrationRecord>>
    where
        E: Executor + ?Sized,
    {
        let sql = format!("SELECT version, name, executed_at FROM {}", self.quoted());
        let rows = exec.query(&sql, &[]).await?;

        let mut records = rows
            .iter()
            .map(|row| -> MigrateResult<MigrationRecord> {
                Ok(MigrationRecord {
                    version: row.get_str(0)?.to_string(),
                    name: row.get_str(1)?.to_string(),
                    executed_at: row.get_timestamp(2)?,
                })
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        records.sort_by(|a, b| self.ordering.compare(&a.version, &b.version));
        Ok(records)
    }

    /// Write one record.
    pub async fn insert<E>(&self, exec: &mut E, record: &MigrationRecord) -> MigrateResult<()>
    where
        E: Executor + ?Sized,
    {
        let sql = format!(
            "INSERT INTO {} (version, name, executed_at) VALUES ({}, {}, {})",
            self.quoted(),
            self.dialect.placeholder(1),
            self.dialect.placeholder(2),
            self.dialect.placeholder(3),
        );
        exec.execute(
            &sql,
            &[
                SqlValue::from(record.version.as_str()),
                SqlValue::from(record.name.as_str()),
                SqlValue::Timestamp(record.executed_at),
            ],
        )
        .await?;
        Ok(())
    }

    /// Remove the record for `version`.
    pub async fn delete<E>(&self, exec: &mut E, version: &str) -> MigrateResult<()>
    where
        E: Executor + ?Sized,
    {
        let sql = format!(
            "DELETE FROM {} WHERE version = {}",
            self.quoted(),
            self.dialect.placeholder(1)
        );
        exec.execute(&sql, &[SqlValue::from(version)]).await?;
        Ok(())
    }

    /// Highest recorded version, or `None` for an empty history.
    ///
    /// Reads the whole history: SQL `MAX` would compare as text and disagree
    /// with [`VersionOrdering::Sequential`].
    pub async fn highest_applied<E>(&self, exec: &mut E) -> MigrateResult<Option<String>>
    where
        E: Executor + ?Sized,
    {
        Ok(self.list_applied(exec, false).await?.into_iter().next())
    }
}
