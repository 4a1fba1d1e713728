//! Migration units.

use crate::error::{MigrateResult, MigrationError};
use crate::executor::Transaction;

/// A versioned, reversible schema change.
///
/// Units are registered under a version in a
/// [`MigrationRegistry`](crate::registry::MigrationRegistry). Both actions
/// run inside a transaction opened by the runner; they must not commit it.
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    /// Human-readable name recorded in the history table.
    fn name(&self) -> &str;

    /// Apply the change.
    async fn up(&self, tx: &mut dyn Transaction) -> MigrateResult<()>;

    /// Revert the change.
    async fn down(&self, tx: &mut dyn Transaction) -> MigrateResult<()>;
}

/// A migration defined by a pair of SQL scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    name: String,
    up_sql: String,
    down_sql: String,
}

impl SqlMigration {
    /// Create a reversible SQL migration.
    pub fn new(name: impl Into<String>, up_sql: impl Into<String>, down_sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// Create a migration that cannot be reverted.
    pub fn irreversible(name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        Self::new(name, up_sql, String::new())
    }

    /// The apply script.
    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    /// The revert script.
    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }

    /// Whether a revert script is present.
    pub fn is_reversible(&self) -> bool {
        !self.down_sql.trim().is_empty()
    }
}

#[async_trait::async_trait]
impl Migration for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        if self.up_sql.trim().is_empty() {
            return Ok(());
        }
        tx.batch_execute(&self.up_sql).await
    }

    async fn down(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        if !self.is_reversible() {
            return Err(MigrationError::invalid_migration(format!(
                "Migration '{}' has no down migration",
                self.name
            )));
        }
        tx.batch_execute(&self.down_sql).await
    }
}
