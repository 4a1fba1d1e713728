//! Migration runner.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::config::MigratorConfig;
use crate::error::{Direction, MigrateResult, MigrationError};
use crate::executor::{Connection, Transaction};
use crate::migration::Migration;
use crate::registry::MigrationRegistry;
use crate::status::{self, MigrationStatus};
use crate::store::{MigrationRecord, SchemaRecordStore};
use crate::version::VersionOrdering;

/// The public migration surface a backend exposes.
///
/// Only [`up`](SchemaMigrator::up) is mandatory. Anything a backend does not
/// provide fails with [`MigrationError::Unsupported`] instead of silently
/// doing nothing. [`Migrator`] implements every operation.
#[async_trait::async_trait]
pub trait SchemaMigrator: Send {
    /// Backend name used in diagnostics.
    fn backend_name(&self) -> &str;

    /// Apply all pending migrations.
    async fn up(&mut self) -> MigrateResult<()>;

    /// Revert the most recently applied migration.
    async fn down(&mut self) -> MigrateResult<()> {
        Err(MigrationError::unsupported(self.backend_name(), "down"))
    }

    /// Apply pending migrations up to and including `version`.
    async fn up_to(&mut self, _version: &str) -> MigrateResult<()> {
        Err(MigrationError::unsupported(self.backend_name(), "up_to"))
    }

    /// Revert applied migrations newer than `version`.
    async fn down_to(&mut self, _version: &str) -> MigrateResult<()> {
        Err(MigrationError::unsupported(self.backend_name(), "down_to"))
    }

    /// Per-version applied/pending listing.
    async fn status(&mut self) -> MigrateResult<Vec<MigrationStatus>> {
        Err(MigrationError::unsupported(self.backend_name(), "status"))
    }

    /// Highest applied version.
    async fn version(&mut self) -> MigrateResult<Option<String>> {
        Err(MigrationError::unsupported(self.backend_name(), "version"))
    }
}

/// Applies and reverts registered migrations, one transaction per unit.
///
/// # Example
///
/// ```rust,ignore
/// use verso_migrate::{MigrationRegistry, Migrator, SqlMigration, VersionOrdering};
///
/// let registry = MigrationRegistry::new(VersionOrdering::Lexicographic)
///     .with("0001", SqlMigration::new(
///         "create_users",
///         "CREATE TABLE users (id INTEGER PRIMARY KEY)",
///         "DROP TABLE users",
///     ))?;
///
/// let mut migrator = Migrator::new(connection, registry)?;
/// migrator.up().await?;
/// println!("at version {:?}", migrator.version().await?);
/// ```
pub struct Migrator<C: Connection> {
    conn: C,
    registry: MigrationRegistry,
    store: SchemaRecordStore,
    config: MigratorConfig,
}

impl<C: Connection> Migrator<C> {
    /// Create a runner with the default configuration.
    pub fn new(conn: C, registry: MigrationRegistry) -> MigrateResult<Self> {
        Self::with_config(conn, registry, MigratorConfig::default())
    }

    /// Create a runner with an explicit configuration.
    pub fn with_config(
        conn: C,
        registry: MigrationRegistry,
        config: MigratorConfig,
    ) -> MigrateResult<Self> {
        config.validate()?;
        let store = SchemaRecordStore::new(&config.table_name, conn.dialect(), registry.ordering());
        Ok(Self {
            conn,
            registry,
            store,
            config,
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Mutable access to the underlying connection.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Consume the runner and return the connection.
    pub fn into_inner(self) -> C {
        self.conn
    }

    /// The registry.
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// The configuration.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    fn ordering(&self) -> VersionOrdering {
        self.registry.ordering()
    }

    /// Apply every pending migration in ascending order.
    #[instrument(skip(self), fields(backend = self.conn.backend_name()))]
    pub async fn up(&mut self) -> MigrateResult<()> {
        self.migrate_up(None).await
    }

    /// Apply pending migrations whose version is `<= version`.
    ///
    /// Each unit commits on its own; a failure leaves later ones pending.
    #[instrument(skip(self), fields(backend = self.conn.backend_name()))]
    pub async fn up_to(&mut self, version: &str) -> MigrateResult<()> {
        self.ordering().validate(version)?;
        self.migrate_up(Some(version)).await
    }

    /// Revert the single most recently applied migration.
    ///
    /// An empty history is a no-op.
    #[instrument(skip(self), fields(backend = self.conn.backend_name()))]
    pub async fn down(&mut self) -> MigrateResult<()> {
        self.ensure_table().await?;

        let highest = self
            .store
            .highest_applied(&mut self.conn)
            .await
            .map_err(|e| MigrationError::setup("query last migration", e))?;

        match highest {
            Some(version) => {
                let migration = self.lookup(&version)?;
                self.revert(&version, migration).await
            }
            None => {
                info!("No migrations to revert");
                Ok(())
            }
        }
    }

    /// Revert, newest first, every applied migration whose version is `> version`.
    ///
    /// Each unit reverts in its own transaction. On failure the remaining
    /// newer units stay applied.
    #[instrument(skip(self), fields(backend = self.conn.backend_name()))]
    pub async fn down_to(&mut self, version: &str) -> MigrateResult<()> {
        self.ordering().validate(version)?;
        self.ensure_table().await?;

        let applied = self.applied(false).await?;
        let ordering = self.ordering();
        let newer: Vec<String> = applied
            .into_iter()
            .filter(|v| ordering.compare(v, version).is_gt())
            .collect();

        // Resolve every unit first so an unknown version changes nothing.
        let units = newer
            .iter()
            .map(|version| self.lookup(version).map(|m| (version.as_str(), m)))
            .collect::<MigrateResult<Vec<_>>>()?;

        let start = Instant::now();
        for (newer_version, migration) in units {
            self.revert(newer_version, migration).await?;
        }

        info!(
            count = newer.len(),
            down_to = %version,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Migrations reverted"
        );
        Ok(())
    }

    /// Per-version status, ascending. Unregistered history rows are included
    /// with `is_registered == false`.
    #[instrument(skip(self), fields(backend = self.conn.backend_name()))]
    pub async fn status(&mut self) -> MigrateResult<Vec<MigrationStatus>> {
        self.ensure_table().await?;

        let records = self
            .store
            .list_applied_detailed(&mut self.conn)
            .await
            .map_err(|e| MigrationError::setup("query migrations", e))?;

        let statuses = status::merge(&self.registry, records);
        for orphan in statuses.iter().filter(|s| s.is_orphaned()) {
            warn!(version = %orphan.version, name = %orphan.name, "Applied migration is not registered");
        }
        Ok(statuses)
    }

    /// Highest applied version, or `None` when nothing has been applied.
    #[instrument(skip(self), fields(backend = self.conn.backend_name()))]
    pub async fn version(&mut self) -> MigrateResult<Option<String>> {
        self.ensure_table().await?;
        self.store
            .highest_applied(&mut self.conn)
            .await
            .map_err(|e| MigrationError::setup("query current version", e))
    }

    /// Versions [`up`](Self::up) would apply, in order.
    pub async fn pending(&mut self) -> MigrateResult<Vec<String>> {
        self.ensure_table().await?;
        let applied = self.applied(true).await?;
        self.plan(&applied, None)
    }

    /// Fail if the history references versions the registry does not know.
    pub async fn verify(&mut self) -> MigrateResult<()> {
        self.ensure_table().await?;
        let applied = self.applied(true).await?;
        let orphans = self.orphans(&applied);
        if orphans.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Inconsistent { orphans })
        }
    }

    async fn migrate_up(&mut self, target: Option<&str>) -> MigrateResult<()> {
        let start = Instant::now();

        self.ensure_table().await?;
        let applied = self.applied(true).await?;

        let orphans = self.orphans(&applied);
        if !orphans.is_empty() {
            warn!(orphans = ?orphans, "History contains unregistered migrations");
            if self.config.fail_on_orphans {
                return Err(MigrationError::Inconsistent { orphans });
            }
        }

        let pending = self.plan(&applied, target)?;
        if pending.is_empty() {
            info!("No pending migrations");
            return Ok(());
        }

        for version in &pending {
            let migration = self.lookup(version)?;
            self.apply(version, migration).await?;
        }

        info!(
            count = pending.len(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Migrations applied"
        );
        Ok(())
    }

    /// Registered, unapplied versions `<= target`, ascending.
    fn plan(&self, applied: &[String], target: Option<&str>) -> MigrateResult<Vec<String>> {
        let ordering = self.ordering();
        let applied_set: HashSet<&str> = applied.iter().map(String::as_str).collect();

        let pending: Vec<String> = self
            .registry
            .versions()
            .into_iter()
            .filter(|v| !applied_set.contains(v.as_str()))
            .filter(|v| target.is_none_or(|t| ordering.compare(v, t).is_le()))
            .collect();

        if ordering == VersionOrdering::Sequential {
            let highest = ordering.max(
                applied
                    .iter()
                    .map(String::as_str)
                    .filter(|v| ordering.validate(v).is_ok()),
            );
            if let (Some(first), Some(highest)) = (pending.first(), highest) {
                if ordering.compare(first, highest).is_lt() {
                    return Err(MigrationError::OutOfOrder {
                        version: first.clone(),
                        highest: highest.to_string(),
                    });
                }
            }
        }

        debug!(pending = ?pending, "Computed migration plan");
        Ok(pending)
    }

    fn orphans(&self, applied: &[String]) -> Vec<String> {
        applied
            .iter()
            .filter(|v| !self.registry.contains(v))
            .cloned()
            .collect()
    }

    fn lookup(&self, version: &str) -> MigrateResult<Arc<dyn Migration>> {
        self.registry
            .get(version)
            .cloned()
            .ok_or_else(|| MigrationError::NotFound(version.to_string()))
    }

    async fn ensure_table(&mut self) -> MigrateResult<()> {
        self.store
            .ensure_table(&mut self.conn)
            .await
            .map_err(|e| MigrationError::setup("create migrations table", e))
    }

    async fn applied(&mut self, ascending: bool) -> MigrateResult<Vec<String>> {
        self.store
            .list_applied(&mut self.conn, ascending)
            .await
            .map_err(|e| MigrationError::setup("query migrations", e))
    }

    async fn apply(&mut self, version: &str, migration: Arc<dyn Migration>) -> MigrateResult<()> {
        let started = Instant::now();
        debug!(version = %version, name = %migration.name(), "Applying migration");

        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| MigrationError::transaction(version, "begin", e))?;

        if let Err(e) = migration.up(&mut *tx).await {
            rollback_quietly(tx, version).await;
            return Err(MigrationError::failed(version, Direction::Up, e));
        }

        let record = MigrationRecord::now(version, migration.name());
        if let Err(e) = self.store.insert(&mut *tx, &record).await {
            rollback_quietly(tx, version).await;
            return Err(MigrationError::bookkeeping(version, e));
        }

        tx.commit()
            .await
            .map_err(|e| MigrationError::transaction(version, "commit", e))?;

        info!(
            version = %version,
            name = %migration.name(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Applied migration"
        );
        Ok(())
    }

    async fn revert(&mut self, version: &str, migration: Arc<dyn Migration>) -> MigrateResult<()> {
        let started = Instant::now();
        debug!(version = %version, name = %migration.name(), "Reverting migration");

        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| MigrationError::transaction(version, "begin", e))?;

        if let Err(e) = migration.down(&mut *tx).await {
            rollback_quietly(tx, version).await;
            return Err(MigrationError::failed(version, Direction::Down, e));
        }

        if let Err(e) = self.store.delete(&mut *tx, version).await {
            rollback_quietly(tx, version).await;
            return Err(MigrationError::bookkeeping(version, e));
        }

        tx.commit()
            .await
            .map_err(|e| MigrationError::transaction(version, "commit", e))?;

        info!(
            version = %version,
            name = %migration.name(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Reverted migration"
        );
        Ok(())
    }
}

async fn rollback_quietly(tx: Box<dyn Transaction + '_>, version: &str) {
    if let Err(e) = tx.rollback().await {
        warn!(version = %version, error = %e, "Rollback failed");
    }
}

#[async_trait::async_trait]
impl<C: Connection> SchemaMigrator for Migrator<C> {
    fn backend_name(&self) -> &str {
        self.conn.backend_name()
    }

    async fn up(&mut self) -> MigrateResult<()> {
        Migrator::up(self).await
    }

    async fn down(&mut self) -> MigrateResult<()> {
        Migrator::down(self).await
    }

    async fn up_to(&mut self, version: &str) -> MigrateResult<()> {
        Migrator::up_to(self, version).await
    }

    async fn down_to(&mut self, version: &str) -> MigrateResult<()> {
        Migrator::down_to(self, version).await
    }

    async fn status(&mut self) -> MigrateResult<Vec<MigrationStatus>> {
        Migrator::status(self).await
    }

    async fn version(&mut self) -> MigrateResult<Option<String>> {
        Migrator::version(self).await
    }
}
