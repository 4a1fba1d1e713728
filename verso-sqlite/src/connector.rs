//! Connect-and-migrate entry point.

use tracing::info;
use verso_migrate::{Connection, MigrateResult, MigrationRegistry, Migrator, MigratorConfig};

use crate::config::SqliteConfig;
use crate::connection::SqliteConnection;

/// Opens a SQLite database, verifies it and builds a [`Migrator`] over it.
///
/// ```rust,ignore
/// use verso_sqlite::SqliteConnector;
///
/// let migrator = SqliteConnector::from_url("sqlite://./app.db")?
///     .init(registry)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    config: SqliteConfig,
    migrator_config: MigratorConfig,
    auto_migrate: bool,
}

impl SqliteConnector {
    /// Create a connector for the given database configuration.
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            migrator_config: MigratorConfig::default(),
            auto_migrate: true,
        }
    }

    /// Create a connector from a SQLite URL.
    pub fn from_url(url: impl AsRef<str>) -> MigrateResult<Self> {
        Ok(Self::new(SqliteConfig::from_url(url)?))
    }

    /// Set the runner configuration.
    pub fn migrator_config(mut self, config: MigratorConfig) -> Self {
        self.migrator_config = config;
        self
    }

    /// Whether [`init`](Self::init) applies pending migrations. Defaults to `true`.
    pub fn auto_migrate(mut self, enabled: bool) -> Self {
        self.auto_migrate = enabled;
        self
    }

    /// Open the database, ping it, build the runner and optionally run `up`.
    pub async fn init(self, registry: MigrationRegistry) -> MigrateResult<Migrator<SqliteConnection>> {
        let mut conn = SqliteConnection::open(self.config).await?;
        conn.ping().await?;

        let mut migrator = Migrator::with_config(conn, registry, self.migrator_config)?;
        if self.auto_migrate {
            migrator.up().await?;
        }

        info!(
            registered = migrator.registry().len(),
            auto_migrate = self.auto_migrate,
            "SQLite migrator ready"
        );
        Ok(migrator)
    }
}

#[cfg(test)]
mod tests {
    use verso_migrate::{SqlMigration, VersionOrdering};

    use super::*;

    fn registry() -> MigrationRegistry {
        MigrationRegistry::new(VersionOrdering::Lexicographic)
            .with(
                "001",
                SqlMigration::new(
                    "create_users",
                    "CREATE TABLE users (id INTEGER PRIMARY KEY)",
                    "DROP TABLE users",
                ),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_init_runs_pending_migrations() {
        let mut migrator = SqliteConnector::new(SqliteConfig::memory())
            .init(registry())
            .await
            .unwrap();
        assert_eq!(migrator.version().await.unwrap(), Some("001".to_string()));
    }

    #[tokio::test]
    async fn test_init_without_auto_migrate() {
        let mut migrator = SqliteConnector::from_url("sqlite::memory:")
            .unwrap()
            .auto_migrate(false)
            .migrator_config(MigratorConfig::new().table_name("app_versions"))
            .init(registry())
            .await
            .unwrap();

        assert_eq!(migrator.version().await.unwrap(), None);
        assert_eq!(migrator.pending().await.unwrap(), vec!["001".to_string()]);
    }

    #[tokio::test]
    async fn test_init_rejects_bad_table_name() {
        let result = SqliteConnector::new(SqliteConfig::memory())
            .migrator_config(MigratorConfig::new().table_name("bad name"))
            .init(registry())
            .await;
        assert!(result.is_err());
    }
}
