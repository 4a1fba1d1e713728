//! Connect-and-migrate entry point.

use tracing::info;
use verso_migrate::{Connection, MigrateResult, MigrationRegistry, Migrator, MigratorConfig};

use crate::config::PgConfig;
use crate::connection::PgConnection;
use crate::pool::{PgPool, PoolConfig};

/// Connects to PostgreSQL, verifies the connection and builds a
/// [`Migrator`] over it.
///
/// ```rust,ignore
/// use verso_postgres::PgConnector;
///
/// let mut migrator = PgConnector::from_url("postgres://app@localhost/app")?
///     .init(registry)
///     .await?;
/// println!("{:?}", migrator.status().await?);
/// ```
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: PgConfig,
    pool_config: PoolConfig,
    migrator_config: MigratorConfig,
    auto_migrate: bool,
}

impl PgConnector {
    /// Create a connector for the given configuration.
    pub fn new(config: PgConfig) -> Self {
        Self {
            config,
            pool_config: PoolConfig::default(),
            migrator_config: MigratorConfig::default(),
            auto_migrate: true,
        }
    }

    /// Create a connector from a database URL.
    pub fn from_url(url: impl AsRef<str>) -> MigrateResult<Self> {
        Ok(Self::new(PgConfig::from_url(url)?))
    }

    /// Set the pool configuration.
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
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

    /// Connect, ping, build the runner and optionally run `up`.
    pub async fn init(self, registry: MigrationRegistry) -> MigrateResult<Migrator<PgConnection>> {
        let pool = PgPool::with_pool_config(self.config, self.pool_config)?;
        let mut conn = pool.get().await?;
        conn.ping().await?;

        let mut migrator = Migrator::with_config(conn, registry, self.migrator_config)?;
        if self.auto_migrate {
            migrator.up().await?;
        }

        info!(
            registered = migrator.registry().len(),
            auto_migrate = self.auto_migrate,
            "PostgreSQL migrator ready"
        );
        Ok(migrator)
    }
}
