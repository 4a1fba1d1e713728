//! # verso-migrate
//!
//! Migration engine for Verso.
//!
//! This crate provides:
//! - A registry mapping version identifiers to reversible migration units
//! - A runner that applies and reverts units, one transaction per unit
//! - Migration history tracking in a `schema_migrations` table
//! - Status reporting that joins the registry with the recorded history
//!
//! Database access goes through the [`Connection`] / [`Transaction`] traits,
//! implemented by `verso-sqlite` and `verso-postgres`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │  Registry    │────▶│   Migrator     │────▶│ Transaction  │
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                              │                     │
//!                              ▼                     ▼
//!                      ┌────────────────┐     ┌──────────────┐
//!                      │ Status Report  │◀────│ History Tbl  │
//!                      └────────────────┘     └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use verso_migrate::{MigrationRegistry, Migrator, SqlMigration, VersionOrdering};
//!
//! async fn run(conn: impl verso_migrate::Connection) -> verso_migrate::MigrateResult<()> {
//!     let registry = MigrationRegistry::new(VersionOrdering::Lexicographic)
//!         .with("0001", SqlMigration::new(
//!             "create_users",
//!             "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)",
//!             "DROP TABLE users",
//!         ))?
//!         .with("0002", SqlMigration::new(
//!             "add_users_name",
//!             "ALTER TABLE users ADD COLUMN name TEXT",
//!             "ALTER TABLE users DROP COLUMN name",
//!         ))?;
//!
//!     let mut migrator = Migrator::new(conn, registry)?;
//!     migrator.up().await?;
//!
//!     for status in migrator.status().await? {
//!         println!("{} {} applied={}", status.version, status.name, status.is_applied);
//!     }
//!
//!     migrator.down_to("0001").await?;
//!     assert_eq!(migrator.version().await?.as_deref(), Some("0001"));
//!     Ok(())
//! }
//! ```
//!
//! ## Custom units
//!
//! Anything implementing [`Migration`] can be registered. Bodies receive the
//! open transaction and must not commit it themselves:
//!
//! ```rust,ignore
//! use verso_migrate::{MigrateResult, Migration, SqlValue, Transaction};
//!
//! struct SeedRoles;
//!
//! #[async_trait::async_trait]
//! impl Migration for SeedRoles {
//!     fn name(&self) -> &str {
//!         "seed_roles"
//!     }
//!
//!     async fn up(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
//!         for role in ["admin", "member"] {
//!             tx.execute("INSERT INTO roles (name) VALUES (?1)", &[SqlValue::from(role)])
//!                 .await?;
//!         }
//!         Ok(())
//!     }
//!
//!     async fn down(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
//!         tx.execute("DELETE FROM roles", &[]).await.map(|_| ())
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod migration;
pub mod registry;
pub mod runner;
pub mod status;
pub mod store;
pub mod version;

// Re-exports
pub use config::{DEFAULT_TABLE_NAME, MigratorConfig};
pub use error::{Direction, MigrateResult, MigrationError};
pub use executor::{Connection, Dialect, Executor, Row, SqlValue, Transaction};
pub use migration::{Migration, SqlMigration};
pub use registry::MigrationRegistry;
pub use runner::{Migrator, SchemaMigrator};
pub use status::{MigrationStatus, StatusSummary, summarize};
pub use store::{MigrationRecord, SchemaRecordStore};
pub use version::VersionOrdering;
