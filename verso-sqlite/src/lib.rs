//! SQLite backend for Verso migrations.
//!
//! Implements the `verso-migrate` executor traits on top of `tokio-rusqlite`,
//! so DDL and history bookkeeping share one SQLite transaction per
//! migration unit.
//!
//! # Example
//!
//! ```rust,ignore
//! use verso_migrate::{MigrationRegistry, SqlMigration, VersionOrdering};
//! use verso_sqlite::SqliteConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = MigrationRegistry::new(VersionOrdering::Sequential)
//!         .with("1", SqlMigration::new(
//!             "create_users",
//!             "CREATE TABLE users (id INTEGER PRIMARY KEY)",
//!             "DROP TABLE users",
//!         ))?;
//!
//!     let mut migrator = SqliteConnector::from_url("sqlite://./app.db")?
//!         .init(registry)
//!         .await?;
//!
//!     println!("schema at {:?}", migrator.version().await?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig, SynchronousMode};
pub use connection::{SqliteConnection, SqliteTransaction};
pub use connector::SqliteConnector;
pub use error::{SqliteError, SqliteResult};
