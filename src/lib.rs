//! # Verso
//!
//! Versioned, transactional schema migrations.
//!
//! Verso provides:
//! - A registry of reversible migration units keyed by version
//! - `up`, `down`, `up_to`, `down_to`, `status` and `version` operations
//! - One transaction per unit, covering both the change and its history record
//! - SQLite and PostgreSQL backends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use verso::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), verso::MigrationError> {
//!     let registry = MigrationRegistry::new(VersionOrdering::Sequential)
//!         .with("1", SqlMigration::new(
//!             "create_users",
//!             "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)",
//!             "DROP TABLE users",
//!         ))?;
//!
//!     let mut migrator = SqliteConnector::from_url("sqlite://./app.db")?
//!         .init(registry)
//!         .await?;
//!
//!     for status in migrator.status().await? {
//!         println!("{:>4} {:<20} {}", status.version, status.name, status.is_applied);
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration engine: registry, runner, history store and status.
pub mod migrate {
    pub use verso_migrate::*;
}

/// SQLite backend.
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use verso_sqlite::*;
}

/// PostgreSQL backend.
#[cfg(feature = "postgres")]
pub mod postgres {
    pub use verso_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Migration, MigrationRegistry, MigrationStatus, Migrator, MigratorConfig, SchemaMigrator,
        SqlMigration, Transaction, VersionOrdering,
    };

    #[cfg(feature = "postgres")]
    pub use crate::postgres::PgConnector;
    #[cfg(feature = "sqlite")]
    pub use crate::sqlite::SqliteConnector;
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationError};
