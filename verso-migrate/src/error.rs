//! Error types for the migration engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Direction a migration unit was being run in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Applying the unit (`up`).
    Up,
    /// Reverting the unit (`down`).
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("apply"),
            Self::Down => f.write_str("revert"),
        }
    }
}

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Error reported by the database driver.
    #[error("Database error: {0}")]
    Database(String),

    /// The history table could not be created or read.
    #[error("Failed to {operation}: {source}")]
    Setup {
        /// What the engine was doing.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// A migration body failed; its transaction was rolled back.
    #[error("Failed to {direction} migration '{version}': {source}")]
    Failed {
        /// Offending version.
        version: String,
        /// Whether the unit was being applied or reverted.
        direction: Direction,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// The history record could not be written or removed after the body ran.
    #[error("Failed to record migration '{version}': {source}")]
    Bookkeeping {
        /// Offending version.
        version: String,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// Beginning or committing the per-unit transaction failed.
    #[error("Failed to {stage} transaction for migration '{version}': {source}")]
    Transaction {
        /// Offending version.
        version: String,
        /// `begin` or `commit`.
        stage: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// Migration not found in the registry.
    #[error("Migration '{0}' not found")]
    NotFound(String),

    /// The history references versions the registry does not know.
    #[error("Migration history is inconsistent: unknown versions {}", .orphans.join(", "))]
    Inconsistent {
        /// Versions recorded in the history but absent from the registry.
        orphans: Vec<String>,
    },

    /// A pending version sorts below the highest applied version.
    #[error("Migration '{version}' is older than the applied version '{highest}'")]
    OutOfOrder {
        /// Pending version.
        version: String,
        /// Highest applied version.
        highest: String,
    },

    /// Version identifier is not valid for the configured ordering.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Version registered twice.
    #[error("Migration '{0}' is already registered")]
    DuplicateVersion(String),

    /// Invalid migration unit.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Operation not provided by a backend.
    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        /// Backend name.
        backend: String,
        /// Operation name.
        operation: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid version error.
    pub fn invalid_version(msg: impl Into<String>) -> Self {
        Self::InvalidVersion(msg.into())
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported(backend: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            backend: backend.into(),
            operation,
        }
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub(crate) fn setup(operation: &'static str, source: MigrationError) -> Self {
        Self::Setup {
            operation,
            source: Box::new(source),
        }
    }

    pub(crate) fn failed(version: &str, direction: Direction, source: MigrationError) -> Self {
        Self::Failed {
            version: version.to_string(),
            direction,
            source: Box::new(source),
        }
    }

    pub(crate) fn bookkeeping(version: &str, source: MigrationError) -> Self {
        Self::Bookkeeping {
            version: version.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn transaction(version: &str, stage: &'static str, source: MigrationError) -> Self {
        Self::Transaction {
            version: version.to_string(),
            stage,
            source: Box::new(source),
        }
    }

    /// The version this error is attached to, if any.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Failed { version, .. }
            | Self::Bookkeeping { version, .. }
            | Self::Transaction { version, .. }
            | Self::OutOfOrder { version, .. } => Some(version),
            Self::NotFound(version) | Self::DuplicateVersion(version) => Some(version),
            _ => None,
        }
    }

    /// Check if this error signals a registry/history mismatch rather than a
    /// database failure.
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Inconsistent { .. })
    }
}
