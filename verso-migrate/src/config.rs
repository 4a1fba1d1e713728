//! Migrator configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Default name of the history table.
pub const DEFAULT_TABLE_NAME: &str = "schema_migrations";

/// Configuration for the migration runner.
///
/// Can be built in code or loaded from a TOML document:
///
/// ```toml
/// table_name = "schema_migrations"
/// fail_on_orphans = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigratorConfig {
    /// Name of the migration history table.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Refuse to migrate forward when the history holds unknown versions.
    #[serde(default)]
    pub fail_on_orphans: bool,
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            fail_on_orphans: false,
        }
    }
}

impl MigratorConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the history table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set whether orphaned history records block `up`/`up_to`.
    pub fn fail_on_orphans(mut self, fail: bool) -> Self {
        self.fail_on_orphans = fail;
        self
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> MigrateResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MigrationError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    pub async fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MigrationError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    /// Check that the table name is a plain SQL identifier.
    pub fn validate(&self) -> MigrateResult<()> {
        let name = self.table_name.as_str();
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(MigrationError::config(format!(
                "invalid history table name '{}'",
                name
            )));
        }
        Ok(())
    }
}
