//! The migration registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{MigrateResult, MigrationError};
use crate::migration::Migration;
use crate::version::VersionOrdering;

/// Mapping from version identifier to migration unit.
///
/// Built once before handing it to a [`Migrator`](crate::runner::Migrator),
/// which takes ownership and never mutates it.
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    ordering: VersionOrdering,
    units: HashMap<String, Arc<dyn Migration>>,
}

impl MigrationRegistry {
    /// Create an empty registry with the given ordering.
    pub fn new(ordering: VersionOrdering) -> Self {
        Self {
            ordering,
            units: HashMap::new(),
        }
    }

    /// Register a unit under `version`.
    ///
    /// Sequential versions are validated to canonical form, so two spellings
    /// of the same number cannot both be registered.
    pub fn register(
        &mut self,
        version: impl Into<String>,
        migration: impl Migration + 'static,
    ) -> MigrateResult<&mut Self> {
        self.register_arc(version, Arc::new(migration))
    }

    /// Register a shared unit under `version`.
    pub fn register_arc(
        &mut self,
        version: impl Into<String>,
        migration: Arc<dyn Migration>,
    ) -> MigrateResult<&mut Self> {
        let version = version.into();
        self.ordering.validate(&version)?;
        if self.units.contains_key(&version) {
            return Err(MigrationError::DuplicateVersion(version));
        }
        self.units.insert(version, migration);
        Ok(self)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        version: impl Into<String>,
        migration: impl Migration + 'static,
    ) -> MigrateResult<Self> {
        self.register(version, migration)?;
        Ok(self)
    }

    /// Look up a unit.
    pub fn get(&self, version: &str) -> Option<&Arc<dyn Migration>> {
        self.units.get(version)
    }

    /// Check whether a version is registered.
    pub fn contains(&self, version: &str) -> bool {
        self.units.contains_key(version)
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The ordering discipline.
    pub fn ordering(&self) -> VersionOrdering {
        self.ordering
    }

    /// All registered versions, ascending.
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.units.keys().cloned().collect();
        self.ordering.sort(&mut versions);
        versions
    }

    /// Suggested version for the next unit under sequential ordering.
    pub fn next_version(&self) -> Option<String> {
        let highest = self.ordering.max(self.units.keys().map(String::as_str));
        self.ordering.next_after(highest)
    }
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("ordering", &self.ordering)
            .field("versions", &self.versions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::migration::SqlMigration;

    fn unit(name: &str) -> SqlMigration {
        SqlMigration::new(name, "SELECT 1", "SELECT 1")
    }

    #[test]
    fn test_versions_sorted() {
        let registry = MigrationRegistry::new(VersionOrdering::Lexicographic)
            .with("003", unit("c"))
            .unwrap()
            .with("001", unit("a"))
            .unwrap()
            .with("002", unit("b"))
            .unwrap();

        assert_eq!(registry.versions(), vec!["001", "002", "003"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("002").map(|m| m.name().to_string()), Some("b".into()));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = MigrationRegistry::default();
        registry.register("001", unit("a")).unwrap();
        let err = registry.register("001", unit("again")).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateVersion(v) if v == "001"));
    }

    #[test]
    fn test_sequential_validation() {
        let mut registry = MigrationRegistry::new(VersionOrdering::Sequential);
        assert!(registry.register("1", unit("a")).is_ok());
        assert!(matches!(
            registry.register("two", unit("b")),
            Err(MigrationError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_sequential_aliases_rejected() {
        let mut registry = MigrationRegistry::new(VersionOrdering::Sequential);
        registry.register("7", unit("seven")).unwrap();

        for alias in ["07", "+7", " 7"] {
            assert!(matches!(
                registry.register(alias, unit("alias")),
                Err(MigrationError::InvalidVersion(_))
            ));
        }
        assert!(matches!(
            registry.register("7", unit("again")),
            Err(MigrationError::DuplicateVersion(v)) if v == "7"
        ));
        assert_eq!(registry.versions(), vec!["7"]);
    }

    #[test]
    fn test_next_version_at_upper_bound() {
        let registry = MigrationRegistry::new(VersionOrdering::Sequential)
            .with(u64::MAX.to_string(), unit("last"))
            .unwrap();
        assert_eq!(registry.next_version(), None);
    }

    #[test]
    fn test_next_version() {
        let registry = MigrationRegistry::new(VersionOrdering::Sequential)
            .with("1", unit("a"))
            .unwrap()
            .with("9", unit("b"))
            .unwrap();
        assert_eq!(registry.next_version(), Some("10".to_string()));
        assert_eq!(
            MigrationRegistry::new(VersionOrdering::Sequential).next_version(),
            Some("1".to_string())
        );
    }
}
