//! Applied/pending projection of the registry against the history table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::MigrationRegistry;
use crate::store::MigrationRecord;

/// Status of a single version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Version identifier.
    pub version: String,
    /// Recorded name when applied, registered name otherwise.
    pub name: String,
    /// When the version was applied.
    pub executed_at: Option<DateTime<Utc>>,
    /// Whether a history record exists.
    pub is_applied: bool,
    /// Whether the registry knows this version.
    pub is_registered: bool,
}

impl MigrationStatus {
    /// Recorded in the history but unknown to the registry.
    pub fn is_orphaned(&self) -> bool {
        self.is_applied && !self.is_registered
    }
}

/// Counts derived from a status listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    /// Registered and applied.
    pub applied: usize,
    /// Registered, not applied.
    pub pending: usize,
    /// Applied but unregistered.
    pub orphaned: usize,
}

impl StatusSummary {
    /// One-line description.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} applied", self.applied),
            format!("{} pending", self.pending),
        ];
        if self.orphaned > 0 {
            parts.push(format!("{} ORPHANED", self.orphaned));
        }
        parts.join(", ")
    }
}

/// Count applied, pending and orphaned entries.
pub fn summarize(statuses: &[MigrationStatus]) -> StatusSummary {
    statuses
        .iter()
        .fold(StatusSummary::default(), |mut acc, status| {
            match (status.is_registered, status.is_applied) {
                (true, true) => acc.applied += 1,
                (true, false) => acc.pending += 1,
                (false, _) => acc.orphaned += 1,
            }
            acc
        })
}

/// Join registry entries with persisted records, ascending by version.
pub fn merge(registry: &MigrationRegistry, records: Vec<MigrationRecord>) -> Vec<MigrationStatus> {
    let mut recorded: HashMap<String, MigrationRecord> = records
        .into_iter()
        .map(|r| (r.version.clone(), r))
        .collect();

    let mut statuses: Vec<MigrationStatus> = registry
        .versions()
        .into_iter()
        .map(|version| match recorded.remove(&version) {
            Some(record) => MigrationStatus {
                version,
                name: record.name,
                executed_at: Some(record.executed_at),
                is_applied: true,
                is_registered: true,
            },
            None => {
                let name = registry
                    .get(&version)
                    .map(|m| m.name().to_string())
                    .unwrap_or_default();
                MigrationStatus {
                    version,
                    name,
                    executed_at: None,
                    is_applied: false,
                    is_registered: true,
                }
            }
        })
        .collect();

    statuses.extend(recorded.into_values().map(|record| MigrationStatus {
        version: record.version,
        name: record.name,
        executed_at: Some(record.executed_at),
        is_applied: true,
        is_registered: false,
    }));

    let ordering = registry.ordering();
    statuses.sort_by(|a, b| ordering.compare(&a.version, &b.version));
    statuses
}
