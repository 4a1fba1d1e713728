//! Version identifiers and the ordering discipline shared by every operation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// How version identifiers are ordered.
///
/// The same comparator drives apply order, revert order, range bounds,
/// the "highest applied" query and status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrdering {
    /// Byte-wise string order (`"0001" < "0002" < "0010"`).
    #[default]
    Lexicographic,
    /// Unsigned integer order (`2 < 10`).
    Sequential,
}

impl VersionOrdering {
    /// Compare two version identifiers.
    ///
    /// Under [`VersionOrdering::Sequential`], values that do not parse as
    /// integers sort after all numeric ones so the order stays total.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Lexicographic => a.cmp(b),
            Self::Sequential => match (parse_seq(a), parse_seq(b)) {
                (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            },
        }
    }

    /// Sort versions ascending in place.
    pub fn sort(&self, versions: &mut [String]) {
        versions.sort_by(|a, b| self.compare(a, b));
    }

    /// Return the greatest of the given versions.
    pub fn max<'a, I>(&self, versions: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        versions.into_iter().max_by(|a, b| self.compare(a, b))
    }

    /// Check that a version identifier is acceptable for this ordering.
    ///
    /// Sequential versions must be canonical decimal integers, so `"07"`,
    /// `"+7"` and `" 7"` are rejected and each number has one spelling.
    pub fn validate(&self, version: &str) -> MigrateResult<()> {
        if version.trim().is_empty() {
            return Err(MigrationError::invalid_version("version must not be empty"));
        }
        if *self == Self::Sequential && parse_seq(version).is_none() {
            return Err(MigrationError::invalid_version(format!(
                "'{}' is not a canonical sequence number",
                version
            )));
        }
        Ok(())
    }

    /// The version that would follow `highest`.
    ///
    /// Only meaningful for [`VersionOrdering::Sequential`]; lexicographic
    /// versions are chosen by their author and yield `None`.
    pub fn next_after(&self, highest: Option<&str>) -> Option<String> {
        match self {
            Self::Lexicographic => None,
            Self::Sequential => match highest {
                None => Some("1".to_string()),
                Some(v) => parse_seq(v)
                    .and_then(|n| n.checked_add(1))
                    .map(|n| n.to_string()),
            },
        }
    }
}

fn parse_seq(version: &str) -> Option<u64> {
    version
        .parse::<u64>()
        .ok()
        .filter(|n| n.to_string() == version)
}
