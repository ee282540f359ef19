//! `VersionRecord` - Represents rows in the version table

use chrono::{DateTime, TimeZone, Utc};

/// Longest version string the version table can hold
pub const MAX_VERSION_LEN: usize = 14;

/// Version reported when no migration has been applied
pub const ZERO_VERSION: &str = "0";

/// One applied migration, as stored in the version table
///
/// Versions are opaque strings that sort lexicographically by creation time
/// (fixed-width `YYYYMMDDHHMMSS` timestamps in practice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    /// Migration version
    pub version: String,

    /// When the migration was applied, in milliseconds since the Unix epoch
    pub created: i64,
}

impl VersionRecord {
    /// Create a record for `version` stamped with the current time
    #[must_use]
    pub fn now(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            created: Utc::now().timestamp_millis(),
        }
    }

    /// `created` as a UTC timestamp
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created).single()
    }
}

/// Lexicographically greatest version, or `"0"` when there is none
pub fn latest_version<I, S>(versions: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    versions
        .into_iter()
        .map(|v| v.as_ref().to_string())
        .max()
        .unwrap_or_else(|| ZERO_VERSION.to_string())
}
