//! Schema versioning for stored session data.

use std::fmt;

use serde::{Deserialize, Serialize};
use wtt_core::SCHEMA_VERSION;

/// Version tag carried at the top level of every stored document.
///
/// There is no migration path: a store written with any other version is
/// discarded on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(u64);

impl SchemaVersion {
    /// Version this build reads and writes.
    pub const CURRENT: SchemaVersion = SchemaVersion(SCHEMA_VERSION as u64);

    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// Reads the version tag from raw JSON without decoding the rest.
    ///
    /// Returns `None` when the tag is absent or not an unsigned integer.
    pub fn probe(value: &serde_json::Value) -> Option<Self> {
        value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .map(Self)
    }

    pub fn is_current(&self) -> bool {
        *self == Self::CURRENT
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_probe_reads_tag() {
        let v = SchemaVersion::probe(&json!({ "schema_version": 1, "sessions": [] }));
        assert_eq!(v, Some(SchemaVersion::new(1)));
        assert!(v.unwrap().is_current());
    }

    #[test]
    fn test_probe_rejects_missing_or_wrong_type() {
        assert_eq!(SchemaVersion::probe(&json!({ "sessions": [] })), None);
        assert_eq!(SchemaVersion::probe(&json!({ "schema_version": "1" })), None);
        assert_eq!(SchemaVersion::probe(&json!([1, 2])), None);
    }

    #[test]
    fn test_other_versions_are_not_current() {
        assert!(!SchemaVersion::new(2).is_current());
        assert_eq!(SchemaVersion::new(2).to_string(), "v2");
    }
}
