//! On-disk form of a [`Database`](crate::Database).
//!
//! The snapshot records its own format version and the schema version the
//! records were written under; reopening an older schema runs the missing
//! migrations before the records are loaded.

use crate::{error::Result, CollectionName, Error, SchemaVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Layout version of [`DatabaseSnapshot`] itself.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Every record of every collection, grouped by collection name.
///
/// Collections serialize in name order and records in primary key order, so
/// the same database always yields the same JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSnapshot {
    pub format_version: u32,
    /// Schema version the records belong to
    pub version: SchemaVersion,
    #[serde(default)]
    pub collections: BTreeMap<CollectionName, Vec<Value>>,
}

impl DatabaseSnapshot {
    /// Empty snapshot at a schema version.
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            version,
            collections: BTreeMap::new(),
        }
    }

    /// Append a record to a collection.
    pub fn add_record(&mut self, collection: impl Into<CollectionName>, record: Value) {
        self.collections
            .entry(collection.into())
            .or_default()
            .push(record);
    }

    /// Records of one collection; empty if the collection is absent.
    pub fn records(&self, collection: &str) -> &[Value] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Parse a stored snapshot, refusing layouts newer than this build.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidSnapshot(format!("unreadable snapshot: {e}")))?;

        match snapshot.format_version {
            0 => Err(Error::InvalidSnapshot("snapshot format version 0".into())),
            v if v > SNAPSHOT_FORMAT_VERSION => Err(Error::InvalidSnapshot(format!(
                "snapshot format {v} is newer than supported format {SNAPSHOT_FORMAT_VERSION}"
            ))),
            _ => Ok(snapshot),
        }
    }
}
