//! Schema definition for the local database.
//!
//! A schema names the collections, the key path each collection is keyed
//! by, and the secondary indexes maintained on it. Schemas are never built
//! by hand in application code; they are produced by running the ordered
//! migration list in [`crate::migration`].

use crate::{CollectionName, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collection of cached restaurants.
pub const RESTAURANTS: &str = "restaurants";
/// Collection of cached reviews.
pub const REVIEWS: &str = "reviews";
/// Collection of review submissions waiting for connectivity.
pub const OFFLINE_REVIEWS: &str = "offline_reviews";

/// Restaurants by `cuisine_type`.
pub const CUISINE_INDEX: &str = "cuisine";
/// Restaurants by `neighborhood`.
pub const NEIGHBORHOOD_INDEX: &str = "neighborhood";
/// Reviews by `restaurant_id`.
pub const RESTAURANT_INDEX: &str = "restaurant";

/// Definition of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    /// Index name
    pub name: String,
    /// Field the index is built from
    pub key_path: String,
}

impl IndexDef {
    /// Create a new index definition.
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
        }
    }
}

/// Schema for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name
    pub name: CollectionName,
    /// Field holding the primary key
    pub key_path: String,
    /// Secondary indexes
    pub indexes: Vec<IndexDef>,
}

impl CollectionSchema {
    /// Create a new collection schema without indexes.
    pub fn new(name: impl Into<CollectionName>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            indexes: Vec::new(),
        }
    }

    /// Builder-style method to add an index.
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.add_index(index);
        self
    }

    /// Add an index unless one with the same name already exists.
    pub fn add_index(&mut self, index: IndexDef) -> &mut Self {
        if self.index(&index.name).is_none() {
            self.indexes.push(index);
        }
        self
    }

    /// Get an index definition by name.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Schema for the entire database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Version reached by the migrations applied so far
    pub version: SchemaVersion,
    /// Collection schemas by name
    pub collections: BTreeMap<CollectionName, CollectionSchema>,
}

impl Schema {
    /// Create an empty schema at the given version.
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            collections: BTreeMap::new(),
        }
    }

    /// Add a collection unless it already exists.
    ///
    /// Returns the stored collection so callers can attach indexes.
    pub fn ensure_collection(&mut self, collection: CollectionSchema) -> &mut CollectionSchema {
        self.collections
            .entry(collection.name.clone())
            .or_insert(collection)
    }

    /// Builder-style method to add a collection.
    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.ensure_collection(collection);
        self
    }

    /// Get a collection schema by name.
    pub fn get_collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }
}
