//! Database - the in-memory key-indexed record container.
//!
//! The Database holds one [`Collection`] per schema collection. Records are
//! JSON objects keyed by the value at the collection's key path, and every
//! write keeps the collection's secondary indexes in step. Writes replace
//! whole records; there is no field-level patching.

use crate::migration::{self, UpgradeReport, MIGRATIONS};
use crate::{
    error::Result, CollectionName, CollectionSchema, DatabaseSnapshot, Error, Key, Schema,
    SchemaVersion,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Lookup through a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    /// Index name
    pub index: String,
    /// Value to match
    pub key: Key,
}

impl IndexQuery {
    /// Create a new index query.
    pub fn new(index: impl Into<String>, key: impl Into<Key>) -> Self {
        Self {
            index: index.into(),
            key: key.into(),
        }
    }
}

/// Index entries: index key -> primary keys of matching records.
type IndexEntries = BTreeMap<Key, BTreeSet<Key>>;

/// A collection of records plus its secondary indexes.
#[derive(Debug, Clone)]
pub struct Collection {
    schema: CollectionSchema,
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, IndexEntries>,
}

impl Collection {
    /// Create an empty collection for a schema.
    pub fn new(schema: CollectionSchema) -> Self {
        let indexes = schema
            .indexes
            .iter()
            .map(|i| (i.name.clone(), IndexEntries::new()))
            .collect();

        Self {
            schema,
            records: BTreeMap::new(),
            indexes,
        }
    }

    /// Collection schema.
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Get a record by primary key.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.records.get(key)
    }

    /// All records in primary key order.
    pub fn records(&self) -> impl Iterator<Item = &Value> {
        self.records.values()
    }

    /// All primary keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.records.keys()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the collection has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace a record by its primary key.
    pub fn put(&mut self, record: Value) -> Result<Key> {
        let key = self.primary_key(&record)?;

        if let Some(old) = self.records.remove(&key) {
            self.unindex(&key, &old);
        }
        self.index(&key, &record);
        self.records.insert(key.clone(), record);

        Ok(key)
    }

    /// Insert a record, failing if its primary key is taken.
    pub fn add(&mut self, record: Value) -> Result<Key> {
        let key = self.primary_key(&record)?;

        if self.records.contains_key(&key) {
            return Err(Error::KeyAlreadyExists {
                collection: self.schema.name.clone(),
                key: key.to_string(),
            });
        }

        self.put(record)
    }

    /// Remove every record. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        for entries in self.indexes.values_mut() {
            entries.clear();
        }
        removed
    }

    /// Records whose index value equals `key`, in primary key order.
    pub fn lookup(&self, index: &str, key: &Key) -> Result<Vec<&Value>> {
        let entries = self.index_entries(index)?;

        Ok(entries
            .get(key)
            .map(|primary_keys| {
                primary_keys
                    .iter()
                    .filter_map(|pk| self.records.get(pk))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// First record whose index value equals `key`.
    pub fn lookup_first(&self, index: &str, key: &Key) -> Result<Option<&Value>> {
        let entries = self.index_entries(index)?;

        Ok(entries
            .get(key)
            .and_then(|primary_keys| primary_keys.iter().next())
            .and_then(|pk| self.records.get(pk)))
    }

    fn index_entries(&self, index: &str) -> Result<&IndexEntries> {
        self.indexes.get(index).ok_or_else(|| Error::IndexNotFound {
            collection: self.schema.name.clone(),
            index: index.to_string(),
        })
    }

    fn primary_key(&self, record: &Value) -> Result<Key> {
        if !record.is_object() {
            return Err(Error::InvalidRecord(format!(
                "records in '{}' must be objects",
                self.schema.name
            )));
        }

        Key::extract(record, &self.schema.key_path).ok_or_else(|| Error::MissingKey {
            collection: self.schema.name.clone(),
            key_path: self.schema.key_path.clone(),
        })
    }

    fn index(&mut self, key: &Key, record: &Value) {
        for def in &self.schema.indexes {
            // Records without a usable value at the key path stay out of the index
            let Some(index_key) = Key::extract(record, &def.key_path) else {
                continue;
            };
            if let Some(entries) = self.indexes.get_mut(&def.name) {
                entries.entry(index_key).or_default().insert(key.clone());
            }
        }
    }

    fn unindex(&mut self, key: &Key, record: &Value) {
        for def in &self.schema.indexes {
            let Some(index_key) = Key::extract(record, &def.key_path) else {
                continue;
            };
            if let Some(entries) = self.indexes.get_mut(&def.name) {
                if let Some(primary_keys) = entries.get_mut(&index_key) {
                    primary_keys.remove(key);
                    if primary_keys.is_empty() {
                        entries.remove(&index_key);
                    }
                }
            }
        }
    }
}

/// The local database.
#[derive(Debug, Clone)]
pub struct Database {
    schema: Schema,
    collections: BTreeMap<CollectionName, Collection>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Create an empty database at the latest schema version.
    pub fn new() -> Self {
        let mut schema = Schema::new(0);
        for migration in MIGRATIONS {
            migration.apply(&mut schema);
        }
        Self::with_schema(schema)
    }

    fn with_schema(schema: Schema) -> Self {
        let collections = schema
            .collections
            .values()
            .map(|c| (c.name.clone(), Collection::new(c.clone())))
            .collect();

        Self {
            schema,
            collections,
        }
    }

    /// Open a database from an optional stored snapshot.
    ///
    /// The snapshot's schema version decides which migrations run. With no
    /// snapshot the database starts at version 0 and receives all of them.
    pub fn open(snapshot: Option<DatabaseSnapshot>) -> Result<(Self, UpgradeReport)> {
        let stored_version = snapshot.as_ref().map(|s| s.version).unwrap_or(0);
        let (schema, report) = migration::upgrade(stored_version)?;
        let mut db = Self::with_schema(schema);

        if let Some(snapshot) = snapshot {
            for (collection_name, records) in snapshot.collections {
                let collection = db.collections.get_mut(&collection_name).ok_or_else(|| {
                    Error::InvalidSnapshot(format!("unknown collection '{}'", collection_name))
                })?;
                for record in records {
                    collection.put(record)?;
                }
            }
        }

        Ok((db, report))
    }

    /// Current schema version.
    pub fn version(&self) -> SchemaVersion {
        self.schema.version
    }

    /// Get the schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Get a collection by name.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    fn collection_ref(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// All records in a collection, or only those matching an index query.
    pub fn get_all(&self, collection: &str, query: Option<&IndexQuery>) -> Result<Vec<&Value>> {
        let collection = self.collection_ref(collection)?;
        match query {
            Some(q) => collection.lookup(&q.index, &q.key),
            None => Ok(collection.records().collect()),
        }
    }

    /// Get one record by primary key.
    pub fn get(&self, collection: &str, key: &Key) -> Result<Option<&Value>> {
        Ok(self.collection_ref(collection)?.get(key))
    }

    /// Get the first record matching an index value.
    pub fn get_by_index(&self, collection: &str, index: &str, key: &Key) -> Result<Option<&Value>> {
        self.collection_ref(collection)?.lookup_first(index, key)
    }

    /// Insert or replace a record.
    pub fn put(&mut self, collection: &str, record: Value) -> Result<Key> {
        self.collection_mut(collection)?.put(record)
    }

    /// Insert a record that must not exist yet.
    pub fn add(&mut self, collection: &str, record: Value) -> Result<Key> {
        self.collection_mut(collection)?.add(record)
    }

    /// Delete all records in a collection.
    pub fn clear(&mut self, collection: &str) -> Result<usize> {
        Ok(self.collection_mut(collection)?.clear())
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.collection_ref(collection)?.len())
    }

    /// Smallest integer key that is at least `candidate` and greater than
    /// every integer key already in the collection.
    pub fn next_int_key(&self, collection: &str, candidate: i64) -> Result<i64> {
        let last = self
            .collection_ref(collection)?
            .keys()
            .filter_map(|k| match k {
                Key::Int(i) => Some(*i),
                Key::Text(_) => None,
            })
            .max();

        Ok(match last {
            Some(last) if last >= candidate => last.saturating_add(1),
            _ => candidate,
        })
    }

    /// Export the current state as a snapshot.
    pub fn export_state(&self) -> DatabaseSnapshot {
        let mut snapshot = DatabaseSnapshot::new(self.schema.version);
        for (name, collection) in &self.collections {
            snapshot
                .collections
                .insert(name.clone(), collection.records().cloned().collect());
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        CUISINE_INDEX, NEIGHBORHOOD_INDEX, OFFLINE_REVIEWS, RESTAURANTS, RESTAURANT_INDEX,
        REVIEWS,
    };
    use serde_json::json;

    fn restaurant(id: i64, cuisine: &str, neighborhood: &str) -> Value {
        json!({
            "id": id,
            "name": format!("Restaurant {}", id),
            "cuisine_type": cuisine,
            "neighborhood": neighborhood,
        })
    }

    #[test]
    fn new_database_is_at_latest_version() {
        let db = Database::new();
        assert_eq!(db.version(), 3);
        assert!(db.collection(RESTAURANTS).is_some());
        assert!(db.collection(REVIEWS).is_some());
        assert!(db.collection(OFFLINE_REVIEWS).is_some());
    }

    #[test]
    fn put_is_upsert_by_key() {
        let mut db = Database::new();
        db.put(RESTAURANTS, restaurant(1, "Asian", "Manhattan")).unwrap();
        db.put(RESTAURANTS, restaurant(1, "Asian", "Manhattan")).unwrap();

        assert_eq!(db.count(RESTAURANTS).unwrap(), 1);
        assert_eq!(
            db.get(RESTAURANTS, &Key::Int(1)).unwrap(),
            Some(&restaurant(1, "Asian", "Manhattan"))
        );
    }

    #[test]
    fn put_replaces_whole_record_and_reindexes() {
        let mut db = Database::new();
        db.put(RESTAURANTS, restaurant(1, "Asian", "Manhattan")).unwrap();
        db.put(RESTAURANTS, json!({"id": 1, "cuisine_type": "Pizza"}))
            .unwrap();

        let stored = db.get(RESTAURANTS, &Key::Int(1)).unwrap().unwrap();
        assert!(stored.get("neighborhood").is_none());

        let asian = db
            .get_all(RESTAURANTS, Some(&IndexQuery::new(CUISINE_INDEX, "Asian")))
            .unwrap();
        assert!(asian.is_empty());

        let manhattan = db
            .get_all(
                RESTAURANTS,
                Some(&IndexQuery::new(NEIGHBORHOOD_INDEX, "Manhattan")),
            )
            .unwrap();
        assert!(manhattan.is_empty());

        let pizza = db
            .get_all(RESTAURANTS, Some(&IndexQuery::new(CUISINE_INDEX, "Pizza")))
            .unwrap();
        assert_eq!(pizza.len(), 1);
    }

    #[test]
    fn get_all_by_index() {
        let mut db = Database::new();
        db.put(REVIEWS, json!({"id": 3, "restaurant_id": 1})).unwrap();
        db.put(REVIEWS, json!({"id": 1, "restaurant_id": 1})).unwrap();
        db.put(REVIEWS, json!({"id": 2, "restaurant_id": 2})).unwrap();

        let reviews = db
            .get_all(REVIEWS, Some(&IndexQuery::new(RESTAURANT_INDEX, 1)))
            .unwrap();
        let ids: Vec<_> = reviews.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn index_key_types_must_match() {
        let mut db = Database::new();
        db.put(REVIEWS, json!({"id": 1, "restaurant_id": "1"})).unwrap();

        let by_int = db
            .get_all(REVIEWS, Some(&IndexQuery::new(RESTAURANT_INDEX, 1)))
            .unwrap();
        assert!(by_int.is_empty());
    }

    #[test]
    fn get_by_index_returns_first_match_only() {
        let mut db = Database::new();
        db.put(RESTAURANTS, restaurant(2, "Asian", "Queens")).unwrap();
        db.put(RESTAURANTS, restaurant(1, "Asian", "Brooklyn")).unwrap();

        let first = db
            .get_by_index(RESTAURANTS, CUISINE_INDEX, &Key::from("Asian"))
            .unwrap()
            .unwrap();
        assert_eq!(first["id"], 1);

        let none = db
            .get_by_index(RESTAURANTS, CUISINE_INDEX, &Key::from("Mexican"))
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn records_without_index_value_are_not_indexed() {
        let mut db = Database::new();
        db.put(RESTAURANTS, json!({"id": 1, "name": "No cuisine"}))
            .unwrap();

        assert_eq!(db.count(RESTAURANTS).unwrap(), 1);
        let indexed = db
            .get_all(RESTAURANTS, Some(&IndexQuery::new(CUISINE_INDEX, "")))
            .unwrap();
        assert!(indexed.is_empty());
    }

    #[test]
    fn add_rejects_existing_key() {
        let mut db = Database::new();
        db.add(OFFLINE_REVIEWS, json!({"id": 100, "data": {}})).unwrap();

        let result = db.add(OFFLINE_REVIEWS, json!({"id": 100, "data": {}}));
        assert!(matches!(result, Err(Error::KeyAlreadyExists { .. })));
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut db = Database::new();
        let result = db.put(RESTAURANTS, json!({"name": "Nameless"}));
        assert!(matches!(result, Err(Error::MissingKey { .. })));

        let result = db.put(RESTAURANTS, json!([1, 2, 3]));
        assert!(matches!(result, Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn clear_empties_collection_and_indexes() {
        let mut db = Database::new();
        db.put(REVIEWS, json!({"id": 1, "restaurant_id": 5})).unwrap();
        db.put(REVIEWS, json!({"id": 2, "restaurant_id": 5})).unwrap();

        assert_eq!(db.clear(REVIEWS).unwrap(), 2);
        assert_eq!(db.count(REVIEWS).unwrap(), 0);
        assert!(db
            .get_all(REVIEWS, Some(&IndexQuery::new(RESTAURANT_INDEX, 5)))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unknown_collection_and_index() {
        let db = Database::new();
        assert!(matches!(
            db.get_all("menus", None),
            Err(Error::CollectionNotFound(c)) if c == "menus"
        ));
        assert!(matches!(
            db.get_all(REVIEWS, Some(&IndexQuery::new("rating", 5))),
            Err(Error::IndexNotFound { .. })
        ));
    }

    #[test]
    fn next_int_key_never_collides() {
        let mut db = Database::new();
        assert_eq!(db.next_int_key(OFFLINE_REVIEWS, 1000).unwrap(), 1000);

        db.add(OFFLINE_REVIEWS, json!({"id": 1000, "data": {}})).unwrap();
        assert_eq!(db.next_int_key(OFFLINE_REVIEWS, 1000).unwrap(), 1001);
        assert_eq!(db.next_int_key(OFFLINE_REVIEWS, 999).unwrap(), 1001);
        assert_eq!(db.next_int_key(OFFLINE_REVIEWS, 5000).unwrap(), 5000);
    }

    #[test]
    fn export_and_open_preserves_records() {
        let mut db = Database::new();
        db.put(RESTAURANTS, restaurant(1, "Asian", "Manhattan")).unwrap();
        db.put(REVIEWS, json!({"id": 9, "restaurant_id": 1})).unwrap();

        let snapshot = db.export_state();
        let (reopened, report) = Database::open(Some(snapshot)).unwrap();

        assert!(!report.upgraded());
        assert_eq!(reopened.count(RESTAURANTS).unwrap(), 1);
        assert_eq!(
            reopened
                .get_all(REVIEWS, Some(&IndexQuery::new(RESTAURANT_INDEX, 1)))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn open_version_one_snapshot_upgrades_and_keeps_restaurants() {
        let mut snapshot = DatabaseSnapshot::new(1);
        snapshot.add_record(RESTAURANTS, restaurant(4, "Pizza", "Brooklyn"));

        let (db, report) = Database::open(Some(snapshot)).unwrap();

        assert_eq!(report.applied, vec![2, 3]);
        assert_eq!(db.version(), 3);
        assert_eq!(db.count(RESTAURANTS).unwrap(), 1);
        assert_eq!(db.count(REVIEWS).unwrap(), 0);
        assert_eq!(db.count(OFFLINE_REVIEWS).unwrap(), 0);
    }

    #[test]
    fn open_rejects_unknown_collection() {
        let mut snapshot = DatabaseSnapshot::new(3);
        snapshot.add_record("menus", json!({"id": 1}));

        let result = Database::open(Some(snapshot));
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }
}
