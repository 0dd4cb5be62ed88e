//! Ordered schema migrations.
//!
//! Each [`Migration`] brings the schema from `version - 1` to `version`.
//! Opening a database stored at version `n` runs every step above `n` in
//! order, so a fresh database (version 0) receives all of them in one open.
//! Steps only ever add collections and indexes that are missing, which makes
//! running a step twice harmless.

use crate::schema::{
    CollectionSchema, IndexDef, Schema, CUISINE_INDEX, NEIGHBORHOOD_INDEX, OFFLINE_REVIEWS,
    RESTAURANTS, RESTAURANT_INDEX, REVIEWS,
};
use crate::{error::Result, Error, SchemaVersion};

/// A single schema upgrade step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version this step upgrades to
    pub version: SchemaVersion,
    /// Human readable summary, used in logs
    pub description: &'static str,
    apply: fn(&mut Schema),
}

impl Migration {
    /// Apply this step to a schema and stamp the schema with its version.
    pub fn apply(&self, schema: &mut Schema) {
        (self.apply)(schema);
        schema.version = schema.version.max(self.version);
    }
}

/// All migrations, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "restaurants collection with cuisine and neighborhood indexes",
        apply: add_restaurants,
    },
    Migration {
        version: 2,
        description: "reviews collection with restaurant index",
        apply: add_reviews,
    },
    Migration {
        version: 3,
        description: "offline_reviews collection",
        apply: add_offline_reviews,
    },
];

/// The newest schema version this build knows about.
pub const LATEST_VERSION: SchemaVersion = 3;

fn add_restaurants(schema: &mut Schema) {
    schema
        .ensure_collection(CollectionSchema::new(RESTAURANTS, "id"))
        .add_index(IndexDef::new(CUISINE_INDEX, "cuisine_type"))
        .add_index(IndexDef::new(NEIGHBORHOOD_INDEX, "neighborhood"));
}

fn add_reviews(schema: &mut Schema) {
    schema
        .ensure_collection(CollectionSchema::new(REVIEWS, "id"))
        .add_index(IndexDef::new(RESTAURANT_INDEX, "restaurant_id"));
}

fn add_offline_reviews(schema: &mut Schema) {
    schema.ensure_collection(CollectionSchema::new(OFFLINE_REVIEWS, "id"));
}

/// Outcome of bringing a stored schema up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Version found in storage (0 for a new database)
    pub from_version: SchemaVersion,
    /// Version after all steps ran
    pub to_version: SchemaVersion,
    /// Versions whose steps ran during this open, in order
    pub applied: Vec<SchemaVersion>,
}

impl UpgradeReport {
    /// Whether any migration ran.
    pub fn upgraded(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Build the schema for a database stored at `stored_version`.
///
/// Steps up to `stored_version` rebuild the structure that already exists;
/// steps above it are the upgrade and are listed in the report.
pub fn upgrade(stored_version: SchemaVersion) -> Result<(Schema, UpgradeReport)> {
    if stored_version > LATEST_VERSION {
        return Err(Error::UnsupportedVersion {
            stored: stored_version,
            latest: LATEST_VERSION,
        });
    }

    let mut schema = Schema::new(0);
    let mut applied = Vec::new();

    for migration in MIGRATIONS {
        migration.apply(&mut schema);
        if migration.version > stored_version {
            applied.push(migration.version);
        }
    }

    let report = UpgradeReport {
        from_version: stored_version,
        to_version: schema.version,
        applied,
    };

    Ok((schema, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_and_end_at_latest() {
        let versions: Vec<_> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(MIGRATIONS.last().map(|m| m.version), Some(LATEST_VERSION));
    }

    #[test]
    fn fresh_database_gets_every_step() {
        let (schema, report) = upgrade(0).unwrap();

        assert_eq!(report.applied, vec![1, 2, 3]);
        assert_eq!(report.to_version, 3);
        assert!(report.upgraded());
        assert!(schema.get_collection(RESTAURANTS).is_some());
        assert!(schema.get_collection(REVIEWS).is_some());
        assert!(schema.get_collection(OFFLINE_REVIEWS).is_some());
    }

    #[test]
    fn version_one_cascades_into_two_and_three() {
        let (schema, report) = upgrade(1).unwrap();

        assert_eq!(report.from_version, 1);
        assert_eq!(report.applied, vec![2, 3]);
        assert_eq!(schema.version, 3);
        assert_eq!(schema.collections.len(), 3);
    }

    #[test]
    fn current_database_runs_nothing() {
        let (_, report) = upgrade(LATEST_VERSION).unwrap();
        assert!(!report.upgraded());
    }

    #[test]
    fn newer_database_is_rejected() {
        let result = upgrade(LATEST_VERSION + 1);
        assert!(matches!(
            result,
            Err(Error::UnsupportedVersion { stored: 4, latest: 3 })
        ));
    }

    #[test]
    fn each_step_is_idempotent() {
        for migration in MIGRATIONS {
            let mut once = Schema::new(0);
            migration.apply(&mut once);

            let mut twice = once.clone();
            migration.apply(&mut twice);

            assert_eq!(once, twice, "step {} is not idempotent", migration.version);
        }
    }

    #[test]
    fn restaurant_indexes() {
        let (schema, _) = upgrade(0).unwrap();
        let restaurants = schema.get_collection(RESTAURANTS).unwrap();

        assert_eq!(restaurants.key_path, "id");
        assert_eq!(
            restaurants.index(CUISINE_INDEX).map(|i| i.key_path.as_str()),
            Some("cuisine_type")
        );
        assert_eq!(
            restaurants
                .index(NEIGHBORHOOD_INDEX)
                .map(|i| i.key_path.as_str()),
            Some("neighborhood")
        );

        let reviews = schema.get_collection(REVIEWS).unwrap();
        assert_eq!(
            reviews.index(RESTAURANT_INDEX).map(|i| i.key_path.as_str()),
            Some("restaurant_id")
        );
    }
}
