//! # Tablesync Engine
//!
//! The offline-first data core of the restaurant reviews app.
//!
//! This crate holds everything about local data that does not touch a disk,
//! a socket or a clock: the record types, the versioned schema, the
//! key-indexed database, snapshots for durability, derived queries and the
//! connectivity state machine. The `tablesync-client` crate wires it to
//! storage and HTTP.
//!
//! ## Design Principles
//!
//! - **No IO**: callers load and save [`DatabaseSnapshot`]s themselves
//! - **Deterministic**: collections and indexes iterate in key order
//! - **Upsert by identity**: writes replace whole records by primary key, so
//!   racing refreshes that store the same data are harmless
//!
//! ## Core Concepts
//!
//! ### Collections and indexes
//!
//! The [`Database`] has three collections, created by ordered
//! [`migration`]s:
//! - `restaurants`, keyed by `id`, indexed by `cuisine_type` and `neighborhood`
//! - `reviews`, keyed by `id`, indexed by `restaurant_id`
//! - `offline_reviews`, keyed by a locally generated id
//!
//! ### Records
//!
//! Backend payloads are loosely typed. [`Restaurant`] and [`Review`]
//! normalize them on the way in: ids and ratings become integers and the
//! favorite flag becomes a strict boolean.
//!
//! ## Quick Start
//!
//! ```rust
//! use tablesync_engine::{
//!     Database, IndexQuery, Restaurant, RESTAURANTS, CUISINE_INDEX,
//! };
//! use serde_json::json;
//!
//! let mut db = Database::new();
//!
//! let restaurant: Restaurant = serde_json::from_value(json!({
//!     "id": "1",
//!     "name": "Mission Chinese Food",
//!     "cuisine_type": "Asian",
//!     "neighborhood": "Manhattan",
//!     "is_favorite": "true"
//! })).unwrap();
//! db.put(RESTAURANTS, serde_json::to_value(&restaurant).unwrap()).unwrap();
//!
//! let asian = db
//!     .get_all(RESTAURANTS, Some(&IndexQuery::new(CUISINE_INDEX, "Asian")))
//!     .unwrap();
//! assert_eq!(asian.len(), 1);
//! assert_eq!(asian[0]["is_favorite"], json!(true));
//! ```
//!
//! ## Persistence
//!
//! Use [`Database::export_state`] and [`Database::open`] with
//! [`DatabaseSnapshot`]. Opening a snapshot written at an older schema
//! version runs the missing migrations.

pub mod coerce;
pub mod connectivity;
pub mod error;
pub mod key;
pub mod migration;
pub mod model;
pub mod query;
pub mod schema;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use connectivity::{Connectivity, ConnectivityState, Transition};
pub use error::Error;
pub use key::Key;
pub use migration::{Migration, UpgradeReport, LATEST_VERSION, MIGRATIONS};
pub use model::{LatLng, MapMarker, PendingReview, Restaurant, Review, ReviewSubmission};
pub use query::Filter;
pub use schema::{
    CollectionSchema, IndexDef, Schema, CUISINE_INDEX, NEIGHBORHOOD_INDEX, OFFLINE_REVIEWS,
    RESTAURANTS, RESTAURANT_INDEX, REVIEWS,
};
pub use snapshot::{DatabaseSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{Collection, Database, IndexQuery};

/// Type aliases for clarity
pub type CollectionName = String;
pub type SchemaVersion = u32;
pub type RestaurantId = i64;
pub type ReviewId = i64;
/// Milliseconds since the Unix epoch
pub type Timestamp = i64;
