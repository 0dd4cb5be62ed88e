//! # Tablesync Client
//!
//! Offline-first access to a restaurant reviews backend.
//!
//! - [`store::LocalStore`]: durable local database (snapshot file or memory)
//! - [`gateway::HttpGateway`]: the REST backend
//! - [`sync::SyncEngine`]: cache-first reads, queued review submissions
//! - [`connectivity::ConnectivityMonitor`]: replays the queue when back online
//! - [`proxy::CacheProxy`]: cache-first static asset proxy
//! - [`session::Session`]: per-page context for a presentation layer
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tablesync_client::{HttpGateway, LocalStore, SyncEngine};
//!
//! # async fn demo() -> tablesync_client::Result<()> {
//! let store = LocalStore::open_file("tablesync.json").await;
//! let gateway = HttpGateway::new("http://localhost:1337".parse().expect("valid url"));
//! let engine = SyncEngine::new(store, Arc::new(gateway));
//!
//! for restaurant in engine.fetch_by_cuisine_and_neighborhood("all", "Manhattan").await? {
//!     println!("{} ({})", restaurant.name, restaurant.cuisine_type);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod gateway;
pub mod proxy;
pub mod session;
pub mod store;
pub mod sync;

pub use config::{Config, ConfigError};
pub use connectivity::ConnectivityMonitor;
pub use error::{Result, SyncError};
pub use events::{EventBus, ReviewsUpdated};
pub use gateway::{HttpGateway, RemoteGateway};
pub use proxy::{CacheProxy, CachedResponse, Intercept, ResponseCache, Route, Source};
pub use session::Session;
pub use store::{FileBackend, LocalStore, MemoryBackend, StorageBackend};
pub use sync::{DataSource, ReplayReport, SubmitOutcome, SyncEngine};
