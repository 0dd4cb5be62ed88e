//! Sync Engine: offline-first reads and queued writes.
//!
//! Reads check the [`LocalStore`] first and pull from the
//! [`RemoteGateway`] on a miss. Writes try the gateway and fall back to the
//! pending queue, which [`SyncEngine::replay_pending`] drains once
//! connectivity returns.

use crate::error::Result;
use crate::events::{EventBus, ReviewsUpdated};
use crate::gateway::RemoteGateway;
use crate::store::LocalStore;
use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tablesync_engine::query::{self, Filter};
use tablesync_engine::{
    IndexQuery, Key, PendingReview, Restaurant, RestaurantId, Review, ReviewSubmission,
    CUISINE_INDEX, NEIGHBORHOOD_INDEX, RESTAURANTS, RESTAURANT_INDEX, REVIEWS,
};
use tokio::sync::broadcast;

/// Result of a review submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Accepted by the backend
    Submitted(Review),
    /// Backend unreachable; kept in the pending queue
    Queued(PendingReview),
}

impl SubmitOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted(_))
    }
}

/// What a pending-queue replay did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Entries taken from the queue
    pub attempted: usize,
    /// Entries the backend accepted
    pub submitted: usize,
    /// Entries that failed again and went back into the queue
    pub requeued: usize,
    /// Entries that failed and could not be queued again
    pub dropped: usize,
}

/// The data-access surface the presentation layer depends on.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn get_restaurants(&self) -> Result<Vec<Restaurant>>;

    async fn restaurant_by_id(&self, id: RestaurantId) -> Result<Option<Restaurant>>;

    async fn get_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Review>>;

    /// Reviews already in the local store, without touching the network.
    async fn cached_reviews(&self, restaurant_id: RestaurantId) -> Vec<Review>;

    async fn submit_review(&self, submission: ReviewSubmission) -> Result<SubmitOutcome>;

    async fn toggle_favorite(&self, restaurant_id: RestaurantId, is_favorite: bool) -> Result<()>;
}

/// Coordinates the local store, the gateway and event delivery.
#[derive(Clone)]
pub struct SyncEngine {
    store: LocalStore,
    gateway: Arc<dyn RemoteGateway>,
    events: EventBus,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(store: LocalStore, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self::with_events(store, gateway, EventBus::default())
    }

    pub fn with_events(store: LocalStore, gateway: Arc<dyn RemoteGateway>, events: EventBus) -> Self {
        Self {
            store,
            gateway,
            events,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to "reviews updated" notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ReviewsUpdated> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Restaurants
    // ------------------------------------------------------------------

    /// All restaurants, from the local store or, when it is empty, the backend.
    ///
    /// A backend pull also refreshes the reviews of every restaurant.
    pub async fn get_restaurants(&self) -> Result<Vec<Restaurant>> {
        let cached = self.cached_restaurants().await;
        if !cached.is_empty() {
            tracing::debug!(count = cached.len(), "Restaurants served from local store");
            return Ok(cached);
        }
        self.refresh_restaurants().await
    }

    /// Restaurants in the local store; empty on any error.
    pub async fn cached_restaurants(&self) -> Vec<Restaurant> {
        self.read_local(RESTAURANTS, None).await
    }

    /// Pull restaurants from the backend, store them and refresh their reviews.
    pub async fn refresh_restaurants(&self) -> Result<Vec<Restaurant>> {
        let restaurants = self.gateway.list_restaurants().await?;
        tracing::info!(count = restaurants.len(), "Pulled restaurants");

        self.store_records(RESTAURANTS, &restaurants).await;
        self.refresh_all_reviews(&restaurants).await;

        Ok(restaurants)
    }

    async fn refresh_all_reviews(&self, restaurants: &[Restaurant]) {
        let refreshes = restaurants.iter().map(|r| self.refresh_reviews(r.id));
        for (restaurant, result) in restaurants.iter().zip(join_all(refreshes).await) {
            if let Err(e) = result {
                tracing::warn!(restaurant_id = restaurant.id, "Review refresh failed: {}", e);
            }
        }
    }

    /// One restaurant by id; `None` if neither the store nor the backend has it.
    pub async fn restaurant_by_id(&self, id: RestaurantId) -> Result<Option<Restaurant>> {
        match self.store.get(RESTAURANTS, &Key::Int(id)).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(restaurant) => return Ok(Some(restaurant)),
                Err(e) => tracing::warn!(id, "Stored restaurant unreadable: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(id, "Local restaurant lookup failed: {}", e),
        }

        let restaurants = self.get_restaurants().await?;
        Ok(restaurants.into_iter().find(|r| r.id == id))
    }

    // ------------------------------------------------------------------
    // Derived queries
    // ------------------------------------------------------------------

    /// First restaurant (by id) with the given cuisine.
    pub async fn fetch_by_cuisine(&self, cuisine: &str) -> Result<Option<Restaurant>> {
        self.first_by_index(CUISINE_INDEX, cuisine, |r| r.cuisine_type == cuisine)
            .await
    }

    /// First restaurant (by id) in the given neighborhood.
    pub async fn fetch_by_neighborhood(&self, neighborhood: &str) -> Result<Option<Restaurant>> {
        self.first_by_index(NEIGHBORHOOD_INDEX, neighborhood, |r| {
            r.neighborhood == neighborhood
        })
        .await
    }

    async fn first_by_index(
        &self,
        index: &str,
        value: &str,
        matches: impl Fn(&Restaurant) -> bool,
    ) -> Result<Option<Restaurant>> {
        let restaurants = self.get_restaurants().await?;

        if self.store.is_available() {
            match self
                .store
                .get_by_index(RESTAURANTS, index, &Key::from(value))
                .await
            {
                Ok(Some(record)) => return Ok(Some(serde_json::from_value(record)?)),
                Ok(None) => {}
                Err(e) => tracing::warn!(index, "Index lookup failed: {}", e),
            }
        }

        // Same answer the index gives: lowest id among the matches
        Ok(restaurants
            .into_iter()
            .filter(|r| matches(r))
            .min_by_key(|r| r.id))
    }

    /// Restaurants passing both filters; `"all"` disables a filter.
    pub async fn fetch_by_cuisine_and_neighborhood(
        &self,
        cuisine: &str,
        neighborhood: &str,
    ) -> Result<Vec<Restaurant>> {
        let restaurants = self.get_restaurants().await?;
        Ok(query::by_cuisine_and_neighborhood(
            &restaurants,
            &Filter::parse(cuisine),
            &Filter::parse(neighborhood),
        ))
    }

    /// Distinct neighborhoods, in first-seen order.
    pub async fn fetch_neighborhoods(&self) -> Result<Vec<String>> {
        Ok(query::neighborhoods(&self.get_restaurants().await?))
    }

    /// Distinct cuisines, in first-seen order.
    pub async fn fetch_cuisines(&self) -> Result<Vec<String>> {
        Ok(query::cuisines(&self.get_restaurants().await?))
    }

    // ------------------------------------------------------------------
    // Reviews
    // ------------------------------------------------------------------

    /// Reviews of a restaurant, from the local store or the backend.
    pub async fn get_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Review>> {
        let cached = self.cached_reviews(restaurant_id).await;
        if !cached.is_empty() {
            return Ok(cached);
        }
        self.refresh_reviews(restaurant_id).await
    }

    /// Reviews of a restaurant in the local store; empty on any error.
    pub async fn cached_reviews(&self, restaurant_id: RestaurantId) -> Vec<Review> {
        let by_restaurant = IndexQuery::new(RESTAURANT_INDEX, restaurant_id);
        self.read_local(REVIEWS, Some(&by_restaurant)).await
    }

    /// Pull a restaurant's reviews, store them and announce the update.
    pub async fn refresh_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Review>> {
        let reviews = self.gateway.list_reviews(restaurant_id).await?;
        tracing::debug!(restaurant_id, count = reviews.len(), "Pulled reviews");

        self.store_records(REVIEWS, &reviews).await;
        self.events.publish(ReviewsUpdated { restaurant_id });

        Ok(reviews)
    }

    /// Submit a review, queueing it locally if the backend cannot take it.
    ///
    /// Only a failure to queue is returned as an error.
    pub async fn submit_review(&self, submission: ReviewSubmission) -> Result<SubmitOutcome> {
        match self.gateway.submit_review(&submission).await {
            Ok(review) => {
                self.store_records(REVIEWS, std::slice::from_ref(&review))
                    .await;
                if let Err(e) = self.refresh_reviews(review.restaurant_id).await {
                    tracing::warn!(
                        restaurant_id = review.restaurant_id,
                        "Review refresh after submit failed: {}",
                        e
                    );
                }
                Ok(SubmitOutcome::Submitted(review))
            }
            Err(e) => {
                tracing::warn!("Review submission failed, queueing for replay: {}", e);
                let pending = self.store.add_pending(&submission).await?;
                tracing::info!(pending_id = pending.id, "Review queued");
                Ok(SubmitOutcome::Queued(pending))
            }
        }
    }

    /// Queued submissions, oldest first.
    pub async fn pending_reviews(&self) -> Result<Vec<PendingReview>> {
        self.store.pending().await
    }

    /// Drain the pending queue through [`submit_review`](Self::submit_review).
    ///
    /// Entries are submitted oldest first. A failed entry goes back into the
    /// queue and the remaining entries are still attempted.
    pub async fn replay_pending(&self) -> Result<ReplayReport> {
        let pending = self.store.take_pending().await?;
        let mut report = ReplayReport {
            attempted: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            return Ok(report);
        }
        tracing::info!(count = pending.len(), "Replaying queued reviews");

        for entry in pending {
            match self.submit_review(entry.data).await {
                Ok(SubmitOutcome::Submitted(_)) => report.submitted += 1,
                Ok(SubmitOutcome::Queued(_)) => report.requeued += 1,
                Err(e) => {
                    tracing::error!(pending_id = entry.id, "Queued review lost: {}", e);
                    report.dropped += 1;
                }
            }
        }

        tracing::info!(
            submitted = report.submitted,
            requeued = report.requeued,
            dropped = report.dropped,
            "Replay finished"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------

    /// Set a restaurant's favorite flag, then re-pull restaurants.
    ///
    /// Favorites are not queued; a gateway failure is returned.
    pub async fn toggle_favorite(&self, restaurant_id: RestaurantId, is_favorite: bool) -> Result<()> {
        self.gateway
            .toggle_favorite(restaurant_id, is_favorite)
            .await?;
        tracing::info!(restaurant_id, is_favorite, "Favorite updated");

        if let Err(e) = self.refresh_restaurants().await {
            tracing::warn!("Restaurant refresh after favorite toggle failed: {}", e);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Local store helpers
    // ------------------------------------------------------------------

    async fn read_local<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: Option<&IndexQuery>,
    ) -> Vec<T> {
        let values = match self.store.get_all(collection, query).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(collection, "Local read failed: {}", e);
                return Vec::new();
            }
        };

        let decoded: std::result::Result<Vec<T>, _> =
            values.into_iter().map(serde_json::from_value).collect();
        match decoded {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(collection, "Stored records unreadable: {}", e);
                Vec::new()
            }
        }
    }

    async fn store_records<T: Serialize>(&self, collection: &str, records: &[T]) {
        if !self.store.is_available() {
            return;
        }

        let values: std::result::Result<Vec<Value>, _> =
            records.iter().map(serde_json::to_value).collect();
        let result = match values {
            Ok(values) => self.store.put_all(collection, values).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::warn!(collection, "Local write failed: {}", e);
        }
    }
}

#[async_trait]
impl DataSource for SyncEngine {
    async fn get_restaurants(&self) -> Result<Vec<Restaurant>> {
        SyncEngine::get_restaurants(self).await
    }

    async fn restaurant_by_id(&self, id: RestaurantId) -> Result<Option<Restaurant>> {
        SyncEngine::restaurant_by_id(self, id).await
    }

    async fn get_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Review>> {
        SyncEngine::get_reviews(self, restaurant_id).await
    }

    async fn cached_reviews(&self, restaurant_id: RestaurantId) -> Vec<Review> {
        SyncEngine::cached_reviews(self, restaurant_id).await
    }

    async fn submit_review(&self, submission: ReviewSubmission) -> Result<SubmitOutcome> {
        SyncEngine::submit_review(self, submission).await
    }

    async fn toggle_favorite(&self, restaurant_id: RestaurantId, is_favorite: bool) -> Result<()> {
        SyncEngine::toggle_favorite(self, restaurant_id, is_favorite).await
    }
}
