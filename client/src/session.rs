//! Per-page context: the active restaurant, its reviews and a map handle.

use crate::error::Result;
use crate::events::ReviewsUpdated;
use crate::sync::{DataSource, SubmitOutcome};
use tablesync_engine::{MapMarker, Restaurant, RestaurantId, Review, ReviewSubmission};

/// Context for a restaurant page.
///
/// `M` is whatever handle the maps widget hands back; the session only
/// stores it.
pub struct Session<D, M> {
    data: D,
    restaurant: Option<Restaurant>,
    reviews: Vec<Review>,
    map: Option<M>,
}

impl<D: DataSource, M> Session<D, M> {
    pub fn new(data: D) -> Self {
        Self {
            data,
            restaurant: None,
            reviews: Vec::new(),
            map: None,
        }
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn restaurant(&self) -> Option<&Restaurant> {
        self.restaurant.as_ref()
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn attach_map(&mut self, map: M) {
        self.map = Some(map);
    }

    pub fn map(&self) -> Option<&M> {
        self.map.as_ref()
    }

    /// Marker for the active restaurant.
    pub fn marker(&self) -> Option<MapMarker> {
        self.restaurant.as_ref().and_then(MapMarker::for_restaurant)
    }

    /// Make a restaurant active and load its reviews.
    ///
    /// The previous restaurant is dropped before anything is fetched. If the
    /// reviews fail to load, the new restaurant stays active with no reviews.
    /// Returns `None` and leaves the session empty if the restaurant does
    /// not exist.
    pub async fn open_restaurant(&mut self, id: RestaurantId) -> Result<Option<&Restaurant>> {
        self.restaurant = None;
        self.reviews.clear();

        let Some(restaurant) = self.data.restaurant_by_id(id).await? else {
            return Ok(None);
        };
        self.restaurant = Some(restaurant);

        self.reviews = self.data.get_reviews(id).await?;
        Ok(self.restaurant.as_ref())
    }

    /// Reload reviews if the event is about the active restaurant.
    ///
    /// Returns whether the review list was replaced.
    pub async fn on_reviews_updated(&mut self, event: ReviewsUpdated) -> bool {
        let Some(active) = &self.restaurant else {
            return false;
        };
        if active.id != event.restaurant_id {
            return false;
        }

        let reviews = self.data.cached_reviews(event.restaurant_id).await;
        if reviews.is_empty() {
            return false;
        }
        self.reviews = reviews;
        true
    }

    /// Submit a review for the active restaurant.
    ///
    /// Fills in `restaurant_id` when the form did not carry one.
    pub async fn submit_review(&mut self, submission: ReviewSubmission) -> Result<SubmitOutcome> {
        let submission = match (&self.restaurant, submission.restaurant_id()) {
            (Some(active), None) => submission.with("restaurant_id", active.id),
            _ => submission,
        };
        self.data.submit_review(submission).await
    }

    /// Flip the active restaurant's favorite flag.
    ///
    /// Returns the new flag, or `None` without an active restaurant.
    pub async fn toggle_favorite(&mut self) -> Result<Option<bool>> {
        let Some(active) = &self.restaurant else {
            return Ok(None);
        };
        let id = active.id;
        let value = !active.is_favorite;

        self.data.toggle_favorite(id, value).await?;
        if let Some(restaurant) = self.restaurant.as_mut() {
            restaurant.is_favorite = value;
        }
        Ok(Some(value))
    }
}
