//! Remote Gateway: the REST backend.
//!
//! Endpoints:
//! - `GET  /restaurants`
//! - `GET  /reviews?restaurant_id=<id>`
//! - `POST /reviews/` (form encoded)
//! - `PUT  /restaurants/<id>/?is_favorite=<bool>`

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tablesync_engine::{Restaurant, RestaurantId, Review, ReviewSubmission};

/// Access to the backend. Implemented over HTTP, and by fakes in tests.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Every restaurant.
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>>;

    /// Every review of one restaurant.
    async fn list_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Review>>;

    /// Create a review, returning it as stored by the backend.
    async fn submit_review(&self, submission: &ReviewSubmission) -> Result<Review>;

    /// Set a restaurant's favorite flag.
    async fn toggle_favorite(&self, restaurant_id: RestaurantId, is_favorite: bool) -> Result<()>;
}

/// Gateway over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for a path under the base URL.
    ///
    /// The base may carry a path prefix; `path` is appended to it.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|e| SyncError::Parse(format!("{raw}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        decode(check_status(response)?).await
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SyncError::Status {
            status,
            url: response.url().to_string(),
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>> {
        let restaurants: Vec<Restaurant> = self.get_json(self.endpoint("restaurants")?).await?;
        tracing::debug!(count = restaurants.len(), "Fetched restaurants");
        Ok(restaurants)
    }

    async fn list_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Review>> {
        let mut url = self.endpoint("reviews")?;
        url.query_pairs_mut()
            .append_pair("restaurant_id", &restaurant_id.to_string());

        let reviews: Vec<Review> = self.get_json(url).await?;
        tracing::debug!(restaurant_id, count = reviews.len(), "Fetched reviews");
        Ok(reviews)
    }

    async fn submit_review(&self, submission: &ReviewSubmission) -> Result<Review> {
        let url = self.endpoint("reviews/")?;
        tracing::debug!(%url, "POST review");

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .form(&submission.form_pairs())
            .send()
            .await?;
        let review: Review = decode(check_status(response)?).await?;

        tracing::info!(
            review_id = review.id,
            restaurant_id = review.restaurant_id,
            "Review submitted"
        );
        Ok(review)
    }

    async fn toggle_favorite(&self, restaurant_id: RestaurantId, is_favorite: bool) -> Result<()> {
        let mut url = self.endpoint(&format!("restaurants/{restaurant_id}/"))?;
        url.query_pairs_mut()
            .append_pair("is_favorite", if is_favorite { "true" } else { "false" });
        tracing::debug!(%url, "PUT favorite");

        let response = self
            .client
            .put(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        // Only a transport failure counts; the body is ignored
        if !response.status().is_success() {
            tracing::warn!(
                restaurant_id,
                status = %response.status(),
                "Favorite toggle answered with non-success status"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(base: &str) -> HttpGateway {
        HttpGateway::new(Url::parse(base).unwrap())
    }

    #[test]
    fn endpoint_joins_base_and_path() {
        let gw = gateway("http://localhost:1337");
        assert_eq!(
            gw.endpoint("restaurants").unwrap().as_str(),
            "http://localhost:1337/restaurants"
        );
        assert_eq!(
            gw.endpoint("reviews/").unwrap().as_str(),
            "http://localhost:1337/reviews/"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let gw = gateway("http://example.test/api/");
        assert_eq!(
            gw.endpoint("/restaurants/3/").unwrap().as_str(),
            "http://example.test/api/restaurants/3/"
        );
    }
}
