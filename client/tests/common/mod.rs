//! Shared fakes for client integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tablesync_client::{LocalStore, MemoryBackend, RemoteGateway, Result, SyncEngine, SyncError};
use tablesync_engine::{Restaurant, RestaurantId, Review, ReviewSubmission};

/// Restaurant record as the backend would send it.
pub fn restaurant_json(id: i64, name: &str, cuisine: &str, neighborhood: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "neighborhood": neighborhood,
        "cuisine_type": cuisine,
        "address": format!("{id} Main St"),
        "photograph": id.to_string(),
        "latlng": {"lat": 40.7, "lng": -73.9},
        "operating_hours": {"Monday": "5:30 pm - 11:00 pm"},
        "is_favorite": "false"
    })
}

pub fn restaurant(id: i64, name: &str, cuisine: &str, neighborhood: &str) -> Restaurant {
    serde_json::from_value(restaurant_json(id, name, cuisine, neighborhood)).unwrap()
}

pub fn review(id: i64, restaurant_id: i64, rating: i64) -> Review {
    serde_json::from_value(json!({
        "id": id,
        "restaurant_id": restaurant_id,
        "name": "Steve",
        "rating": rating,
        "comments": "Solid"
    }))
    .unwrap()
}

pub fn submission(restaurant_id: i64, comments: &str) -> ReviewSubmission {
    ReviewSubmission::new()
        .with("restaurant_id", restaurant_id.to_string())
        .with("name", "Ada")
        .with("rating", "4")
        .with("comments", comments)
}

fn unavailable() -> SyncError {
    SyncError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        url: "fake://backend".into(),
    }
}

/// Port on localhost that nothing listens on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// A real transport error from reqwest.
async fn connection_refused() -> SyncError {
    reqwest::get(format!("http://127.0.0.1:{}/reviews/", closed_port()))
        .await
        .unwrap_err()
        .into()
}

/// How the fake answers one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Accept,
    /// Non-2xx status
    Reject,
    /// 2xx whose body is not a review
    Garbled,
    /// Connection refused
    Unreachable,
    /// Wait until [`FakeGateway::hold_submissions`] is released, then accept
    Hold,
}

/// Scripted in-process backend.
#[derive(Default)]
pub struct FakeGateway {
    restaurants: Mutex<Vec<Restaurant>>,
    reviews: Mutex<HashMap<RestaurantId, Vec<Review>>>,
    offline: AtomicBool,
    submit_script: Mutex<VecDeque<Scripted>>,
    gate: tokio::sync::Mutex<()>,
    pub held: tokio::sync::Notify,
    accepted: Mutex<Vec<ReviewSubmission>>,
    favorites: Mutex<Vec<(RestaurantId, bool)>>,
    next_review_id: AtomicI64,
    pub restaurant_calls: AtomicUsize,
    pub review_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            next_review_id: AtomicI64::new(1000),
            ..Default::default()
        }
    }

    pub fn with_restaurants(self, restaurants: Vec<Restaurant>) -> Self {
        *self.restaurants.lock().unwrap() = restaurants;
        self
    }

    pub fn with_reviews(self, restaurant_id: RestaurantId, reviews: Vec<Review>) -> Self {
        self.reviews.lock().unwrap().insert(restaurant_id, reviews);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Outcome of upcoming submissions: `true` accepts, `false` fails.
    /// Once the script runs out, submissions follow the offline flag.
    pub fn script_submissions(&self, outcomes: &[bool]) {
        let outcomes = outcomes
            .iter()
            .map(|&ok| if ok { Scripted::Accept } else { Scripted::Reject });
        self.submit_script.lock().unwrap().extend(outcomes);
    }

    /// Outcome of upcoming submissions, in order.
    pub fn script(&self, outcomes: &[Scripted]) {
        self.submit_script.lock().unwrap().extend(outcomes);
    }

    /// While the guard lives, `Scripted::Hold` submissions wait.
    pub async fn hold_submissions(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    pub fn accepted(&self) -> Vec<ReviewSubmission> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn favorites(&self) -> Vec<(RestaurantId, bool)> {
        self.favorites.lock().unwrap().clone()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>> {
        self.restaurant_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_offline() {
            return Err(unavailable());
        }
        Ok(self.restaurants.lock().unwrap().clone())
    }

    async fn list_reviews(&self, restaurant_id: RestaurantId) -> Result<Vec<Review>> {
        self.review_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_offline() {
            return Err(unavailable());
        }
        Ok(self
            .reviews
            .lock()
            .unwrap()
            .get(&restaurant_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_review(&self, submission: &ReviewSubmission) -> Result<Review> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.submit_script.lock().unwrap().pop_front();
        let outcome = scripted.unwrap_or(if self.is_offline() {
            Scripted::Reject
        } else {
            Scripted::Accept
        });

        match outcome {
            Scripted::Accept => {}
            Scripted::Reject => return Err(unavailable()),
            Scripted::Garbled => {
                return Err(serde_json::from_str::<Review>("<html>Bad Gateway</html>")
                    .unwrap_err()
                    .into())
            }
            Scripted::Unreachable => return Err(connection_refused().await),
            Scripted::Hold => {
                self.held.notify_one();
                drop(self.gate.lock().await);
            }
        }

        let mut fields = submission.fields().clone();
        fields.insert(
            "id".into(),
            self.next_review_id.fetch_add(1, Ordering::SeqCst).into(),
        );
        let review: Review = serde_json::from_value(Value::Object(fields))?;

        self.reviews
            .lock()
            .unwrap()
            .entry(review.restaurant_id)
            .or_default()
            .push(review.clone());
        self.accepted.lock().unwrap().push(submission.clone());
        Ok(review)
    }

    async fn toggle_favorite(&self, restaurant_id: RestaurantId, is_favorite: bool) -> Result<()> {
        if self.is_offline() {
            return Err(unavailable());
        }
        self.favorites
            .lock()
            .unwrap()
            .push((restaurant_id, is_favorite));
        for restaurant in self.restaurants.lock().unwrap().iter_mut() {
            if restaurant.id == restaurant_id {
                restaurant.is_favorite = is_favorite;
            }
        }
        Ok(())
    }
}

/// Engine over an in-memory store and the given fake.
pub async fn engine_with(gateway: Arc<FakeGateway>) -> (SyncEngine, MemoryBackend) {
    let backend = MemoryBackend::new();
    let store = LocalStore::open(backend.clone()).await;
    (SyncEngine::new(store, gateway), backend)
}

/// Serve a router on an ephemeral local port.
pub async fn serve(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}
