//! Data records served by the backend.
//!
//! [`Restaurant`] and [`Review`] deserialize leniently from backend JSON
//! (see [`crate::coerce`]) and serialize back to the strict shape that is
//! kept in the local database. [`ReviewSubmission`] is the opposite: an
//! opaque form payload that is never validated locally.

use crate::coerce;
use crate::{RestaurantId, ReviewId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A restaurant as listed by `GET /restaurants`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    #[serde(deserialize_with = "coerce::integer")]
    pub id: RestaurantId,
    #[serde(default, deserialize_with = "coerce::text")]
    pub name: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub neighborhood: String,
    /// Photo file stem, e.g. `"3"` for `/img/3-320px.jpg`
    #[serde(
        default,
        deserialize_with = "coerce::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub photograph: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latlng: Option<LatLng>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub cuisine_type: String,
    /// Day name -> opening hours text
    #[serde(default, deserialize_with = "coerce::null_as_default")]
    pub operating_hours: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "coerce::flag")]
    pub is_favorite: bool,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "coerce::optional_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Timestamp>,
    #[serde(
        rename = "updatedAt",
        default,
        deserialize_with = "coerce::optional_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<Timestamp>,
}

impl Restaurant {
    /// Relative URL of the restaurant's detail page.
    pub fn page_url(&self) -> String {
        format!("./restaurant.html?id={}", self.id)
    }

    /// Photo stem, or `"undefined"` when the restaurant has no photo.
    pub fn photo_name(&self) -> &str {
        self.photograph.as_deref().unwrap_or("undefined")
    }

    /// Image extension for the fallback image: the placeholder is a PNG.
    pub fn photo_extension(&self) -> &'static str {
        if self.photograph.is_some() {
            "jpg"
        } else {
            "png"
        }
    }

    /// URL of the full size image.
    pub fn image_url(&self, ext: &str) -> String {
        format!("/img/{}-original.{}", self.photo_name(), ext)
    }

    /// Responsive `srcset` attribute for the restaurant image.
    pub fn srcset(&self, ext: &str) -> String {
        let name = self.photo_name();
        format!(
            "/img/{name}-320px.{ext} 320w, /img/{name}-640px.{ext} 640w, /img/{name}-640px.{ext} 2x"
        )
    }
}

/// A review as listed by `GET /reviews?restaurant_id=`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(deserialize_with = "coerce::integer")]
    pub id: ReviewId,
    #[serde(deserialize_with = "coerce::integer")]
    pub restaurant_id: RestaurantId,
    /// Reviewer name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 1 to 5
    #[serde(deserialize_with = "coerce::integer")]
    pub rating: i64,
    #[serde(default, deserialize_with = "coerce::text")]
    pub comments: String,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "coerce::optional_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Timestamp>,
    #[serde(
        rename = "updatedAt",
        default,
        deserialize_with = "coerce::optional_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<Timestamp>,
}

/// Raw review form payload, passed to the backend verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewSubmission(Map<String, Value>);

impl ReviewSubmission {
    /// Create an empty submission.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style method to set a field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Get a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The restaurant this review is for, if the form carries one.
    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.0.get("restaurant_id").and_then(coerce::parse_int)
    }

    /// Underlying fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Fields as form-encoded pairs.
    ///
    /// Strings pass through verbatim, numbers and booleans are stringified,
    /// nulls are skipped and nested values are sent as JSON text.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter_map(|(k, v)| {
                let text = match v {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    other => other.to_string(),
                };
                Some((k.clone(), text))
            })
            .collect()
    }
}

impl From<Map<String, Value>> for ReviewSubmission {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A submission that failed to reach the backend, kept for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReview {
    /// Epoch milliseconds at which it was queued, bumped to stay unique
    pub id: i64,
    pub data: ReviewSubmission,
}

/// What the maps widget needs to place a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub position: LatLng,
    pub title: String,
    pub url: String,
}

impl MapMarker {
    /// Marker for a restaurant, if it has a location.
    pub fn for_restaurant(restaurant: &Restaurant) -> Option<Self> {
        restaurant.latlng.map(|position| Self {
            position,
            title: restaurant.name.clone(),
            url: restaurant.page_url(),
        })
    }
}
