//! Derived restaurant queries.
//!
//! These run over an already resolved restaurant list. Filters compare by
//! equality and the sentinel `"all"` disables a filter.

use crate::Restaurant;
use std::collections::HashSet;

/// Sentinel filter value that matches everything.
pub const ALL: &str = "all";

/// A category filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// No filtering
    All,
    /// Keep only exact matches
    Only(String),
}

impl Filter {
    /// Parse a filter value; `"all"` disables the filter.
    pub fn parse(value: &str) -> Self {
        if value == ALL {
            Filter::All
        } else {
            Filter::Only(value.to_string())
        }
    }

    /// Check whether a category value passes this filter.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(expected) => expected == value,
        }
    }
}

impl From<&str> for Filter {
    fn from(value: &str) -> Self {
        Filter::parse(value)
    }
}

/// Restaurants matching both a cuisine and a neighborhood filter.
pub fn by_cuisine_and_neighborhood(
    restaurants: &[Restaurant],
    cuisine: &Filter,
    neighborhood: &Filter,
) -> Vec<Restaurant> {
    restaurants
        .iter()
        .filter(|r| cuisine.matches(&r.cuisine_type) && neighborhood.matches(&r.neighborhood))
        .cloned()
        .collect()
}

/// Distinct neighborhoods in first-seen order.
pub fn neighborhoods(restaurants: &[Restaurant]) -> Vec<String> {
    unique(restaurants.iter().map(|r| r.neighborhood.as_str()))
}

/// Distinct cuisines in first-seen order.
pub fn cuisines(restaurants: &[Restaurant]) -> Vec<String> {
    unique(restaurants.iter().map(|r| r.cuisine_type.as_str()))
}

fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn restaurant(id: i64, cuisine: &str, neighborhood: &str) -> Restaurant {
        serde_json::from_value(json!({
            "id": id,
            "name": format!("R{}", id),
            "cuisine_type": cuisine,
            "neighborhood": neighborhood,
        }))
        .unwrap()
    }

    fn sample() -> Vec<Restaurant> {
        vec![
            restaurant(1, "Asian", "Manhattan"),
            restaurant(2, "Pizza", "Brooklyn"),
            restaurant(3, "Asian", "Downtown"),
            restaurant(4, "Mexican", "Downtown"),
            restaurant(5, "Pizza", "Manhattan"),
        ]
    }

    fn ids(restaurants: &[Restaurant]) -> Vec<i64> {
        restaurants.iter().map(|r| r.id).collect()
    }

    #[test]
    fn parse_filter() {
        assert_eq!(Filter::parse("all"), Filter::All);
        assert_eq!(Filter::parse("Asian"), Filter::Only("Asian".into()));
        // Only the exact sentinel disables filtering.
        assert_eq!(Filter::parse("All"), Filter::Only("All".into()));
    }

    #[test]
    fn all_all_returns_everything() {
        let result = by_cuisine_and_neighborhood(&sample(), &Filter::All, &Filter::All);
        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn neighborhood_only() {
        let result =
            by_cuisine_and_neighborhood(&sample(), &"all".into(), &"Downtown".into());
        assert_eq!(ids(&result), vec![3, 4]);
    }

    #[test]
    fn cuisine_only() {
        let result = by_cuisine_and_neighborhood(&sample(), &"Pizza".into(), &"all".into());
        assert_eq!(ids(&result), vec![2, 5]);
    }

    #[test]
    fn both_filters() {
        let result =
            by_cuisine_and_neighborhood(&sample(), &"Asian".into(), &"Downtown".into());
        assert_eq!(ids(&result), vec![3]);

        let none = by_cuisine_and_neighborhood(&sample(), &"Thai".into(), &"Downtown".into());
        assert!(none.is_empty());
    }

    #[test]
    fn distinct_categories_keep_first_seen_order() {
        assert_eq!(
            neighborhoods(&sample()),
            vec!["Manhattan", "Brooklyn", "Downtown"]
        );
        assert_eq!(cuisines(&sample()), vec!["Asian", "Pizza", "Mexican"]);
        assert!(cuisines(&[]).is_empty());
    }
}
