// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and within ±90° latitude, ±180° longitude
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Barter search request as sent by the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Idol members the requester owns and offers
    #[serde(default)]
    pub own: Vec<i64>,
    /// Idol members the requester wants to receive
    #[serde(default)]
    pub target: Vec<i64>,
    /// Optional title keyword
    #[serde(default)]
    pub query: Option<String>,
    /// Optional photo card type (e.g. "album", "md")
    #[serde(default)]
    pub card_type: Option<String>,
    /// Zero-based page number (default: 0)
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size (default: configured search page size)
    #[serde(default)]
    pub size: Option<u32>,
    /// Current location of the requester
    pub location: GeoPoint,
}

impl SearchRequest {
    /// Re-orient the request from the listing's perspective.
    ///
    /// What the requester wants is what a matching listing owns, and what the
    /// requester owns is what that listing is looking for.
    pub fn into_listing_perspective(mut self) -> Self {
        std::mem::swap(&mut self.own, &mut self.target);
        self
    }
}

/// Barter listing as stored in the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarterDocument {
    /// Article id, also the index primary key
    pub article_id: i64,
    pub image_url: Option<String>,
    pub title: String,
    /// Idol members offered by the listing
    #[serde(default)]
    pub own_members: Vec<i64>,
    /// Idol members the listing wants in exchange
    #[serde(default)]
    pub target_members: Vec<i64>,
    #[serde(default)]
    pub card_type: Option<String>,
    /// Whether the barter has been completed
    #[serde(default)]
    pub bartered: bool,
    /// Writer id, used to look up the writer's live location
    pub writer_id: String,
    /// Creation time (seconds since epoch)
    pub created_at: i64,
}

/// Wish list entry as stored in the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishDocument {
    pub id: String,
    pub title: String,
    /// Idol members the wish is tagged with
    #[serde(default)]
    pub idols: Vec<i64>,
    /// Owner of the wish
    pub user_id: String,
}

/// One barter search result returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub article_id: i64,
    pub image_url: Option<String>,
    pub title: String,
    pub own_members: Vec<i64>,
    pub target_members: Vec<i64>,
    pub bartered: bool,
    /// Distance between the writer and the requester in kilometers.
    /// `None` when no requester location was involved.
    pub distance: Option<f64>,
}

impl SearchResponse {
    pub fn from_document(document: BarterDocument, distance: Option<f64>) -> Self {
        Self {
            article_id: document.article_id,
            image_url: document.image_url,
            title: document.title,
            own_members: document.own_members,
            target_members: document.target_members,
            bartered: document.bartered,
            distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(37.5665, 126.978).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 126.978).is_valid());
        assert!(!GeoPoint::new(37.5, f64::NEG_INFINITY).is_valid());
        assert!(!GeoPoint::new(90.5, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -181.0).is_valid());
    }

    #[test]
    fn test_listing_perspective_swaps_own_and_target() {
        let request = SearchRequest {
            own: vec![1, 2],
            target: vec![3],
            location: GeoPoint::new(37.5, 127.0),
            ..Default::default()
        };

        let swapped = request.into_listing_perspective();

        assert_eq!(swapped.own, vec![3]);
        assert_eq!(swapped.target, vec![1, 2]);
    }

    #[test]
    fn test_search_request_deserializes_camel_case() {
        let json = r#"{
            "own": [1],
            "target": [2, 3],
            "cardType": "album",
            "location": { "latitude": 37.5665, "longitude": 126.978 }
        }"#;

        let request: SearchRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.own, vec![1]);
        assert_eq!(request.target, vec![2, 3]);
        assert_eq!(request.card_type.as_deref(), Some("album"));
        assert!(request.query.is_none());
        assert_eq!(request.location.latitude, 37.5665);
    }

    #[test]
    fn test_search_response_serializes_null_distance() {
        let document = BarterDocument {
            article_id: 7,
            image_url: None,
            title: "card".to_string(),
            own_members: vec![1],
            target_members: vec![2],
            card_type: None,
            bartered: false,
            writer_id: "w".to_string(),
            created_at: 0,
        };

        let value = serde_json::to_value(SearchResponse::from_document(document, None)).unwrap();

        assert_eq!(value["articleId"], 7);
        assert!(value["distance"].is_null());
    }
}
