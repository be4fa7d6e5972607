// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Live writer locations, kept in Redis by the GPS tracking service.

use crate::models::search::GeoPoint;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

/// Result of a location lookup that reached the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedLocation {
    Found(GeoPoint),
    /// Nothing is cached for the member
    Missing,
    /// Something is cached but it is not a usable coordinate pair
    Malformed(String),
}

impl CachedLocation {
    /// Classify a point, rejecting non-finite or out-of-range coordinates
    pub fn from_point(point: GeoPoint) -> Self {
        if point.is_valid() {
            CachedLocation::Found(point)
        } else {
            CachedLocation::Malformed(format!(
                "coordinates out of range: {}, {}",
                point.latitude, point.longitude
            ))
        }
    }
}

/// Lookup of a member's last known location.
///
/// `Err` is reserved for failures to reach the cache.
#[async_trait]
pub trait LocationCache: Send + Sync {
    async fn location_of(&self, member_id: &str) -> Result<CachedLocation>;
}

/// Redis-backed location cache.
///
/// Each member is a hash at `{prefix}{member_id}` with `latitude` and
/// `longitude` fields.
#[derive(Clone)]
pub struct RedisLocationCache {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisLocationCache {
    pub fn new(connection: ConnectionManager, key_prefix: String) -> Self {
        Self {
            connection,
            key_prefix,
        }
    }

    fn key(&self, member_id: &str) -> String {
        format!("{}{}", self.key_prefix, member_id)
    }
}

#[async_trait]
impl LocationCache for RedisLocationCache {
    async fn location_of(&self, member_id: &str) -> Result<CachedLocation> {
        let mut connection = self.connection.clone();
        let fields: HashMap<String, String> = connection
            .hgetall(self.key(member_id))
            .await
            .with_context(|| format!("Failed to read location of {}", member_id))?;

        Ok(parse_location(&fields))
    }
}

/// An empty hash is a miss
fn parse_location(fields: &HashMap<String, String>) -> CachedLocation {
    if fields.is_empty() {
        return CachedLocation::Missing;
    }

    let coordinate = |name: &str| -> Result<f64, String> {
        let raw = fields
            .get(name)
            .ok_or_else(|| format!("missing {}", name))?;
        raw.trim()
            .parse::<f64>()
            .map_err(|e| format!("{} {:?} is not a number: {}", name, raw, e))
    };

    match (coordinate("latitude"), coordinate("longitude")) {
        (Ok(latitude), Ok(longitude)) => {
            CachedLocation::from_point(GeoPoint::new(latitude, longitude))
        }
        (Err(reason), _) | (_, Err(reason)) => CachedLocation::Malformed(reason),
    }
}
