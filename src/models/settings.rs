// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use std::env;
use std::time::Duration;

/// What to do with a hit whose writer has no cached location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationPolicy {
    /// Drop the hit and keep going
    Skip,
    /// Fail the whole search
    Strict,
}

impl LocationPolicy {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "skip" => Ok(LocationPolicy::Skip),
            "strict" => Ok(LocationPolicy::Strict),
            _ => Err(anyhow!(
                "LOCATION_POLICY must be 'skip' or 'strict', got: {}",
                value
            )),
        }
    }
}

/// Search pipeline settings
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Hits farther than this from the requester are dropped
    pub radius_km: f64,
    /// Page size used when the request does not carry one
    pub page_size: usize,
    /// Page size of the unfiltered newest-first listing.
    /// Meilisearch caps a single query at `maxTotalHits` (1000 by default).
    pub list_all_limit: usize,
    pub location_policy: LocationPolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            radius_km: 2.0,
            page_size: 20,
            list_all_limit: 1000,
            location_policy: LocationPolicy::Skip,
        }
    }
}

/// Search-count worker settings
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Maximum number of valid messages tallied per drain
    pub drain_batch_size: usize,
    pub drain_every_hours: u32,
    /// Time of day (UTC) of the daily rollup
    pub rollup_at: NaiveTime,
    pub rollup_max_attempts: u32,
    pub rollup_retry_delay: Duration,
    /// Upper bound on how long one drain holds the drain lock
    pub drain_lock_ttl: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            drain_batch_size: 500,
            drain_every_hours: 6,
            rollup_at: NaiveTime::MIN,
            rollup_max_attempts: 3,
            rollup_retry_delay: Duration::from_secs(5),
            drain_lock_ttl: Duration::from_secs(600),
        }
    }
}

/// Full process configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub meilisearch_host: String,
    pub meilisearch_api_key: Option<String>,
    pub barter_index: String,
    pub wish_index: String,
    /// Only the counter worker and migrations need Postgres
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub search_count_queue: String,
    pub gps_key_prefix: String,
    pub search: SearchSettings,
    pub worker: WorkerSettings,
}

impl Settings {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let search = SearchSettings {
            radius_km: parse_var("SEARCH_RADIUS_KM", "2.0")?,
            page_size: parse_var("SEARCH_PAGE_SIZE", "20")?,
            list_all_limit: parse_var("LIST_ALL_LIMIT", "1000")?,
            location_policy: LocationPolicy::parse(
                &env::var("LOCATION_POLICY").unwrap_or_else(|_| "skip".to_string()),
            )?,
        };

        let rollup_at = env::var("ROLLUP_AT").unwrap_or_else(|_| "00:00".to_string());
        let worker = WorkerSettings {
            drain_batch_size: parse_var("DRAIN_BATCH_SIZE", "500")?,
            drain_every_hours: parse_var("DRAIN_EVERY_HOURS", "6")?,
            rollup_at: NaiveTime::parse_from_str(&rollup_at, "%H:%M")
                .context("ROLLUP_AT must be formatted as HH:MM")?,
            rollup_max_attempts: parse_var("ROLLUP_MAX_ATTEMPTS", "3")?,
            rollup_retry_delay: Duration::from_secs(parse_var("ROLLUP_RETRY_DELAY_SECS", "5")?),
            drain_lock_ttl: Duration::from_secs(parse_var("DRAIN_LOCK_TTL_SECS", "600")?),
        };

        if worker.drain_every_hours == 0 || 24 % worker.drain_every_hours != 0 {
            return Err(anyhow!(
                "DRAIN_EVERY_HOURS must divide 24, got: {}",
                worker.drain_every_hours
            ));
        }

        Ok(Self {
            meilisearch_host: env::var("MEILISEARCH_HOST").context("MEILISEARCH_HOST must be set")?,
            meilisearch_api_key: env::var("MEILISEARCH_API_KEY").ok(),
            barter_index: env::var("BARTER_INDEX").unwrap_or_else(|_| "barter".to_string()),
            wish_index: env::var("WISH_INDEX").unwrap_or_else(|_| "wish".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "5")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            search_count_queue: env::var("SEARCH_COUNT_QUEUE")
                .unwrap_or_else(|_| "rank.queue".to_string()),
            gps_key_prefix: env::var("GPS_KEY_PREFIX").unwrap_or_else(|_| "gps:".to_string()),
            search,
            worker,
        })
    }

    pub fn database_url(&self) -> Result<&str> {
        required(self.database_url.as_deref(), "DATABASE_URL")
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("{} must be set", name))
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a valid number", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_policy_parse() {
        assert_eq!(LocationPolicy::parse("skip").unwrap(), LocationPolicy::Skip);
        assert_eq!(
            LocationPolicy::parse("strict").unwrap(),
            LocationPolicy::Strict
        );
        assert!(LocationPolicy::parse("lenient").is_err());
    }

    #[test]
    fn test_worker_defaults() {
        let worker = WorkerSettings::default();
        assert_eq!(worker.drain_batch_size, 500);
        assert_eq!(worker.drain_every_hours, 6);
        assert_eq!(worker.rollup_at, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(worker.rollup_max_attempts, 3);
        assert_eq!(worker.rollup_retry_delay, Duration::from_secs(5));
        assert_eq!(worker.drain_lock_ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_search_defaults() {
        let search = SearchSettings::default();
        assert_eq!(search.radius_km, 2.0);
        assert_eq!(search.location_policy, LocationPolicy::Skip);
    }

    #[test]
    fn test_required_value() {
        assert_eq!(
            required(Some("postgres://localhost/phoca"), "DATABASE_URL").unwrap(),
            "postgres://localhost/phoca"
        );
        let error = required(None, "DATABASE_URL").unwrap_err();
        assert_eq!(error.to_string(), "DATABASE_URL must be set");
        assert!(required(Some("  "), "DATABASE_URL").is_err());
    }

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let value: usize = parse_var("PHOCA_TEST_SURELY_UNSET_VARIABLE", "42").unwrap();
        assert_eq!(value, 42);
    }
}
