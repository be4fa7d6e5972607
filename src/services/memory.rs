// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! In-memory collaborators for tests and local runs without infrastructure.

use crate::models::rank::{IdolMemberCounter, IdolRank, SearchCountMessage, StoredIdolRank};
use crate::models::search::{BarterDocument, GeoPoint, WishDocument};
use crate::services::count_queue::CountQueue;
use crate::services::counter_store::CounterStore;
use crate::services::location::{CachedLocation, LocationCache};
use crate::services::query::{BarterQuery, PageRequest, SortOrder, WishQuery};
use crate::services::ranking::rank_members;
use crate::services::search::SearchIndex;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Search index over fixed document lists.
///
/// Honours sort order and paging; filter clauses are only recorded, so tests
/// load exactly the documents the query is expected to match.
#[derive(Default)]
pub struct InMemorySearchIndex {
    pub barters: Mutex<Vec<BarterDocument>>,
    pub wishes: Mutex<Vec<WishDocument>>,
    pub barter_queries: Mutex<Vec<BarterQuery>>,
    pub wish_queries: Mutex<Vec<WishQuery>>,
}

impl InMemorySearchIndex {
    pub fn with_barters(barters: Vec<BarterDocument>) -> Self {
        Self {
            barters: Mutex::new(barters),
            ..Default::default()
        }
    }

    pub fn with_wishes(wishes: Vec<WishDocument>) -> Self {
        Self {
            wishes: Mutex::new(wishes),
            ..Default::default()
        }
    }
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip(page.offset())
        .take(page.size)
        .cloned()
        .collect()
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn search_barters(&self, query: &BarterQuery) -> Result<Vec<BarterDocument>> {
        self.barter_queries.lock().unwrap().push(query.clone());

        let mut barters = self.barters.lock().unwrap().clone();
        if query.page.sort == SortOrder::CreatedAtDesc {
            barters.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(page_of(&barters, query.page))
    }

    async fn search_wishes(&self, query: &WishQuery) -> Result<Vec<WishDocument>> {
        self.wish_queries.lock().unwrap().push(query.clone());

        let wishes = self.wishes.lock().unwrap().clone();
        Ok(page_of(&wishes, query.page))
    }
}

/// Location cache over a map; points are returned as stored, unvalidated
#[derive(Default)]
pub struct InMemoryLocationCache {
    pub locations: Mutex<HashMap<String, CachedLocation>>,
}

impl InMemoryLocationCache {
    pub fn insert(&self, member_id: &str, location: GeoPoint) {
        self.insert_entry(member_id, CachedLocation::Found(location));
    }

    pub fn insert_entry(&self, member_id: &str, entry: CachedLocation) {
        self.locations
            .lock()
            .unwrap()
            .insert(member_id.to_string(), entry);
    }
}

#[async_trait]
impl LocationCache for InMemoryLocationCache {
    async fn location_of(&self, member_id: &str) -> Result<CachedLocation> {
        Ok(self
            .locations
            .lock()
            .unwrap()
            .get(member_id)
            .cloned()
            .unwrap_or(CachedLocation::Missing))
    }
}

/// FIFO queue with an in-flight list and drain lock, mirroring the Redis queue
#[derive(Default)]
pub struct InMemoryCountQueue {
    pub messages: Mutex<VecDeque<Vec<u8>>>,
    pub in_flight: Mutex<Vec<Vec<u8>>>,
    /// Holder token and expiry
    pub drain_lock: Mutex<Option<(String, Instant)>>,
}

impl InMemoryCountQueue {
    pub fn push_raw(&self, payload: impl Into<Vec<u8>>) {
        self.messages.lock().unwrap().push_back(payload.into());
    }

    pub fn push_member(&self, member_id: i64) {
        self.push_raw(format!(r#"{{"memberId":{}}}"#, member_id));
    }

    /// Messages waiting, excluding in-flight ones
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

#[async_trait]
impl CountQueue for InMemoryCountQueue {
    async fn publish(&self, message: &SearchCountMessage) -> Result<()> {
        self.push_raw(serde_json::to_vec(message)?);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Vec<u8>>> {
        let message = self.messages.lock().unwrap().pop_front();
        if let Some(payload) = &message {
            self.in_flight.lock().unwrap().push(payload.clone());
        }
        Ok(message)
    }

    async fn ack(&self) -> Result<()> {
        self.in_flight.lock().unwrap().clear();
        Ok(())
    }

    async fn requeue_unacked(&self) -> Result<usize> {
        let in_flight: Vec<Vec<u8>> = self.in_flight.lock().unwrap().drain(..).collect();
        let mut messages = self.messages.lock().unwrap();
        for payload in in_flight.iter().rev() {
            messages.push_front(payload.clone());
        }
        Ok(in_flight.len())
    }

    async fn try_lock_drain(&self, token: &str, ttl: Duration) -> Result<bool> {
        let mut lock = self.drain_lock.lock().unwrap();
        let now = Instant::now();
        if lock.as_ref().is_some_and(|(_, expires)| *expires > now) {
            return Ok(false);
        }
        *lock = Some((token.to_string(), now + ttl));
        Ok(true)
    }

    async fn unlock_drain(&self, token: &str) -> Result<()> {
        let mut lock = self.drain_lock.lock().unwrap();
        if lock.as_ref().is_some_and(|(holder, _)| holder == token) {
            *lock = None;
        }
        Ok(())
    }
}

/// Counter store over a member map; every operation is all-or-nothing
#[derive(Default)]
pub struct InMemoryCounterStore {
    pub members: Mutex<BTreeMap<i64, IdolMemberCounter>>,
    pub ranks: Mutex<Vec<StoredIdolRank>>,
    /// Number of upcoming operations that fail before touching any state
    pub failures_to_inject: Mutex<u32>,
}

impl InMemoryCounterStore {
    pub fn with_members(members: Vec<IdolMemberCounter>) -> Self {
        Self {
            members: Mutex::new(members.into_iter().map(|m| (m.id, m)).collect()),
            ..Default::default()
        }
    }

    pub fn member(&self, id: i64) -> Option<IdolMemberCounter> {
        self.members.lock().unwrap().get(&id).cloned()
    }

    pub fn fail_next(&self, count: u32) {
        *self.failures_to_inject.lock().unwrap() = count;
    }

    fn injected_failure(&self) -> Result<()> {
        let mut failures = self.failures_to_inject.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(anyhow!("injected counter store failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn add_search_counts(&self, tallies: &BTreeMap<i64, i64>) -> Result<Vec<i64>> {
        self.injected_failure()?;

        let mut members = self.members.lock().unwrap();
        let mut unknown = Vec::new();
        for (member_id, count) in tallies {
            match members.get_mut(member_id) {
                Some(member) => member.search_count_temp += count,
                None => unknown.push(*member_id),
            }
        }
        Ok(unknown)
    }

    async fn commit_daily_rollup(&self) -> Result<IdolRank> {
        self.injected_failure()?;

        let mut members = self.members.lock().unwrap();
        // Work on a copy so a failed ranking leaves the counters untouched
        let mut rolled: Vec<IdolMemberCounter> = members.values().cloned().collect();
        rolled.iter_mut().for_each(IdolMemberCounter::roll_over);

        let rank = rank_members(&rolled)?;

        for member in rolled {
            members.insert(member.id, member);
        }
        let mut ranks = self.ranks.lock().unwrap();
        let id = ranks.len() as i64 + 1;
        ranks.push(StoredIdolRank {
            id,
            rank: rank.clone(),
            created_at: Utc::now(),
        });

        Ok(rank)
    }

    async fn latest_rank(&self) -> Result<Option<StoredIdolRank>> {
        Ok(self.ranks.lock().unwrap().last().cloned())
    }
}
