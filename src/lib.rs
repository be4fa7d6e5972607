// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Marketplace search and idol popularity ranking.
//!
//! Barter listings and wishes are searched in Meilisearch; barter hits are
//! narrowed to writers near the requester using locations cached in Redis.
//! Searches feed a Redis queue of search-count events that a scheduled
//! worker folds into Postgres counters and daily idol rankings.

pub mod models;
pub mod services;
