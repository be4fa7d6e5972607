// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod barter_search;
pub mod count_queue;
pub mod counter_store;
pub mod criteria;
pub mod geo;
pub mod location;
pub mod logging;
pub mod memory;
pub mod query;
pub mod ranking;
pub mod scheduler;
pub mod search;
pub mod search_count_worker;
