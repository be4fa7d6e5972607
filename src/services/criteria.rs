// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Normalisation of a barter search request into engine-agnostic criteria.

use crate::models::search::{GeoPoint, SearchRequest};
use std::collections::BTreeSet;

/// Normalised barter search predicates.
///
/// Empty sets and `None` fields mean "no filtering on that dimension".
#[derive(Debug, Clone, PartialEq)]
pub struct BarterSearchCriteria {
    own: BTreeSet<i64>,
    target: BTreeSet<i64>,
    keyword: Option<String>,
    card_type: Option<String>,
    page: Option<u32>,
    size: Option<u32>,
    location: GeoPoint,
}

impl BarterSearchCriteria {
    /// Idol members a matching listing must offer (any of)
    pub fn own(&self) -> &BTreeSet<i64> {
        &self.own
    }

    /// Idol members a matching listing must be looking for (any of)
    pub fn target(&self) -> &BTreeSet<i64> {
        &self.target
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    pub fn card_type(&self) -> Option<&str> {
        self.card_type.as_deref()
    }

    pub fn page(&self) -> Option<u32> {
        self.page
    }

    pub fn size(&self) -> Option<u32> {
        self.size
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }
}

/// Build criteria from a request that is already oriented from the listing's
/// perspective (see [`SearchRequest::into_listing_perspective`]).
///
/// Duplicate ids collapse, blank keywords are dropped and a zero page size is
/// treated as absent.
pub fn build_criteria(request: &SearchRequest) -> BarterSearchCriteria {
    BarterSearchCriteria {
        own: request.own.iter().copied().collect(),
        target: request.target.iter().copied().collect(),
        keyword: non_blank(request.query.as_deref()),
        card_type: non_blank(request.card_type.as_deref()),
        page: request.page,
        size: request.size.filter(|size| *size > 0),
        location: request.location,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
