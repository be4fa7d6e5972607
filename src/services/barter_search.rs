// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Barter and wish list search pipeline.
//!
//! request -> listing perspective -> criteria -> query -> index -> distance
//! post-filter -> response. The distance filter runs after the index query
//! because writer locations live in the location cache, not in the index.

use crate::models::rank::SearchCountMessage;
use crate::models::search::{BarterDocument, GeoPoint, SearchRequest, SearchResponse};
use crate::models::settings::{LocationPolicy, SearchSettings};
use crate::services::count_queue::CountQueue;
use crate::services::criteria::build_criteria;
use crate::services::geo::distance_km;
use crate::services::location::{CachedLocation, LocationCache};
use crate::services::query::{BarterQuery, QueryBuilder, WishQueryBuilder};
use crate::services::search::SearchIndex;
use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("no cached location for writer {writer_id} of article {article_id}")]
    WriterLocationMissing { writer_id: String, article_id: i64 },
    #[error("unusable cached location for writer {writer_id} of article {article_id}: {reason}")]
    WriterLocationMalformed {
        writer_id: String,
        article_id: i64,
        reason: String,
    },
}

pub struct BarterSearchService {
    index: Arc<dyn SearchIndex>,
    locations: Arc<dyn LocationCache>,
    search_counts: Option<Arc<dyn CountQueue>>,
    settings: SearchSettings,
}

impl BarterSearchService {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        locations: Arc<dyn LocationCache>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            index,
            locations,
            search_counts: None,
            settings,
        }
    }

    /// Publish a search-count event for every member a requester looks for
    pub fn with_search_counts(mut self, queue: Arc<dyn CountQueue>) -> Self {
        self.search_counts = Some(queue);
        self
    }

    /// Newest-first listing without distance filtering.
    ///
    /// Returns at most `list_all_limit` listings; the index is never asked for
    /// more than that.
    pub async fn search_all(&self) -> Result<Vec<SearchResponse>> {
        let query = BarterQuery::list_all(self.settings.list_all_limit);
        let documents = self.index.search_barters(&query).await?;

        Ok(documents
            .into_iter()
            .map(|document| SearchResponse::from_document(document, None))
            .collect())
    }

    /// Listings matching the request whose writer is within the search radius
    /// of the requester, in index order.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResponse>> {
        self.publish_search_counts(&request.target).await;

        let request = request.into_listing_perspective();
        let criteria = build_criteria(&request);

        let mut builder = QueryBuilder::new(self.settings.page_size);
        builder.create_query(&criteria);
        let documents = self.index.search_barters(builder.search()?).await?;

        info!(
            hits = documents.len(),
            page = builder.page_request()?.page,
            "barter search executed"
        );

        let searcher = criteria.location();
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let Some(distance) = self.distance_to_writer(&document, searcher).await? else {
                continue;
            };
            if !distance.is_finite() || distance > self.settings.radius_km {
                continue;
            }
            results.push(SearchResponse::from_document(document, Some(distance)));
        }

        Ok(results)
    }

    /// Owners of the wishes matching `title` and tagged with any of
    /// `idol_ids`, in index order and without deduplication
    pub async fn wish_title_search(&self, title: &str, idol_ids: &[i64]) -> Result<Vec<String>> {
        let mut builder = WishQueryBuilder::new(self.settings.list_all_limit);
        builder.create_query(title, idol_ids);
        let wishes = self.index.search_wishes(builder.search()?).await?;

        Ok(wishes.into_iter().map(|wish| wish.user_id).collect())
    }

    /// `None` when the writer's location is missing or unusable and the
    /// policy skips such hits
    async fn distance_to_writer(
        &self,
        document: &BarterDocument,
        searcher: GeoPoint,
    ) -> Result<Option<f64>> {
        let location = match self.locations.location_of(&document.writer_id).await? {
            CachedLocation::Found(point) => CachedLocation::from_point(point),
            other => other,
        };

        let error = match location {
            CachedLocation::Found(writer) => return Ok(Some(distance_km(writer, searcher))),
            CachedLocation::Missing => SearchError::WriterLocationMissing {
                writer_id: document.writer_id.clone(),
                article_id: document.article_id,
            },
            CachedLocation::Malformed(reason) => SearchError::WriterLocationMalformed {
                writer_id: document.writer_id.clone(),
                article_id: document.article_id,
                reason,
            },
        };

        match self.settings.location_policy {
            LocationPolicy::Strict => Err(error.into()),
            LocationPolicy::Skip => {
                warn!(
                    writer_id = %document.writer_id,
                    article_id = document.article_id,
                    reason = %error,
                    "skipping listing without a usable writer location"
                );
                Ok(None)
            }
        }
    }

    /// Failures here never fail the search
    async fn publish_search_counts(&self, members: &[i64]) {
        let Some(queue) = &self.search_counts else {
            return;
        };

        let distinct: BTreeSet<i64> = members.iter().copied().collect();
        for member_id in distinct {
            if let Err(e) = queue.publish(&SearchCountMessage { member_id }).await {
                warn!(member_id, error = %format!("{:#}", e), "failed to publish search count");
            }
        }
    }
}
