// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::search::{BarterDocument, WishDocument};
use crate::services::query::{fields, BarterQuery, PageRequest, WishQuery};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use meilisearch_sdk::client::Client;
use meilisearch_sdk::search::SearchResults;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Read-only access to the barter and wish indexes.
///
/// Hits are returned in index order; callers rely on that order.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search_barters(&self, query: &BarterQuery) -> Result<Vec<BarterDocument>>;
    async fn search_wishes(&self, query: &WishQuery) -> Result<Vec<WishDocument>>;
}

/// Meilisearch client wrapper for the barter and wish indexes
pub struct SearchClient {
    client: Client,
    barter_index: String,
    wish_index: String,
}

impl SearchClient {
    /// Create a new Meilisearch client
    pub fn new(
        host: &str,
        api_key: Option<String>,
        barter_index: String,
        wish_index: String,
    ) -> Result<Self> {
        // Construct the full URL if only host:port is provided
        let url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };

        let client = Client::new(&url, api_key)?;

        info!(url = %url, "connected to Meilisearch");

        Ok(Self {
            client,
            barter_index,
            wish_index,
        })
    }

    /// Configure searchable, filterable and sortable attributes of both indexes
    pub async fn init_indexes(&self) -> Result<()> {
        let barter = self.client.index(&self.barter_index);
        barter
            .set_searchable_attributes([fields::TITLE])
            .await
            .map_err(|e| anyhow!("Failed to set searchable attributes: {}", e))?;
        barter
            .set_filterable_attributes([
                fields::OWN_MEMBERS,
                fields::TARGET_MEMBERS,
                fields::CARD_TYPE,
                fields::BARTERED,
            ])
            .await
            .map_err(|e| anyhow!("Failed to set filterable attributes: {}", e))?;
        barter
            .set_sortable_attributes([fields::CREATED_AT])
            .await
            .map_err(|e| anyhow!("Failed to set sortable attributes: {}", e))?;

        let wish = self.client.index(&self.wish_index);
        wish.set_searchable_attributes([fields::TITLE])
            .await
            .map_err(|e| anyhow!("Failed to set searchable attributes: {}", e))?;
        wish.set_filterable_attributes([fields::IDOLS])
            .await
            .map_err(|e| anyhow!("Failed to set filterable attributes: {}", e))?;

        info!(
            barter_index = %self.barter_index,
            wish_index = %self.wish_index,
            "initialized Meilisearch indexes"
        );

        Ok(())
    }

    async fn execute<T>(
        &self,
        index_uid: &str,
        text: &str,
        filter: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let index = self.client.index(index_uid);
        let mut search = index.search();
        search
            .with_query(text)
            .with_limit(page.size)
            .with_offset(page.offset());

        if let Some(filter) = filter {
            search.with_filter(filter);
        }

        let sort = page.sort.sort_rules();
        if !sort.is_empty() {
            search.with_sort(sort);
        }

        let results: SearchResults<T> = search
            .execute::<T>()
            .await
            .map_err(|e| anyhow!("Search on {} failed: {}", index_uid, e))?;

        debug!(
            index = index_uid,
            hits = results.hits.len(),
            estimated_total = ?results.estimated_total_hits,
            "search executed"
        );

        if results.hits.len() == page.size && page.size > 0 {
            warn!(
                index = index_uid,
                size = page.size,
                "search filled the whole page; later hits were not fetched"
            );
        }

        Ok(results.hits.into_iter().map(|hit| hit.result).collect())
    }
}

#[async_trait]
impl SearchIndex for SearchClient {
    async fn search_barters(&self, query: &BarterQuery) -> Result<Vec<BarterDocument>> {
        let filter = query.filter_expression();
        self.execute(&self.barter_index, &query.text, filter.as_deref(), query.page)
            .await
    }

    async fn search_wishes(&self, query: &WishQuery) -> Result<Vec<WishDocument>> {
        let filter = query.filter_expression();
        self.execute(&self.wish_index, &query.text, filter.as_deref(), query.page)
            .await
    }
}
