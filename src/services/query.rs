// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Translation of criteria into Meilisearch queries.
//!
//! Builders are stateful: `create_query` must run before the built query or
//! its page request can be read. Reading first is a programming error and is
//! reported as [`QueryError::NotInitialized`].

use crate::services::criteria::BarterSearchCriteria;
use thiserror::Error;

/// Indexed field names shared by the query builders and index settings
pub mod fields {
    pub const TITLE: &str = "title";
    pub const OWN_MEMBERS: &str = "own_members";
    pub const TARGET_MEMBERS: &str = "target_members";
    pub const CARD_TYPE: &str = "card_type";
    pub const BARTERED: &str = "bartered";
    pub const CREATED_AT: &str = "created_at";
    pub const IDOLS: &str = "idols";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0} used before create_query was called")]
    NotInitialized(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest listings first
    CreatedAtDesc,
    /// Engine relevance order
    Relevance,
}

impl SortOrder {
    /// Meilisearch sort rules for this order
    pub fn sort_rules(&self) -> &'static [&'static str] {
        match self {
            SortOrder::CreatedAtDesc => &["created_at:desc"],
            SortOrder::Relevance => &[],
        }
    }
}

/// Page number, page size and sort order of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
    pub sort: SortOrder,
}

impl PageRequest {
    pub fn new(page: usize, size: usize, sort: SortOrder) -> Self {
        Self { page, size, sort }
    }

    pub fn offset(&self) -> usize {
        self.page * self.size
    }
}

/// Executable barter listing query
#[derive(Debug, Clone, PartialEq)]
pub struct BarterQuery {
    /// Free-text query matched against the title; empty matches everything
    pub text: String,
    /// Filter clauses, combined with AND
    pub filters: Vec<String>,
    pub page: PageRequest,
}

impl BarterQuery {
    /// Unfiltered newest-first listing of at most `limit` documents
    pub fn list_all(limit: usize) -> Self {
        Self {
            text: String::new(),
            filters: Vec::new(),
            page: PageRequest::new(0, limit, SortOrder::CreatedAtDesc),
        }
    }

    /// Meilisearch filter expression, `None` when no clause applies
    pub fn filter_expression(&self) -> Option<String> {
        join_filters(&self.filters)
    }
}

/// Executable wish list query
#[derive(Debug, Clone, PartialEq)]
pub struct WishQuery {
    pub text: String,
    pub filters: Vec<String>,
    pub page: PageRequest,
}

impl WishQuery {
    pub fn filter_expression(&self) -> Option<String> {
        join_filters(&self.filters)
    }
}

/// Builds barter queries from search criteria
#[derive(Debug)]
pub struct QueryBuilder {
    default_page_size: usize,
    query: Option<BarterQuery>,
}

impl QueryBuilder {
    pub fn new(default_page_size: usize) -> Self {
        Self {
            default_page_size,
            query: None,
        }
    }

    /// Build the query for `criteria`, replacing any previously built one
    pub fn create_query(&mut self, criteria: &BarterSearchCriteria) {
        let mut filters = Vec::new();
        if !criteria.own().is_empty() {
            filters.push(in_filter(fields::OWN_MEMBERS, criteria.own().iter()));
        }
        if !criteria.target().is_empty() {
            filters.push(in_filter(fields::TARGET_MEMBERS, criteria.target().iter()));
        }
        if let Some(card_type) = criteria.card_type() {
            filters.push(eq_filter(fields::CARD_TYPE, card_type));
        }

        let size = criteria
            .size()
            .map(|size| size as usize)
            .unwrap_or(self.default_page_size);
        let page = criteria.page().unwrap_or(0) as usize;

        self.query = Some(BarterQuery {
            text: criteria.keyword().unwrap_or_default().to_string(),
            filters,
            page: PageRequest::new(page, size, SortOrder::CreatedAtDesc),
        });
    }

    pub fn search(&self) -> Result<&BarterQuery, QueryError> {
        self.query
            .as_ref()
            .ok_or(QueryError::NotInitialized("QueryBuilder::search"))
    }

    pub fn page_request(&self) -> Result<PageRequest, QueryError> {
        self.query
            .as_ref()
            .map(|query| query.page)
            .ok_or(QueryError::NotInitialized("QueryBuilder::page_request"))
    }
}

/// Builds wish list queries from a title and idol member tags
#[derive(Debug)]
pub struct WishQueryBuilder {
    page_size: usize,
    query: Option<WishQuery>,
}

impl WishQueryBuilder {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            query: None,
        }
    }

    pub fn create_query(&mut self, title: &str, idol_ids: &[i64]) {
        let mut filters = Vec::new();
        if !idol_ids.is_empty() {
            filters.push(in_filter(fields::IDOLS, idol_ids.iter()));
        }

        self.query = Some(WishQuery {
            text: title.trim().to_string(),
            filters,
            page: PageRequest::new(0, self.page_size, SortOrder::Relevance),
        });
    }

    pub fn search(&self) -> Result<&WishQuery, QueryError> {
        self.query
            .as_ref()
            .ok_or(QueryError::NotInitialized("WishQueryBuilder::search"))
    }

    pub fn page_request(&self) -> Result<PageRequest, QueryError> {
        self.query
            .as_ref()
            .map(|query| query.page)
            .ok_or(QueryError::NotInitialized("WishQueryBuilder::page_request"))
    }
}

/// `field IN [a, b]`: matches documents whose array field contains any id
fn in_filter<'a>(field: &str, ids: impl Iterator<Item = &'a i64>) -> String {
    let ids: Vec<String> = ids.map(|id| id.to_string()).collect();
    format!("{} IN [{}]", field, ids.join(", "))
}

fn eq_filter(field: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{} = \"{}\"", field, escaped)
}

fn join_filters(filters: &[String]) -> Option<String> {
    if filters.is_empty() {
        None
    } else {
        Some(filters.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::search::{GeoPoint, SearchRequest};
    use crate::services::criteria::build_criteria;

    fn criteria(own: Vec<i64>, target: Vec<i64>) -> BarterSearchCriteria {
        build_criteria(&SearchRequest {
            own,
            target,
            location: GeoPoint::new(37.0, 127.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_search_before_create_query_fails() {
        let builder = QueryBuilder::new(20);
        assert_eq!(
            builder.search().unwrap_err(),
            QueryError::NotInitialized("QueryBuilder::search")
        );
        assert!(builder.page_request().is_err());
    }

    #[test]
    fn test_wish_search_before_create_query_fails() {
        let builder = WishQueryBuilder::new(100);
        assert!(matches!(
            builder.search(),
            Err(QueryError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_member_filters() {
        let mut builder = QueryBuilder::new(20);
        builder.create_query(&criteria(vec![3], vec![2, 1]));

        let query = builder.search().unwrap();
        assert_eq!(
            query.filter_expression().as_deref(),
            Some("own_members IN [3] AND target_members IN [1, 2]")
        );
        assert_eq!(query.text, "");
    }

    #[test]
    fn test_create_query_twice_does_not_accumulate() {
        let mut builder = QueryBuilder::new(20);
        let criteria = criteria(vec![3], vec![1]);
        builder.create_query(&criteria);
        builder.create_query(&criteria);

        assert_eq!(builder.search().unwrap().filters.len(), 2);
    }

    #[test]
    fn test_no_predicates_means_no_filter() {
        let mut builder = QueryBuilder::new(20);
        builder.create_query(&criteria(vec![], vec![]));

        assert_eq!(builder.search().unwrap().filter_expression(), None);
    }

    #[test]
    fn test_keyword_card_type_and_paging() {
        let mut builder = QueryBuilder::new(20);
        builder.create_query(&build_criteria(&SearchRequest {
            query: Some("winter".to_string()),
            card_type: Some("po\"ca".to_string()),
            page: Some(2),
            size: Some(10),
            ..Default::default()
        }));

        let query = builder.search().unwrap();
        assert_eq!(query.text, "winter");
        assert_eq!(query.filters, vec![r#"card_type = "po\"ca""#.to_string()]);

        let page = builder.page_request().unwrap();
        assert_eq!(page, PageRequest::new(2, 10, SortOrder::CreatedAtDesc));
        assert_eq!(page.offset(), 20);
    }

    #[test]
    fn test_default_page_size_applies() {
        let mut builder = QueryBuilder::new(20);
        builder.create_query(&criteria(vec![1], vec![]));
        assert_eq!(builder.page_request().unwrap().size, 20);
    }

    #[test]
    fn test_list_all_sorts_newest_first() {
        let query = BarterQuery::list_all(1000);
        assert_eq!(query.page.sort.sort_rules(), &["created_at:desc"]);
        assert_eq!(query.page.size, 1000);
        assert_eq!(query.filter_expression(), None);
    }

    #[test]
    fn test_wish_query_tags_and_title() {
        let mut builder = WishQueryBuilder::new(1000);
        builder.create_query(" winter ", &[7, 9]);

        let query = builder.search().unwrap();
        assert_eq!(query.text, "winter");
        assert_eq!(query.filter_expression().as_deref(), Some("idols IN [7, 9]"));
        assert_eq!(query.page.sort, SortOrder::Relevance);
    }
}
