//! Transport abstraction over the grants REST contract
//!
//! The SDK only ever talks to a `GrantApi`; the reqwest-backed
//! [`ApiClient`](crate::ApiClient) is the production implementation and
//! tests substitute scripted ones.

use crate::error::Result;
use crate::types::*;
use async_trait::async_trait;

/// Core trait for the grants backend.
#[async_trait]
pub trait GrantApi: Send + Sync {
    /// `POST /search`
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;

    /// `GET /search/filter-options`
    async fn filter_options(&self) -> Result<FilterOptions>;

    /// `GET /recipients?page&pageSize`
    async fn list_recipients(&self, page: u32, page_size: u32) -> Result<RecipientListResponse>;

    /// `GET /institutes?page&pageSize`
    async fn list_institutes(&self, page: u32, page_size: u32) -> Result<InstituteListResponse>;

    /// `GET /search/popular`
    async fn popular_searches(&self, query: &PopularSearchQuery) -> Result<PopularSearchResponse>;

    /// `GET /save/{entityType}/{userId}`
    async fn bookmarked_ids(&self, entity_type: EntityType, user_id: i64) -> Result<Vec<i64>>;

    /// `POST /save/{entityType}/{entityId}`
    async fn create_bookmark(&self, entity_type: EntityType, entity_id: i64, user_id: i64) -> Result<()>;

    /// `DELETE /save/{entityType}/{entityId}`
    async fn delete_bookmark(&self, entity_type: EntityType, entity_id: i64, user_id: i64) -> Result<()>;
}
