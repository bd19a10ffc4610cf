//! HTTP client for the grants REST API

use crate::api::GrantApi;
use crate::error::{ApiError, Result};
use crate::types::*;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// HTTP client for the grants REST API
///
/// # Example
///
/// ```rust,no_run
/// use grant_api_client::{ApiClient, ApiConfig, GrantApi};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(ApiConfig {
///     base_url: "http://localhost:4000".into(),
///     ..Default::default()
/// })?;
///
/// let options = client.filter_options().await?;
/// println!("{} agencies", options.agencies.len());
/// # Ok(())
/// # }
/// ```
pub struct ApiClient {
    config: ApiConfig,
    client: Client,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ApiError::InvalidConfig(format!("api key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the client configuration
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    // ==================== Helper Methods ====================

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request.send().await.map_err(ApiError::from_transport)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let response = self.check_status(response).await?;
        let body = response.text().await.map_err(ApiError::from_transport)?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), url = %url, "Request failed");

        match status {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(url)),
            StatusCode::CONFLICT => {
                let conflict: ConflictBody = serde_json::from_str(&body).unwrap_or_default();
                let message = conflict
                    .message
                    .or(conflict.error)
                    .unwrap_or(body);
                Err(ApiError::Conflict {
                    retryable: conflict.retryable,
                    message,
                })
            }
            _ => Err(ApiError::Server {
                status: status.as_u16(),
                message: body,
            }),
        }
    }
}

#[async_trait]
impl GrantApi for ApiClient {
    // ==================== Search API ====================

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let url = self.url("/search");
        debug!(
            page = request.pagination.page,
            page_size = request.pagination.page_size,
            "POST /search"
        );

        let response = self
            .send(
                self.client
                    .post(&url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(request),
            )
            .await?;
        self.handle_response(response).await
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        let url = self.url("/search/filter-options");
        let response = self.send(self.client.get(&url)).await?;
        self.handle_response(response).await
    }

    async fn popular_searches(&self, query: &PopularSearchQuery) -> Result<PopularSearchResponse> {
        let mut params = vec![
            format!("from={}", urlencoding::encode(&query.from)),
            format!("to={}", urlencoding::encode(&query.to)),
            format!("limit={}", query.limit),
            format!("page={}", query.page),
        ];
        if let Some(category) = query.category {
            params.push(format!("category={}", category.as_str()));
        }
        let url = format!("{}?{}", self.url("/search/popular"), params.join("&"));

        let response = self.send(self.client.get(&url)).await?;
        let raw: serde_json::Value = self.handle_response(response).await?;
        Ok(PopularSearchResponse::from_value(raw)?)
    }

    // ==================== Recipients API ====================

    async fn list_recipients(&self, page: u32, page_size: u32) -> Result<RecipientListResponse> {
        let url = format!(
            "{}?page={}&pageSize={}",
            self.url("/recipients"),
            page,
            page_size
        );

        let response = self.send(self.client.get(&url)).await?;
        self.handle_response(response).await
    }

    // ==================== Institutes API ====================

    async fn list_institutes(&self, page: u32, page_size: u32) -> Result<InstituteListResponse> {
        let url = format!(
            "{}?page={}&pageSize={}",
            self.url("/institutes"),
            page,
            page_size
        );

        let response = self.send(self.client.get(&url)).await?;
        self.handle_response(response).await
    }

    // ==================== Bookmark API ====================

    async fn bookmarked_ids(&self, entity_type: EntityType, user_id: i64) -> Result<Vec<i64>> {
        let url = self.url(&format!("/save/{}/{}", entity_type, user_id));

        let response = self.send(self.client.get(&url)).await?;
        let raw: Vec<serde_json::Value> = self.handle_response(response).await?;

        // Older deployments answer `[{"grant_id": 1}]` instead of `[1]`
        raw.into_iter()
            .map(|entry| {
                let id = match &entry {
                    serde_json::Value::Number(n) => n.as_i64(),
                    serde_json::Value::Object(map) if map.len() == 1 => {
                        map.values().next().and_then(|v| v.as_i64())
                    }
                    _ => None,
                };
                id.ok_or_else(|| ApiError::InvalidResponse(format!("bookmark id: {}", entry)))
            })
            .collect()
    }

    async fn create_bookmark(&self, entity_type: EntityType, entity_id: i64, user_id: i64) -> Result<()> {
        let url = self.url(&format!("/save/{}/{}", entity_type, entity_id));

        let response = self
            .send(
                self.client
                    .post(&url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&BookmarkRequest { user_id }),
            )
            .await?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn delete_bookmark(&self, entity_type: EntityType, entity_id: i64, user_id: i64) -> Result<()> {
        let url = self.url(&format!("/save/{}/{}", entity_type, entity_id));

        let response = self
            .send(
                self.client
                    .delete(&url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&BookmarkRequest { user_id }),
            )
            .await?;
        self.check_status(response).await?;
        Ok(())
    }
}
