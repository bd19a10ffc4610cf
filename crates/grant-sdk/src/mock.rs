//! In-memory `GrantApi` for tests and offline demos

use async_trait::async_trait;
use grant_api_client::{
    ApiError, EntityType, FilterOptions, Grant, GrantApi, Institute, InstituteListResponse,
    PageMetadata, PopularSearchQuery, PopularSearchResponse, PopularTerm, Recipient,
    RecipientListResponse, SearchCategory, SearchMetadata, SearchRequest, SearchResponse,
};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

type ApiResult<T> = grant_api_client::Result<T>;

/// Scripted failure for the next call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// 409 with `{"retryable": true}`
    TransientConflict,
    /// 409 without the retry flag
    Conflict,
    Server(u16),
    Timeout,
}

impl MockFailure {
    fn into_error(self) -> ApiError {
        match self {
            MockFailure::TransientConflict => ApiError::Conflict {
                retryable: true,
                message: "mock transient conflict".into(),
            },
            MockFailure::Conflict => ApiError::Conflict {
                retryable: false,
                message: "mock conflict".into(),
            },
            MockFailure::Server(status) => ApiError::Server {
                status,
                message: "mock server error".into(),
            },
            MockFailure::Timeout => ApiError::Timeout("mock timeout".into()),
        }
    }
}

/// Mock grants backend
///
/// Serves fixed datasets with real paging metadata, keeps bookmarks in
/// memory and fails calls from a scripted queue.
pub struct MockGrantApi {
    grants: Vec<Grant>,
    recipients: Vec<Recipient>,
    institutes: Vec<Institute>,
    filter_options: FilterOptions,
    popular: Vec<(SearchCategory, PopularTerm)>,
    search_paging: bool,
    latency: Duration,
    failures: Mutex<VecDeque<MockFailure>>,
    bookmarks: Mutex<HashMap<(EntityType, i64), BTreeSet<i64>>>,
    last_search: Mutex<Option<SearchRequest>>,
    call_count: AtomicU32,
    search_calls: AtomicU32,
    mutation_calls: AtomicU32,
}

impl Default for MockGrantApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGrantApi {
    pub fn new() -> Self {
        Self {
            grants: Vec::new(),
            recipients: Vec::new(),
            institutes: Vec::new(),
            filter_options: FilterOptions::default(),
            popular: Vec::new(),
            search_paging: true,
            latency: Duration::ZERO,
            failures: Mutex::new(VecDeque::new()),
            bookmarks: Mutex::new(HashMap::new()),
            last_search: Mutex::new(None),
            call_count: AtomicU32::new(0),
            search_calls: AtomicU32::new(0),
            mutation_calls: AtomicU32::new(0),
        }
    }

    /// Grants returned by every search, paged by the request
    pub fn with_grants(mut self, grants: Vec<Grant>) -> Self {
        self.grants = grants;
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<Recipient>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_institutes(mut self, institutes: Vec<Institute>) -> Self {
        self.institutes = institutes;
        self
    }

    pub fn with_filter_options(mut self, options: FilterOptions) -> Self {
        self.filter_options = options;
        self
    }

    pub fn with_popular(mut self, category: SearchCategory, terms: Vec<PopularTerm>) -> Self {
        self.popular
            .extend(terms.into_iter().map(|term| (category, term)));
        self
    }

    /// Answer searches like the unpaginated server: every grant at once,
    /// metadata carrying only `count`
    pub fn without_search_paging(mut self) -> Self {
        self.search_paging = false;
        self
    }

    /// Delay applied before every answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_failures(mut self, failures: impl IntoIterator<Item = MockFailure>) -> Self {
        self.failures.get_mut().extend(failures);
        self
    }

    /// Server-side bookmark state to start from
    pub fn with_bookmarks(mut self, entity_type: EntityType, user_id: i64, ids: impl IntoIterator<Item = i64>) -> Self {
        self.bookmarks
            .get_mut()
            .entry((entity_type, user_id))
            .or_default()
            .extend(ids);
        self
    }

    /// Fail the next call
    pub async fn fail_next(&self, failure: MockFailure) {
        self.failures.lock().await.push_back(failure);
    }

    pub async fn server_bookmarks(&self, entity_type: EntityType, user_id: i64) -> BTreeSet<i64> {
        self.bookmarks
            .lock()
            .await
            .get(&(entity_type, user_id))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn last_search(&self) -> Option<SearchRequest> {
        self.last_search.lock().await.clone()
    }

    /// Calls across all endpoints
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> u32 {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Bookmark create and delete calls
    pub fn mutation_calls(&self) -> u32 {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    /// Scripted failures go to calls in the order they were issued
    async fn begin_call(&self) -> ApiResult<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let failure = self.failures.lock().await.pop_front();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

fn paginate<T: Clone>(items: &[T], page: u32, page_size: u32) -> (Vec<T>, PageMetadata) {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total_count = items.len() as u64;
    let total_pages = total_count.div_ceil(page_size as u64) as u32;
    let start = ((page - 1) * page_size) as usize;
    let data = items
        .iter()
        .skip(start)
        .take(page_size as usize)
        .cloned()
        .collect();
    (
        data,
        PageMetadata {
            page,
            page_size,
            total_count,
            total_pages,
        },
    )
}

#[async_trait]
impl GrantApi for MockGrantApi {
    async fn search(&self, request: &SearchRequest) -> ApiResult<SearchResponse> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_search.lock().await = Some(request.clone());
        self.begin_call().await?;

        if !self.search_paging {
            return Ok(SearchResponse {
                data: self.grants.clone(),
                metadata: Some(SearchMetadata {
                    count: Some(self.grants.len() as u64),
                    ..Default::default()
                }),
            });
        }
        let (data, metadata) = paginate(
            &self.grants,
            request.pagination.page,
            request.pagination.page_size,
        );
        Ok(SearchResponse {
            data,
            metadata: Some(metadata.into()),
        })
    }

    async fn filter_options(&self) -> ApiResult<FilterOptions> {
        self.begin_call().await?;
        Ok(self.filter_options.clone())
    }

    async fn list_recipients(&self, page: u32, page_size: u32) -> ApiResult<RecipientListResponse> {
        self.begin_call().await?;
        let (data, metadata) = paginate(&self.recipients, page, page_size);
        Ok(RecipientListResponse { data, metadata })
    }

    async fn list_institutes(&self, page: u32, page_size: u32) -> ApiResult<InstituteListResponse> {
        self.begin_call().await?;
        let (data, metadata) = paginate(&self.institutes, page, page_size);
        Ok(InstituteListResponse { data, metadata })
    }

    async fn popular_searches(&self, query: &PopularSearchQuery) -> ApiResult<PopularSearchResponse> {
        self.begin_call().await?;

        let mut response = PopularSearchResponse::default();
        let mut longest = PageMetadata {
            page: query.page.max(1),
            page_size: query.limit.max(1),
            total_count: 0,
            total_pages: 0,
        };
        for category in [SearchCategory::Grant, SearchCategory::Recipient, SearchCategory::Institute] {
            if query.category.is_some_and(|wanted| wanted != category) {
                continue;
            }
            let terms: Vec<PopularTerm> = self
                .popular
                .iter()
                .filter(|(c, _)| *c == category)
                .map(|(_, term)| term.clone())
                .collect();
            let (page, metadata) = paginate(&terms, query.page, query.limit);
            if metadata.total_count > longest.total_count {
                longest = metadata;
            }
            match category {
                SearchCategory::Grant => response.grant = page,
                SearchCategory::Recipient => response.recipient = page,
                SearchCategory::Institute => response.institute = page,
            }
        }
        response.metadata = Some(longest);
        Ok(response)
    }

    async fn bookmarked_ids(&self, entity_type: EntityType, user_id: i64) -> ApiResult<Vec<i64>> {
        self.begin_call().await?;
        Ok(self
            .server_bookmarks(entity_type, user_id)
            .await
            .into_iter()
            .collect())
    }

    async fn create_bookmark(&self, entity_type: EntityType, entity_id: i64, user_id: i64) -> ApiResult<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.begin_call().await?;
        self.bookmarks
            .lock()
            .await
            .entry((entity_type, user_id))
            .or_default()
            .insert(entity_id);
        Ok(())
    }

    async fn delete_bookmark(&self, entity_type: EntityType, entity_id: i64, user_id: i64) -> ApiResult<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.begin_call().await?;
        if let Some(ids) = self.bookmarks.lock().await.get_mut(&(entity_type, user_id)) {
            ids.remove(&entity_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grant_api_client::{Pagination, SortConfig};

    fn grants(n: i64) -> Vec<Grant> {
        (1..=n)
            .map(|grant_id| Grant {
                grant_id,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_paginate_math() {
        let items: Vec<u32> = (0..25).collect();
        let (page, metadata) = paginate(&items, 3, 10);
        assert_eq!(page, vec![20, 21, 22, 23, 24]);
        assert_eq!(metadata.total_pages, 3);

        let (empty, metadata) = paginate::<u32>(&[], 1, 10);
        assert!(empty.is_empty());
        assert_eq!(metadata.total_pages, 0);
    }

    #[tokio::test]
    async fn test_search_pages_and_failures() {
        let mock = MockGrantApi::new()
            .with_grants(grants(12))
            .with_failures([MockFailure::Server(502)]);
        let request = SearchRequest {
            search_terms: Default::default(),
            filters: Default::default(),
            sort_config: SortConfig::default(),
            pagination: Pagination { page: 2, page_size: 10 },
            user_id: None,
        };

        assert!(matches!(
            mock.search(&request).await,
            Err(ApiError::Server { status: 502, .. })
        ));
        let response = mock.search(&request).await.unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(mock.search_calls(), 2);
        assert_eq!(mock.last_search().await, Some(request));
    }

    #[tokio::test]
    async fn test_bookmark_roundtrip() {
        let mock = MockGrantApi::new().with_bookmarks(EntityType::Grant, 1, [5]);
        mock.create_bookmark(EntityType::Grant, 6, 1).await.unwrap();
        mock.delete_bookmark(EntityType::Grant, 5, 1).await.unwrap();

        assert_eq!(mock.bookmarked_ids(EntityType::Grant, 1).await.unwrap(), vec![6]);
        assert_eq!(mock.mutation_calls(), 2);
    }
}
