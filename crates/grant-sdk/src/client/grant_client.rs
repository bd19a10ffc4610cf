//! Grant browsing client
//!
//! One explicitly constructed object owns the transport, the retry policy,
//! a paginated cache per result stream and the bookmark coordinator.

use super::popular::{page_from_response, PopularSearch, PopularSearchParams};
use crate::analytics::AnalyticsSnapshot;
use crate::bookmarks::{BookmarkCoordinator, EntityId, UserId};
use crate::cache::{
    CacheKey, CacheSnapshot, FetchOutcome, Page, PaginatedFetcher, INSTITUTES_NAMESPACE,
    RECIPIENTS_NAMESPACE, SEARCH_NAMESPACE,
};
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::filter::FilterState;
use crate::retry::RetryPolicy;
use crate::search::{SearchParams, SearchRequestBuilder, TermFacet};
use chrono::{NaiveDateTime, Utc};
use grant_api_client::{
    ApiClient, EntityType, FilterOptions, Grant, GrantApi, Institute, Recipient, SearchMetadata,
    SortConfig,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Client for browsing grants, recipients and popular searches
///
/// # Example
///
/// ```rust,no_run
/// use grant_sdk::{FilterState, GrantClient, SdkConfig, TermFacet};
///
/// # async fn example() -> grant_sdk::Result<()> {
/// let client = GrantClient::new(SdkConfig::default())?;
///
/// let filters = FilterState::new().with_agency("NSERC").with_year_range(2015, 2020);
/// let params = client.build_search([(TermFacet::Recipient, "smith")], &filters, Default::default())?;
///
/// client.search(&params).await?;
/// client.search_more(&params).await?;
///
/// if let Some(results) = client.search_results(&params).await {
///     println!("{} of {} grants", results.len(), results.total_count);
/// }
/// # Ok(())
/// # }
/// ```
pub struct GrantClient {
    api: Arc<dyn GrantApi>,
    config: SdkConfig,
    retry: RetryPolicy,
    builder: SearchRequestBuilder,
    grants: PaginatedFetcher<Grant>,
    recipients: PaginatedFetcher<Recipient>,
    institutes: PaginatedFetcher<Institute>,
    popular: PaginatedFetcher<PopularSearch>,
    bookmarks: BookmarkCoordinator,
    user_id: Option<UserId>,
}

impl GrantClient {
    /// Create a client talking HTTP to `config.api.base_url`
    pub fn new(config: SdkConfig) -> Result<Self> {
        config.validate()?;
        let api = ApiClient::new(config.api.clone()).map_err(|e| SdkError::Config(e.to_string()))?;
        Ok(Self::with_api(Arc::new(api), config))
    }

    /// Create a client over any `GrantApi` implementation
    pub fn with_api(api: Arc<dyn GrantApi>, config: SdkConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            bookmarks: BookmarkCoordinator::new(Arc::clone(&api), retry),
            builder: SearchRequestBuilder::new(config.limits),
            grants: PaginatedFetcher::new(),
            recipients: PaginatedFetcher::new(),
            institutes: PaginatedFetcher::new(),
            popular: PaginatedFetcher::new(),
            api,
            config,
            retry,
            user_id: None,
        }
    }

    /// Act on behalf of a signed-in user
    pub fn with_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn set_user(&mut self, user_id: Option<UserId>) {
        self.user_id = user_id;
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn request_builder(&self) -> &SearchRequestBuilder {
        &self.builder
    }

    // ==================== Grant search ====================

    pub fn build_search<I, S>(&self, terms: I, filters: &FilterState, sort: SortConfig) -> Result<SearchParams>
    where
        I: IntoIterator<Item = (TermFacet, S)>,
        S: AsRef<str>,
    {
        self.builder.build(terms, filters, sort)
    }

    /// Load page 1 of a search, making it the active one
    pub async fn search(&self, params: &SearchParams) -> Result<FetchOutcome> {
        info!(
            key = %params.cache_key(),
            weight = params.query_weight(),
            "Search submitted"
        );
        self.grants
            .fetch_first_page(params.cache_key(), |page| self.fetch_search_page(params, page))
            .await
    }

    /// Append the next page of a loaded search
    pub async fn search_more(&self, params: &SearchParams) -> Result<FetchOutcome> {
        self.grants
            .fetch_next_page(params.cache_key(), |page| self.fetch_search_page(params, page))
            .await
    }

    pub async fn search_results(&self, params: &SearchParams) -> Option<CacheSnapshot<Grant>> {
        self.grants.snapshot(params.cache_key()).await
    }

    /// Drop every cached search
    pub async fn invalidate_searches(&self) -> usize {
        self.grants.invalidate(SEARCH_NAMESPACE).await
    }

    pub fn search_cache(&self) -> &PaginatedFetcher<Grant> {
        &self.grants
    }

    async fn fetch_search_page(&self, params: &SearchParams, page: u32) -> Result<Page<Grant>> {
        let page_size = self.config.search_page_size;
        let request = params.to_request(page, page_size, self.user_id);
        let request = &request;
        let response = self.retry.execute(move || self.api.search(request)).await?;

        Ok(match response.metadata.as_ref().and_then(SearchMetadata::paging) {
            Some(metadata) => Page::from_metadata(response.data, metadata),
            None => {
                debug!(page, "Search response without paging, treating as complete");
                Page::complete(response.data, page, page_size)
            }
        })
    }

    // ==================== Recipients ====================

    pub fn recipients_key(&self) -> CacheKey {
        CacheKey::new(
            RECIPIENTS_NAMESPACE,
            &format!("pageSize={}", self.config.recipients_page_size),
        )
    }

    pub async fn load_recipients(&self) -> Result<FetchOutcome> {
        self.recipients
            .fetch_first_page(&self.recipients_key(), |page| self.fetch_recipient_page(page))
            .await
    }

    pub async fn more_recipients(&self) -> Result<FetchOutcome> {
        self.recipients
            .fetch_next_page(&self.recipients_key(), |page| self.fetch_recipient_page(page))
            .await
    }

    pub async fn recipients(&self) -> Option<CacheSnapshot<Recipient>> {
        self.recipients.snapshot(&self.recipients_key()).await
    }

    async fn fetch_recipient_page(&self, page: u32) -> Result<Page<Recipient>> {
        let page_size = self.config.recipients_page_size;
        let response = self
            .retry
            .execute(move || self.api.list_recipients(page, page_size))
            .await?;
        Ok(Page::from_metadata(response.data, response.metadata))
    }

    // ==================== Institutes ====================

    pub fn institutes_key(&self) -> CacheKey {
        CacheKey::new(
            INSTITUTES_NAMESPACE,
            &format!("pageSize={}", self.config.institutes_page_size),
        )
    }

    pub async fn load_institutes(&self) -> Result<FetchOutcome> {
        self.institutes
            .fetch_first_page(&self.institutes_key(), |page| self.fetch_institute_page(page))
            .await
    }

    pub async fn more_institutes(&self) -> Result<FetchOutcome> {
        self.institutes
            .fetch_next_page(&self.institutes_key(), |page| self.fetch_institute_page(page))
            .await
    }

    pub async fn institutes(&self) -> Option<CacheSnapshot<Institute>> {
        self.institutes.snapshot(&self.institutes_key()).await
    }

    async fn fetch_institute_page(&self, page: u32) -> Result<Page<Institute>> {
        let page_size = self.config.institutes_page_size;
        let response = self
            .retry
            .execute(move || self.api.list_institutes(page, page_size))
            .await?;
        Ok(Page::from_metadata(response.data, response.metadata))
    }

    // ==================== Popular searches ====================

    pub async fn popular_searches(&self, params: &PopularSearchParams) -> Result<FetchOutcome> {
        params.validate()?;
        let key = params.cache_key(self.config.popular_page_size);
        self.popular
            .fetch_first_page(&key, |page| self.fetch_popular_page(params, page))
            .await
    }

    pub async fn more_popular_searches(&self, params: &PopularSearchParams) -> Result<FetchOutcome> {
        let key = params.cache_key(self.config.popular_page_size);
        self.popular
            .fetch_next_page(&key, |page| self.fetch_popular_page(params, page))
            .await
    }

    pub async fn popular_results(&self, params: &PopularSearchParams) -> Option<CacheSnapshot<PopularSearch>> {
        self.popular
            .snapshot(&params.cache_key(self.config.popular_page_size))
            .await
    }

    async fn fetch_popular_page(&self, params: &PopularSearchParams, page: u32) -> Result<Page<PopularSearch>> {
        let limit = self.config.popular_page_size;
        let query = params.to_query(page, limit);
        let query = &query;
        let response = self
            .retry
            .execute(move || self.api.popular_searches(query))
            .await?;
        Ok(page_from_response(response, params, page, limit))
    }

    // ==================== Filter options ====================

    /// Facet values to offer in the filter panel
    pub async fn filter_options(&self) -> Result<FilterOptions> {
        Ok(self.retry.execute(move || self.api.filter_options()).await?)
    }

    // ==================== Bookmarks ====================

    pub fn bookmarks(&self) -> &BookmarkCoordinator {
        &self.bookmarks
    }

    /// Toggle a bookmark for the current user
    pub async fn toggle_bookmark(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        currently_bookmarked: bool,
    ) -> Result<bool> {
        self.bookmarks
            .toggle(entity_type, self.user_id, entity_id, currently_bookmarked)
            .await
    }

    /// Fetch the current user's bookmarks of one kind
    pub async fn load_bookmarks(&self, entity_type: EntityType) -> Result<BTreeSet<EntityId>> {
        let user_id = self.user_id.ok_or_else(|| {
            SdkError::AuthRequired(format!("sign in to list {} bookmarks", entity_type))
        })?;
        self.bookmarks.load(entity_type, user_id).await
    }

    // ==================== Analytics ====================

    /// Metrics over the loaded pages of a search and the recipient list
    pub async fn analytics(&self, params: &SearchParams) -> AnalyticsSnapshot {
        self.analytics_at(params, Utc::now().naive_utc()).await
    }

    pub async fn analytics_at(&self, params: &SearchParams, now: NaiveDateTime) -> AnalyticsSnapshot {
        let grants = self
            .grants
            .snapshot(params.cache_key())
            .await
            .map(|snapshot| snapshot.items)
            .unwrap_or_default();
        let recipients = self
            .recipients()
            .await
            .map(|snapshot| snapshot.items)
            .unwrap_or_default();
        AnalyticsSnapshot::compute(&grants, &recipients, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchState;
    use crate::mock::{MockFailure, MockGrantApi};
    use chrono::NaiveDate;
    use grant_api_client::{PopularTerm, SearchCategory};

    fn grants(n: i64) -> Vec<Grant> {
        (1..=n)
            .map(|grant_id| Grant {
                grant_id,
                agreement_value: Some(100.0),
                agreement_start_date: Some(format!("{}-01-01", 2015 + grant_id % 5)),
                org: Some("NSERC".into()),
                ..Default::default()
            })
            .collect()
    }

    fn client(mock: MockGrantApi) -> (Arc<MockGrantApi>, GrantClient) {
        let mock = Arc::new(mock);
        let client = GrantClient::with_api(mock.clone(), SdkConfig::default());
        (mock, client)
    }

    fn no_terms() -> Vec<(TermFacet, &'static str)> {
        Vec::new()
    }

    #[tokio::test]
    async fn test_search_pages_through_results() {
        let (mock, client) = client(MockGrantApi::new().with_grants(grants(25)));
        let params = client
            .build_search(no_terms(), &FilterState::new(), SortConfig::default())
            .unwrap();

        client.search(&params).await.unwrap();
        client.search_more(&params).await.unwrap();
        client.search_more(&params).await.unwrap();
        let outcome = client.search_more(&params).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Skipped);
        let results = client.search_results(&params).await.unwrap();
        assert_eq!(results.len(), 25);
        assert_eq!(results.total_count, 25);
        assert!(!results.has_more());
        assert_eq!(mock.search_calls(), 3);
    }

    #[tokio::test]
    async fn test_search_request_carries_user_and_filters() {
        let (mock, client) = client(MockGrantApi::new().with_grants(grants(3)));
        let client = client.with_user(Some(9));
        let params = client
            .build_search(
                [(TermFacet::Grant, "ocean")],
                &FilterState::new().with_country("Canada"),
                SortConfig::default(),
            )
            .unwrap();

        client.search(&params).await.unwrap();

        let request = mock.last_search().await.unwrap();
        assert_eq!(request.user_id, Some(9));
        assert_eq!(request.filters.countries, vec!["Canada"]);
        assert_eq!(request.pagination.page_size, 10);
    }

    #[tokio::test]
    async fn test_unpaginated_search_is_single_page() {
        let (_mock, client) = client(MockGrantApi::new().with_grants(grants(14)).without_search_paging());
        let params = client
            .build_search(no_terms(), &FilterState::new(), SortConfig::default())
            .unwrap();

        client.search(&params).await.unwrap();
        let results = client.search_results(&params).await.unwrap();
        assert_eq!(results.len(), 14);
        assert_eq!(results.total_count, 14);
        assert!(!results.has_more());
        assert_eq!(client.search_more(&params).await.unwrap(), FetchOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_conflict_on_search_retried() {
        let (mock, client) = client(
            MockGrantApi::new()
                .with_grants(grants(5))
                .with_failures([MockFailure::TransientConflict]),
        );
        let params = client
            .build_search(no_terms(), &FilterState::new(), SortConfig::default())
            .unwrap();

        let outcome = client.search(&params).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Loaded { page: 1, items: 5 });
        assert_eq!(mock.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_search_sets_error_state() {
        let (_mock, client) = client(
            MockGrantApi::new()
                .with_grants(grants(5))
                .with_failures([MockFailure::Server(503)]),
        );
        let params = client
            .build_search(no_terms(), &FilterState::new(), SortConfig::default())
            .unwrap();

        assert!(client.search(&params).await.is_err());
        assert_eq!(
            client.search_cache().state(params.cache_key()).await,
            FetchState::Error
        );
    }

    #[tokio::test]
    async fn test_recipients_and_analytics() {
        let recipients: Vec<Recipient> = (1..=45)
            .map(|recipient_id| Recipient {
                recipient_id,
                total_funding: Some(10.0),
                ..Default::default()
            })
            .collect();
        let (_mock, client) = client(
            MockGrantApi::new()
                .with_grants(grants(10))
                .with_recipients(recipients),
        );

        client.load_recipients().await.unwrap();
        client.more_recipients().await.unwrap();
        assert_eq!(client.recipients().await.unwrap().len(), 40);

        let params = client
            .build_search(no_terms(), &FilterState::new(), SortConfig::default())
            .unwrap();
        client.search(&params).await.unwrap();

        let now = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let analytics = client.analytics_at(&params, now).await;
        assert_eq!(analytics.total_funding, 1000.0);
        assert_eq!(analytics.specialization.top_agency.as_deref(), Some("NSERC"));
        // Top three of the 40 loaded recipients, within their own funding
        assert_eq!(analytics.concentration.concentration, 7.5);
    }

    #[tokio::test]
    async fn test_institutes_page_through_directory() {
        let institutes: Vec<Institute> = (1..=25)
            .map(|institute_id| Institute {
                institute_id,
                name: Some(format!("Institute {}", institute_id)),
                ..Default::default()
            })
            .collect();
        let (mock, client) = client(MockGrantApi::new().with_institutes(institutes));

        assert_eq!(
            client.load_institutes().await.unwrap(),
            FetchOutcome::Loaded { page: 1, items: 20 }
        );
        assert_eq!(
            client.more_institutes().await.unwrap(),
            FetchOutcome::Loaded { page: 2, items: 5 }
        );
        assert_eq!(client.more_institutes().await.unwrap(), FetchOutcome::Skipped);

        let directory = client.institutes().await.unwrap();
        assert_eq!(directory.len(), 25);
        assert_eq!(directory.total_count, 25);
        assert_eq!(directory.items[20].institute_id, 21);
        assert_eq!(mock.call_count(), 2);
        assert_ne!(client.institutes_key(), client.recipients_key());
    }

    #[tokio::test]
    async fn test_failed_institute_page_keeps_loaded_pages() {
        let institutes: Vec<Institute> = (1..=30)
            .map(|institute_id| Institute {
                institute_id,
                ..Default::default()
            })
            .collect();
        let (mock, client) = client(MockGrantApi::new().with_institutes(institutes));

        client.load_institutes().await.unwrap();
        mock.fail_next(MockFailure::Server(500)).await;
        assert!(client.more_institutes().await.is_err());

        let key = client.institutes_key();
        assert_eq!(client.institutes().await.unwrap().len(), 20);
        assert_eq!(client.institutes.state(&key).await, FetchState::Error);
    }

    #[tokio::test]
    async fn test_popular_searches() {
        let (_mock, client) = client(
            MockGrantApi::new()
                .with_popular(
                    SearchCategory::Recipient,
                    (0..15)
                        .map(|i| PopularTerm {
                            text: format!("term {}", i),
                            count: 100 - i,
                        })
                        .collect(),
                )
                .with_popular(
                    SearchCategory::Grant,
                    vec![PopularTerm {
                        text: "ocean".into(),
                        count: 4,
                    }],
                ),
        );
        let params = PopularSearchParams::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .with_category(SearchCategory::Recipient);

        client.popular_searches(&params).await.unwrap();
        client.more_popular_searches(&params).await.unwrap();

        let results = client.popular_results(&params).await.unwrap();
        assert_eq!(results.len(), 15);
        assert!(results
            .items
            .iter()
            .all(|term| term.category == SearchCategory::Recipient));
        assert!(!results.has_more());
    }

    #[tokio::test]
    async fn test_bookmarks_need_user() {
        let (_mock, client) = client(MockGrantApi::new().with_bookmarks(EntityType::Grant, 4, [8]));

        assert!(matches!(
            client.load_bookmarks(EntityType::Grant).await,
            Err(SdkError::AuthRequired(_))
        ));

        let client = client.with_user(Some(4));
        assert_eq!(
            client.load_bookmarks(EntityType::Grant).await.unwrap(),
            BTreeSet::from([8])
        );
        assert!(!client.toggle_bookmark(EntityType::Grant, 8, true).await.unwrap());
    }
}
