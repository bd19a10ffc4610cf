//! Keyed page cache with fetch-more
//!
//! Each key owns a merged, ordered item list plus the next page to ask
//! for. Per key the state machine is:
//!
//! ```text
//! Idle -> Fetching -> Ready <-> FetchingMore
//!            |          |          |
//!            +------> Error <------+
//! ```
//!
//! Results are matched against a generation token taken when the request
//! was issued. A first page is dropped when the key was re-fetched or a
//! different key became the active search; a next page is dropped only
//! when the key was re-fetched. The lock is never held across the request.

use super::keys::CacheKey;
use super::page::Page;
use crate::error::{Result, SdkError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Per-key fetch state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Fetching,
    Ready,
    FetchingMore,
    Error,
}

/// What a fetch call did to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was merged into the entry
    Loaded { page: u32, items: usize },
    /// Nothing requested: key busy, not ready or exhausted
    Skipped,
    /// The response belonged to a superseded request and was dropped
    Stale,
}

/// Read-only copy of one cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot<T> {
    pub key: CacheKey,
    pub state: FetchState,
    pub items: Vec<T>,
    pub next_page: Option<u32>,
    pub total_count: u64,
    pub pages_loaded: u32,
    pub last_error: Option<String>,
}

impl<T> CacheSnapshot<T> {
    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

struct CacheEntry<T> {
    state: FetchState,
    items: Vec<T>,
    next_page: Option<u32>,
    total_count: u64,
    pages_loaded: u32,
    generation: u64,
    last_error: Option<String>,
}

impl<T> CacheEntry<T> {
    fn new() -> Self {
        Self {
            state: FetchState::Idle,
            items: Vec::new(),
            next_page: None,
            total_count: 0,
            pages_loaded: 0,
            generation: 0,
            last_error: None,
        }
    }

    fn fail(&mut self, err: &SdkError) {
        self.state = FetchState::Error;
        self.last_error = Some(err.to_string());
    }
}

struct FetcherInner<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    /// Key and generation of the most recent first-page request
    active: Option<(CacheKey, u64)>,
    next_generation: u64,
}

/// Paginated fetcher for one result stream
///
/// Cloning shares the underlying cache.
pub struct PaginatedFetcher<T> {
    inner: Arc<Mutex<FetcherInner<T>>>,
}

impl<T> Clone for PaginatedFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Default for PaginatedFetcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> PaginatedFetcher<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FetcherInner {
                entries: HashMap::new(),
                active: None,
                next_generation: 0,
            })),
        }
    }

    /// Fetch page 1 for `key`, replacing any merged pages on success
    ///
    /// `request_fn` receives the page number to load.
    pub async fn fetch_first_page<F, Fut>(&self, key: &CacheKey, request_fn: F) -> Result<FetchOutcome>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.next_generation += 1;
            let generation = inner.next_generation;
            let entry = inner
                .entries
                .entry(key.clone())
                .or_insert_with(CacheEntry::new);
            entry.state = FetchState::Fetching;
            entry.generation = generation;
            entry.last_error = None;
            inner.active = Some((key.clone(), generation));
            generation
        };

        debug!(key = %key, generation, "Fetching first page");
        let result = request_fn(1).await.and_then(|page| page.validate().map(|_| page));

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let is_active = inner
            .active
            .as_ref()
            .is_some_and(|(k, g)| k == key && *g == generation);

        let Some(entry) = inner.entries.get_mut(key) else {
            debug!(key = %key, generation, "Entry evicted in flight, dropping first page");
            return Ok(FetchOutcome::Stale);
        };
        if entry.generation != generation {
            debug!(key = %key, generation, "Key re-fetched, dropping first page");
            return Ok(FetchOutcome::Stale);
        }
        if !is_active {
            debug!(key = %key, generation, "Search superseded, dropping first page");
            entry.state = if entry.pages_loaded > 0 {
                FetchState::Ready
            } else {
                FetchState::Idle
            };
            return Ok(FetchOutcome::Stale);
        }

        match result {
            Ok(page) => {
                let next_page = page.next_page_param();
                let count = page.items.len();
                entry.items = page.items;
                entry.next_page = next_page;
                entry.total_count = page.total_count;
                entry.pages_loaded = 1;
                entry.state = FetchState::Ready;
                debug!(key = %key, items = count, total = page.total_count, "First page loaded");
                Ok(FetchOutcome::Loaded {
                    page: page.page_number,
                    items: count,
                })
            }
            Err(err) => {
                warn!(key = %key, error = %err, "First page fetch failed");
                entry.fail(&err);
                Err(err)
            }
        }
    }

    /// Fetch and append the next page for `key`
    ///
    /// Only runs from `Ready` with a next page pending; any other state
    /// returns `FetchOutcome::Skipped` without calling `request_fn`.
    pub async fn fetch_next_page<F, Fut>(&self, key: &CacheKey, request_fn: F) -> Result<FetchOutcome>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let (requested, generation) = {
            let mut inner = self.inner.lock().await;
            let Some(entry) = inner.entries.get_mut(key) else {
                return Ok(FetchOutcome::Skipped);
            };
            if entry.state != FetchState::Ready {
                debug!(key = %key, state = ?entry.state, "Fetch-more skipped");
                return Ok(FetchOutcome::Skipped);
            }
            let Some(next) = entry.next_page else {
                return Ok(FetchOutcome::Skipped);
            };
            entry.state = FetchState::FetchingMore;
            (next, entry.generation)
        };

        debug!(key = %key, page = requested, "Fetching next page");
        let result = request_fn(requested).await.and_then(|page| {
            page.validate()?;
            if page.page_number != requested {
                return Err(SdkError::InvalidResponse(format!(
                    "asked for page {}, got page {}",
                    requested, page.page_number
                )));
            }
            Ok(page)
        });

        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entries.get_mut(key) else {
            return Ok(FetchOutcome::Stale);
        };
        if entry.generation != generation {
            debug!(key = %key, generation, "Key re-fetched, dropping page {}", requested);
            return Ok(FetchOutcome::Stale);
        }

        match result {
            Ok(page) => {
                let next_page = page.next_page_param();
                let count = page.items.len();
                entry.items.extend(page.items);
                entry.next_page = next_page;
                entry.total_count = page.total_count;
                entry.pages_loaded += 1;
                entry.state = FetchState::Ready;
                Ok(FetchOutcome::Loaded {
                    page: requested,
                    items: count,
                })
            }
            Err(err) => {
                warn!(key = %key, page = requested, error = %err, "Next page fetch failed");
                entry.fail(&err);
                Err(err)
            }
        }
    }

    /// Current state of `key` (`Idle` when unknown)
    pub async fn state(&self, key: &CacheKey) -> FetchState {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(key)
            .map(|entry| entry.state)
            .unwrap_or_default()
    }

    pub async fn snapshot(&self, key: &CacheKey) -> Option<CacheSnapshot<T>> {
        let inner = self.inner.lock().await;
        inner.entries.get(key).map(|entry| CacheSnapshot {
            key: key.clone(),
            state: entry.state,
            items: entry.items.clone(),
            next_page: entry.next_page,
            total_count: entry.total_count,
            pages_loaded: entry.pages_loaded,
            last_error: entry.last_error.clone(),
        })
    }

    pub async fn has_more(&self, key: &CacheKey) -> bool {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(key)
            .is_some_and(|entry| entry.next_page.is_some())
    }

    /// Return a failed entry that still holds pages to `Ready`
    pub async fn clear_error(&self, key: &CacheKey) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.entries.get_mut(key) {
            Some(entry) if entry.state == FetchState::Error && entry.pages_loaded > 0 => {
                entry.state = FetchState::Ready;
                entry.last_error = None;
                true
            }
            _ => false,
        }
    }

    /// Drop one entry; an in-flight response for it becomes stale
    pub async fn evict(&self, key: &CacheKey) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.active.as_ref().is_some_and(|(k, _)| k == key) {
            inner.active = None;
        }
        inner.entries.remove(key).is_some()
    }

    /// Drop every entry of a namespace
    pub async fn invalidate(&self, namespace: &str) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len();
        inner.entries.retain(|key, _| key.namespace != namespace);
        if inner
            .active
            .as_ref()
            .is_some_and(|(k, _)| k.namespace == namespace)
        {
            inner.active = None;
        }
        let removed = before - inner.entries.len();
        debug!(namespace, removed, "Invalidated cache namespace");
        removed
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.active = None;
    }

    /// Key of the most recent first-page request
    pub async fn active_key(&self) -> Option<CacheKey> {
        let inner = self.inner.lock().await;
        inner.active.as_ref().map(|(key, _)| key.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grant_api_client::ApiError;
    use tokio::sync::oneshot;

    fn key(name: &str) -> CacheKey {
        CacheKey::new("test", name)
    }

    /// Page `n` of a 3-page stream of 10 items per page
    fn ok_page(n: u32, total_pages: u32) -> Result<Page<u32>> {
        let start = (n - 1) * 10;
        Ok(Page {
            items: (start..start + 10).collect(),
            page_number: n,
            page_size: 10,
            total_count: total_pages as u64 * 10,
            total_pages,
        })
    }

    fn server_error() -> Result<Page<u32>> {
        Err(SdkError::Network(ApiError::Server {
            status: 503,
            message: "unavailable".into(),
        }))
    }

    #[tokio::test]
    async fn test_first_page_then_more_until_exhausted() {
        let fetcher = PaginatedFetcher::new();
        let k = key("q");

        let outcome = fetcher.fetch_first_page(&k, |p| async move { ok_page(p, 3) }).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Loaded { page: 1, items: 10 });
        assert!(fetcher.has_more(&k).await);

        fetcher.fetch_next_page(&k, |p| async move { ok_page(p, 3) }).await.unwrap();
        fetcher.fetch_next_page(&k, |p| async move { ok_page(p, 3) }).await.unwrap();

        let snapshot = fetcher.snapshot(&k).await.unwrap();
        assert_eq!(snapshot.len(), 30);
        assert_eq!(snapshot.items[..3], [0, 1, 2]);
        assert_eq!(snapshot.items[29], 29);
        assert!(!snapshot.has_more());
        assert_eq!(snapshot.pages_loaded, 3);
    }

    #[tokio::test]
    async fn test_fetch_more_on_exhausted_key_is_noop() {
        let fetcher = PaginatedFetcher::new();
        let k = key("single");
        fetcher.fetch_first_page(&k, |p| async move { ok_page(p, 1) }).await.unwrap();

        // A request for page 2 of a 1-page stream would fail validation
        for _ in 0..3 {
            let outcome = fetcher
                .fetch_next_page(&k, |p| async move { ok_page(p, 1) })
                .await
                .unwrap();
            assert_eq!(outcome, FetchOutcome::Skipped);
        }
        assert_eq!(fetcher.snapshot(&k).await.unwrap().len(), 10);
        assert_eq!(fetcher.state(&k).await, FetchState::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_more_is_guarded() {
        let fetcher = PaginatedFetcher::new();
        let k = key("guard");
        fetcher.fetch_first_page(&k, |p| async move { ok_page(p, 3) }).await.unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let first = fetcher.fetch_next_page(&k, |p| async move {
            let _ = rx.await;
            ok_page(p, 3)
        });
        let second = async {
            let outcome = fetcher
                .fetch_next_page(&k, |p| async move { ok_page(p, 3) })
                .await;
            let _ = tx.send(());
            outcome
        };

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap(), FetchOutcome::Loaded { page: 2, items: 10 });
        assert_eq!(second.unwrap(), FetchOutcome::Skipped);
        assert_eq!(fetcher.snapshot(&k).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_superseded_first_page_is_discarded() {
        let fetcher = PaginatedFetcher::new();
        let (old, new) = (key("old"), key("new"));

        let (tx, rx) = oneshot::channel::<()>();
        let slow = fetcher.fetch_first_page(&old, |p| async move {
            let _ = rx.await;
            ok_page(p, 2)
        });
        let fast = async {
            let outcome = fetcher
                .fetch_first_page(&new, |p| async move { ok_page(p, 1) })
                .await;
            let _ = tx.send(());
            outcome
        };

        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap(), FetchOutcome::Stale);
        assert!(matches!(fast.unwrap(), FetchOutcome::Loaded { .. }));
        assert_eq!(fetcher.state(&old).await, FetchState::Idle);
        assert!(fetcher.snapshot(&old).await.unwrap().is_empty());
        assert_eq!(fetcher.active_key().await, Some(new));
    }

    #[tokio::test]
    async fn test_refetch_replaces_and_drops_in_flight_next_page() {
        let fetcher = PaginatedFetcher::new();
        let k = key("refetch");
        fetcher.fetch_first_page(&k, |p| async move { ok_page(p, 3) }).await.unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let more = fetcher.fetch_next_page(&k, |p| async move {
            let _ = rx.await;
            ok_page(p, 3)
        });
        let refetch = async {
            let outcome = fetcher
                .fetch_first_page(&k, |p| async move { ok_page(p, 2) })
                .await;
            let _ = tx.send(());
            outcome
        };

        let (more, refetch) = tokio::join!(more, refetch);
        assert_eq!(more.unwrap(), FetchOutcome::Stale);
        assert!(matches!(refetch.unwrap(), FetchOutcome::Loaded { page: 1, .. }));

        let snapshot = fetcher.snapshot(&k).await.unwrap();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(snapshot.total_count, 20);
    }

    #[tokio::test]
    async fn test_failed_fetch_more_keeps_pages() {
        let fetcher = PaginatedFetcher::new();
        let k = key("fail");
        fetcher.fetch_first_page(&k, |p| async move { ok_page(p, 3) }).await.unwrap();

        let err = fetcher
            .fetch_next_page(&k, |_| async move { server_error() })
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Network(_)));

        let snapshot = fetcher.snapshot(&k).await.unwrap();
        assert_eq!(snapshot.state, FetchState::Error);
        assert_eq!(snapshot.len(), 10);
        assert!(snapshot.last_error.is_some());

        // Error blocks fetch-more until acknowledged
        let outcome = fetcher.fetch_next_page(&k, |p| async move { ok_page(p, 3) }).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Skipped);

        assert!(fetcher.clear_error(&k).await);
        fetcher.fetch_next_page(&k, |p| async move { ok_page(p, 3) }).await.unwrap();
        assert_eq!(fetcher.snapshot(&k).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_invalid_page_rejected() {
        let fetcher = PaginatedFetcher::new();
        let k = key("invalid");

        let err = fetcher
            .fetch_first_page(&k, |_| async move { ok_page(4, 3) })
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::InvalidResponse(_)));
        assert_eq!(fetcher.state(&k).await, FetchState::Error);
    }

    #[tokio::test]
    async fn test_evict_and_invalidate() {
        let fetcher = PaginatedFetcher::new();
        let a = CacheKey::new("search", "a");
        let b = CacheKey::new("search", "b");
        let c = CacheKey::new("recipients", "c");
        for k in [&a, &b, &c] {
            fetcher.fetch_first_page(k, |p| async move { ok_page(p, 1) }).await.unwrap();
        }
        assert_eq!(fetcher.len().await, 3);

        assert!(fetcher.evict(&a).await);
        assert!(!fetcher.evict(&a).await);
        assert_eq!(fetcher.invalidate("search").await, 1);
        assert_eq!(fetcher.len().await, 1);
        assert_eq!(fetcher.active_key().await, Some(c));

        fetcher.clear().await;
        assert!(fetcher.is_empty().await);
        assert_eq!(fetcher.active_key().await, None);
    }
}
