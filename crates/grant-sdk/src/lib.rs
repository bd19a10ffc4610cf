//! Grant SDK - client-side data layer for grant research browsing
//!
//! Everything between the UI and the grants REST API: search state,
//! paginated result caches, optimistic bookmarks and derived analytics.
//!
//! # Architecture
//!
//! - **Filters**: `FilterState` holds range and facet filters as immutable
//!   values; `SearchRequestBuilder` turns them into a normalized
//!   `SearchParams` whose cache key identifies the search
//! - **Caching**: `PaginatedFetcher` merges pages per key, guards
//!   fetch-more and drops responses for superseded searches
//! - **Mutations**: `BookmarkCoordinator` applies toggles immediately and
//!   rolls each one back to its own snapshot if the server rejects it
//! - **Retry**: a `409` marked retryable is tried once more after a short
//!   wait
//!
//! # Example
//!
//! ```rust,no_run
//! use grant_sdk::{FilterState, GrantClient, SdkConfig, TermFacet};
//!
//! # async fn example() -> grant_sdk::Result<()> {
//! let client = GrantClient::new(SdkConfig::for_interactive())?.with_user(Some(42));
//!
//! let filters = FilterState::new().with_country("Canada");
//! let params = client.build_search(
//!     [(TermFacet::Institute, "toronto")],
//!     &filters,
//!     Default::default(),
//! )?;
//! client.search(&params).await?;
//!
//! let analytics = client.analytics(&params).await;
//! println!("{}", analytics.specialization.text);
//! # Ok(())
//! # }
//! ```

// Derived metrics
pub mod analytics;

// Optimistic bookmark mutations
pub mod bookmarks;

// Paginated result caching
pub mod cache;

// High-level client
pub mod client;

// Configuration
pub mod config;

// Error types
pub mod error;

// Filter state
pub mod filter;

// In-memory API for tests and demos
pub mod mock;

// Transient conflict retry
pub mod retry;

// Search request construction
pub mod search;

// Re-export client types
pub use client::{GrantClient, PopularSearch, PopularSearchParams};

// Re-export cache types
pub use cache::{CacheKey, CacheSnapshot, FetchOutcome, FetchState, Page, PaginatedFetcher};

// Re-export filter and search types
pub use filter::{ActiveFilter, DateRange, Facet, FilterLimits, FilterState, ValueRange, YearRange};
pub use search::{parse_sort, SearchParams, SearchRequestBuilder, TermFacet};

// Re-export mutation and retry types
pub use bookmarks::{BookmarkCoordinator, BookmarkEvent, BookmarkScope, EntityId, UserId};
pub use retry::{RetryPolicy, DEFAULT_RETRY_BACKOFF};

// Re-export analytics
pub use analytics::AnalyticsSnapshot;

pub use config::SdkConfig;

// Re-export error types
pub use error::{Result, SdkError};

// Re-export wire types from the transport crate
pub use grant_api_client::{
    ApiConfig, ApiError, EntityType, FilterOptions, Grant, GrantApi, Institute, Recipient,
    SearchCategory, SortConfig, SortDirection,
};
