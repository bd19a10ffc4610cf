//! Paginated result caching
//!
//! - `keys`: stable cache keys from canonical request parameters
//! - `page`: server page shape and its paging contract
//! - `fetcher`: per-key merged pages with fetch-more and stale detection

pub mod fetcher;
pub mod keys;
pub mod page;

pub use fetcher::{CacheSnapshot, FetchOutcome, FetchState, PaginatedFetcher};
pub use keys::{
    CacheKey, INSTITUTES_NAMESPACE, POPULAR_NAMESPACE, RECIPIENTS_NAMESPACE, SEARCH_NAMESPACE,
};
pub use page::Page;
