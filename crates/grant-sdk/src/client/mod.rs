//! High-level client
//!
//! - `GrantClient`: search, recipients, popular searches, bookmarks and
//!   analytics over one transport
//! - `popular`: popular-search params and page flattening

mod grant_client;
mod popular;

pub use grant_client::GrantClient;
pub use popular::{PopularSearch, PopularSearchParams};
