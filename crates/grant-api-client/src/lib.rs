//! Rust client for the grant research REST API
//!
//! # Example
//!
//! ```rust,no_run
//! use grant_api_client::{ApiClient, ApiConfig, GrantApi, Pagination, SearchRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ApiConfig {
//!     base_url: "http://localhost:4000".into(),
//!     ..Default::default()
//! })?;
//!
//! let response = client
//!     .search(&SearchRequest {
//!         search_terms: Default::default(),
//!         filters: Default::default(),
//!         sort_config: Default::default(),
//!         pagination: Pagination { page: 1, page_size: 10 },
//!         user_id: None,
//!     })
//!     .await?;
//! println!("{} grants", response.data.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod types;

// Re-export main types
pub use api::GrantApi;
pub use client::ApiClient;
pub use error::{ApiError, Result};
pub use types::*;
