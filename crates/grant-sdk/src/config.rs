//! SDK configuration

use crate::error::{Result, SdkError};
use crate::filter::FilterLimits;
use crate::retry::RetryPolicy;
use grant_api_client::ApiConfig;
use std::time::Duration;

/// Configuration for a [`GrantClient`](crate::GrantClient)
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Transport settings
    pub api: ApiConfig,
    /// Wait before retrying a transient conflict (default: 500)
    pub retry_backoff_ms: u64,
    /// Grants per search page (default: 10)
    pub search_page_size: u32,
    /// Recipients per directory page (default: 20)
    pub recipients_page_size: u32,
    /// Institutes per directory page (default: 20)
    pub institutes_page_size: u32,
    /// Terms per popular-searches page (default: 10)
    pub popular_page_size: u32,
    /// Domain bounds for range filters
    pub limits: FilterLimits,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            retry_backoff_ms: 500,
            search_page_size: 10,
            recipients_page_size: 20,
            institutes_page_size: 20,
            popular_page_size: 10,
            limits: FilterLimits::default(),
        }
    }
}

impl SdkConfig {
    /// Configuration for interactive browsing (small pages, short timeout)
    pub fn for_interactive() -> Self {
        Self {
            api: ApiConfig {
                timeout_ms: 10_000,
                ..ApiConfig::default()
            },
            ..Self::default()
        }
    }

    /// Configuration for exports and reports (large pages, patient timeout)
    pub fn for_bulk() -> Self {
        Self {
            api: ApiConfig {
                timeout_ms: 60_000,
                ..ApiConfig::default()
            },
            retry_backoff_ms: 1_000,
            search_page_size: 100,
            recipients_page_size: 100,
            institutes_page_size: 100,
            popular_page_size: 50,
            limits: FilterLimits::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(SdkError::Config("base_url must not be empty".into()));
        }
        if self.api.timeout_ms == 0 {
            return Err(SdkError::Config("timeout_ms must be positive".into()));
        }
        for (name, size) in [
            ("search_page_size", self.search_page_size),
            ("recipients_page_size", self.recipients_page_size),
            ("institutes_page_size", self.institutes_page_size),
            ("popular_page_size", self.popular_page_size),
        ] {
            if size == 0 {
                return Err(SdkError::Config(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}
