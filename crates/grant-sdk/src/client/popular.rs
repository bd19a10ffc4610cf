//! Popular search terms

use crate::cache::{CacheKey, Page, POPULAR_NAMESPACE};
use crate::error::{Result, SdkError};
use chrono::NaiveDate;
use grant_api_client::{PopularSearchQuery, PopularSearchResponse, PopularTerm, SearchCategory};
use serde::Serialize;

/// A term users searched for, with its category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularSearch {
    pub text: String,
    pub count: u64,
    pub category: SearchCategory,
}

/// Date window and optional category for popular searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopularSearchParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub category: Option<SearchCategory>,
}

impl PopularSearchParams {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            category: None,
        }
    }

    pub fn with_category(mut self, category: SearchCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.from > self.to {
            return Err(SdkError::Validation(format!(
                "popular searches window starts {} after it ends {}",
                self.from, self.to
            )));
        }
        Ok(())
    }

    pub fn cache_key(&self, limit: u32) -> CacheKey {
        CacheKey::new(
            POPULAR_NAMESPACE,
            &format!(
                "from={}&to={}&category={}&limit={}",
                self.from,
                self.to,
                self.category.map(|c| c.as_str()).unwrap_or("all"),
                limit
            ),
        )
    }

    pub(crate) fn to_query(self, page: u32, limit: u32) -> PopularSearchQuery {
        PopularSearchQuery {
            from: self.from.format("%Y-%m-%d").to_string(),
            to: self.to.format("%Y-%m-%d").to_string(),
            category: self.category,
            page,
            limit,
        }
    }
}

/// Flatten a response into one page, categories in grant, recipient,
/// institute order
///
/// `limit` applies per category, so an all-category page holds up to
/// three times as many terms.
pub(crate) fn page_from_response(
    response: PopularSearchResponse,
    params: &PopularSearchParams,
    page: u32,
    limit: u32,
) -> Page<PopularSearch> {
    let categories = [
        (SearchCategory::Grant, response.grant),
        (SearchCategory::Recipient, response.recipient),
        (SearchCategory::Institute, response.institute),
    ];
    let category_count = if params.category.is_some() { 1 } else { categories.len() as u32 };

    let items: Vec<PopularSearch> = categories
        .into_iter()
        .filter(|(category, _)| params.category.map_or(true, |wanted| wanted == *category))
        .flat_map(|(category, terms)| {
            terms
                .into_iter()
                .map(move |PopularTerm { text, count }| PopularSearch {
                    text,
                    count,
                    category,
                })
        })
        .collect();

    match response.metadata {
        Some(metadata) => Page {
            items,
            page_number: metadata.page,
            page_size: metadata.page_size.max(limit).saturating_mul(category_count),
            total_count: metadata.total_count,
            total_pages: metadata.total_pages,
        },
        None => Page::complete(items, page, limit.saturating_mul(category_count)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grant_api_client::PageMetadata;

    fn term(text: &str, count: u64) -> PopularTerm {
        PopularTerm {
            text: text.to_string(),
            count,
        }
    }

    fn window() -> PopularSearchParams {
        PopularSearchParams::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    #[test]
    fn test_flatten_all_categories() {
        let response = PopularSearchResponse {
            grant: vec![term("ocean", 5)],
            recipient: vec![term("smith", 3), term("lee", 2)],
            institute: vec![],
            metadata: None,
        };
        let page = page_from_response(response, &window(), 1, 10);

        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].category, SearchCategory::Grant);
        assert_eq!(page.items[2].text, "lee");
        assert!(page.validate().is_ok());
        assert_eq!(page.next_page_param(), None);
    }

    #[test]
    fn test_single_category_with_metadata() {
        let response = PopularSearchResponse {
            grant: vec![term("ignored", 1)],
            institute: vec![term("mcgill", 9)],
            metadata: Some(PageMetadata {
                page: 1,
                page_size: 1,
                total_count: 4,
                total_pages: 4,
            }),
            ..Default::default()
        };
        let params = window().with_category(SearchCategory::Institute);
        let page = page_from_response(response, &params, 1, 1);

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].text, "mcgill");
        assert_eq!(page.next_page_param(), Some(2));
    }

    #[test]
    fn test_oversized_page_size_saturates() {
        let response = PopularSearchResponse {
            grant: vec![term("ocean", 5)],
            recipient: vec![term("smith", 3)],
            institute: vec![term("mcgill", 1)],
            metadata: Some(PageMetadata {
                page: 1,
                page_size: u32::MAX,
                total_count: 3,
                total_pages: 1,
            }),
        };
        let page = page_from_response(response, &window(), 1, 10);

        assert_eq!(page.page_size, u32::MAX);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.next_page_param(), None);

        let unpaged = PopularSearchResponse {
            grant: vec![term("ocean", 5)],
            ..Default::default()
        };
        assert_eq!(page_from_response(unpaged, &window(), 1, u32::MAX).page_size, u32::MAX);
    }

    #[test]
    fn test_window_validation_and_keys() {
        let inverted = PopularSearchParams::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(inverted.validate().is_err());

        let all = window();
        let grants_only = window().with_category(SearchCategory::Grant);
        assert_ne!(all.cache_key(10), grants_only.cache_key(10));
        assert_ne!(all.cache_key(10), all.cache_key(20));
        assert_eq!(all.to_query(2, 10).from, "2024-01-01");
    }
}
