//! One server page of a result stream

use crate::error::{Result, SdkError};
use grant_api_client::PageMetadata;

/// A page as returned by a list endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn from_metadata(items: Vec<T>, metadata: PageMetadata) -> Self {
        Self {
            items,
            page_number: metadata.page,
            page_size: metadata.page_size,
            total_count: metadata.total_count,
            total_pages: metadata.total_pages,
        }
    }

    /// A response without paging metadata: the whole result in one page
    pub fn complete(items: Vec<T>, page_number: u32, page_size: u32) -> Self {
        let len = items.len();
        Self {
            items,
            page_number,
            page_size: page_size.max(len as u32),
            total_count: len as u64,
            total_pages: page_number,
        }
    }

    /// Check the paging contract
    ///
    /// An empty result may report `total_pages == 0` for page 1.
    pub fn validate(&self) -> Result<()> {
        if self.page_number == 0 {
            return Err(SdkError::InvalidResponse("page number must start at 1".into()));
        }
        let empty_result = self.total_pages == 0 && self.page_number == 1 && self.items.is_empty();
        if self.page_number > self.total_pages && !empty_result {
            return Err(SdkError::InvalidResponse(format!(
                "page {} beyond total pages {}",
                self.page_number, self.total_pages
            )));
        }
        if self.items.len() > self.page_size as usize {
            return Err(SdkError::InvalidResponse(format!(
                "{} items exceed page size {}",
                self.items.len(),
                self.page_size
            )));
        }
        Ok(())
    }

    /// Page to request next, `None` once exhausted
    pub fn next_page_param(&self) -> Option<u32> {
        (self.page_number < self.total_pages).then(|| self.page_number + 1)
    }
}
