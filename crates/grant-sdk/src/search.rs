//! Search parameter construction
//!
//! `SearchRequestBuilder` turns free-text terms, a `FilterState` and a sort
//! into `SearchParams`. Params carry a cache key derived from their
//! canonical JSON form, so semantically equal searches share one cache
//! entry regardless of how the state was assembled.

use crate::cache::{CacheKey, SEARCH_NAMESPACE};
use crate::error::{Result, SdkError};
use crate::filter::{ActiveFilter, FilterLimits, FilterState};
use grant_api_client::{Pagination, SearchRequest, SortConfig, SortDirection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Search boxes that accept free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermFacet {
    Recipient,
    Institute,
    Grant,
}

impl TermFacet {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermFacet::Recipient => "recipient",
            TermFacet::Institute => "institute",
            TermFacet::Grant => "grant",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "recipient" => Ok(TermFacet::Recipient),
            "institute" => Ok(TermFacet::Institute),
            "grant" => Ok(TermFacet::Grant),
            other => Err(SdkError::Validation(format!("unknown search facet '{}'", other))),
        }
    }
}

impl fmt::Display for TermFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical form of one search submission
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    search_terms: BTreeMap<TermFacet, String>,
    filters: FilterState,
    sort_config: SortConfig,
    #[serde(skip)]
    limits: FilterLimits,
    #[serde(skip)]
    key: CacheKey,
}

impl PartialEq for SearchParams {
    fn eq(&self, other: &Self) -> bool {
        self.search_terms == other.search_terms
            && self.filters == other.filters
            && self.sort_config == other.sort_config
    }
}

impl SearchParams {
    pub fn search_terms(&self) -> &BTreeMap<TermFacet, String> {
        &self.search_terms
    }

    /// Filters with full-domain ranges already dropped
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort_config(&self) -> &SortConfig {
        &self.sort_config
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.key
    }

    pub fn active_filters(&self) -> Vec<ActiveFilter> {
        self.filters.active_filters(&self.limits)
    }

    /// Number of terms plus restrictive filter entries
    pub fn query_weight(&self) -> usize {
        self.search_terms.len() + self.active_filters().len()
    }

    /// Wire payload for one page of this search
    pub fn to_request(&self, page: u32, page_size: u32, user_id: Option<i64>) -> SearchRequest {
        SearchRequest {
            search_terms: self
                .search_terms
                .iter()
                .map(|(facet, term)| (facet.as_str().to_string(), term.clone()))
                .collect(),
            filters: self.filters.to_wire(&self.limits),
            sort_config: self.sort_config.clone(),
            pagination: Pagination { page, page_size },
            user_id,
        }
    }
}

/// Builds `SearchParams` against a fixed set of domain limits
#[derive(Debug, Clone, Default)]
pub struct SearchRequestBuilder {
    limits: FilterLimits,
}

impl SearchRequestBuilder {
    pub fn new(limits: FilterLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FilterLimits {
        &self.limits
    }

    /// Validate and canonicalize one search submission
    ///
    /// Blank terms are dropped; a repeated facet keeps its last term.
    /// Fails with `SdkError::Validation` on inverted ranges.
    pub fn build<I, S>(&self, terms: I, filters: &FilterState, sort: SortConfig) -> Result<SearchParams>
    where
        I: IntoIterator<Item = (TermFacet, S)>,
        S: AsRef<str>,
    {
        filters.validate()?;

        let search_terms: BTreeMap<TermFacet, String> = terms
            .into_iter()
            .filter_map(|(facet, term)| {
                let term = term.as_ref().trim();
                (!term.is_empty()).then(|| (facet, term.to_string()))
            })
            .collect();

        let field = sort.field.trim();
        let sort_config = if field.is_empty() {
            SortConfig {
                direction: sort.direction,
                ..SortConfig::default()
            }
        } else {
            SortConfig {
                field: field.to_string(),
                direction: sort.direction,
            }
        };

        let mut params = SearchParams {
            search_terms,
            filters: filters.normalized(&self.limits),
            sort_config,
            limits: self.limits,
            key: CacheKey::new(SEARCH_NAMESPACE, ""),
        };
        let canonical = serde_json::to_string(&params)?;
        params.key = CacheKey::new(SEARCH_NAMESPACE, &canonical);
        Ok(params)
    }

    /// Build with the default sort (newest first)
    pub fn build_default_sort<I, S>(&self, terms: I, filters: &FilterState) -> Result<SearchParams>
    where
        I: IntoIterator<Item = (TermFacet, S)>,
        S: AsRef<str>,
    {
        self.build(terms, filters, SortConfig::default())
    }
}

/// Parse `field:direction` (direction optional, defaults to descending)
pub fn parse_sort(spec: &str) -> Result<SortConfig> {
    let (field, direction) = match spec.split_once(':') {
        Some((field, direction)) => (field, Some(direction)),
        None => (spec, None),
    };
    let direction = match direction.map(|d| d.trim().to_lowercase()) {
        None => SortDirection::Desc,
        Some(d) if d == "desc" => SortDirection::Desc,
        Some(d) if d == "asc" => SortDirection::Asc,
        Some(d) => return Err(SdkError::Validation(format!("unknown sort direction '{}'", d))),
    };
    Ok(SortConfig {
        field: field.trim().to_string(),
        direction,
    })
}
