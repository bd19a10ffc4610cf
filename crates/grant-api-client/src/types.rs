//! Types for the grants REST API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL for the grants HTTP API
    pub base_url: String,
    /// Optional API key sent as a bearer token
    pub api_key: Option<String>,
    /// Request timeout in milliseconds (default: 15000)
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            api_key: None,
            timeout_ms: 15_000,
        }
    }
}

/// Bookmarkable entity kinds, used as the `{entityType}` path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Grant,
    Recipient,
    Institute,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Recipient => "recipient",
            Self::Institute => "institute",
        }
    }

    /// Parse from the path segment form
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "grant" | "grants" => Some(Self::Grant),
            "recipient" | "recipients" => Some(Self::Recipient),
            "institute" | "institutes" => Some(Self::Institute),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A research grant as returned by `POST /search`
///
/// Every field besides the id is optional: the analytics layer discards
/// records with missing or malformed values instead of failing the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub grant_id: i64,
    #[serde(default)]
    pub ref_number: Option<String>,
    #[serde(default)]
    pub agreement_title_en: Option<String>,
    #[serde(default)]
    pub agreement_value: Option<f64>,
    #[serde(default)]
    pub agreement_start_date: Option<String>,
    #[serde(default)]
    pub agreement_end_date: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<i64>,
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub research_organization_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Funding agency abbreviation (NSERC, SSHRC, CIHR, ...)
    #[serde(default)]
    pub org: Option<String>,
}

/// A grant recipient as returned by `GET /recipients`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub recipient_id: i64,
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub research_organization_name: Option<String>,
    #[serde(default)]
    pub recipient_type: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub total_funding: Option<f64>,
    #[serde(default)]
    pub grant_count: Option<u64>,
    #[serde(default)]
    pub latest_grant_date: Option<String>,
}

/// A research institute as returned by `GET /institutes`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Institute {
    pub institute_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub institute_type: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub recipient_count: Option<u64>,
    #[serde(default)]
    pub grant_count: Option<u64>,
    #[serde(default)]
    pub total_funding: Option<f64>,
    #[serde(default)]
    pub latest_grant_date: Option<String>,
}

/// Facet values offered by `GET /search/filter-options`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub agencies: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub provinces: Vec<String>,
    #[serde(default)]
    pub cities: Vec<String>,
}

// ============================================================================
// Search request / response
// ============================================================================

/// Inclusive integer year range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRangeWire {
    pub start: i32,
    pub end: i32,
}

/// Inclusive agreement value range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRangeWire {
    pub min: f64,
    pub max: f64,
}

/// Inclusive date range as ISO-8601 dates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeWire {
    pub from: String,
    pub to: String,
}

/// Filters as transmitted: only restrictive facets are present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_range: Option<YearRangeWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_range: Option<ValueRangeWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRangeWire>,
    #[serde(default)]
    pub agencies: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub provinces: Vec<String>,
    #[serde(default)]
    pub cities: Vec<String>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Sort configuration
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: String,
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            field: "date".to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Page selector sent alongside a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

/// Body of `POST /search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free-text terms keyed by facet name; empty terms are never present
    pub search_terms: BTreeMap<String, String>,
    pub filters: SearchFilters,
    pub sort_config: SortConfig,
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// Pagination metadata shared by list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

/// Metadata block of `POST /search`
///
/// Paging fields are only present on paginated deployments; the plain
/// server answers with `{count, filters, searchTerms}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Rows in this response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl SearchMetadata {
    /// Paging metadata, when all four paging fields were sent
    pub fn paging(&self) -> Option<PageMetadata> {
        Some(PageMetadata {
            page: self.page?,
            page_size: self.page_size?,
            total_count: self.total_count?,
            total_pages: self.total_pages?,
        })
    }
}

impl From<PageMetadata> for SearchMetadata {
    fn from(metadata: PageMetadata) -> Self {
        Self {
            page: Some(metadata.page),
            page_size: Some(metadata.page_size),
            total_count: Some(metadata.total_count),
            total_pages: Some(metadata.total_pages),
            count: None,
        }
    }
}

/// Response from `POST /search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<Grant>,
    #[serde(default)]
    pub metadata: Option<SearchMetadata>,
}

/// Response from `GET /recipients`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientListResponse {
    #[serde(default)]
    pub data: Vec<Recipient>,
    pub metadata: PageMetadata,
}

/// Response from `GET /institutes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstituteListResponse {
    #[serde(default)]
    pub data: Vec<Institute>,
    pub metadata: PageMetadata,
}

// ============================================================================
// Popular searches
// ============================================================================

/// Which search box a popular term was typed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchCategory {
    Grant,
    Recipient,
    Institute,
}

impl SearchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Recipient => "recipient",
            Self::Institute => "institute",
        }
    }
}

/// Options for `GET /search/popular`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopularSearchQuery {
    /// Inclusive start date (YYYY-MM-DD)
    pub from: String,
    /// Inclusive end date (YYYY-MM-DD)
    pub to: String,
    pub category: Option<SearchCategory>,
    pub page: u32,
    pub limit: u32,
}

/// A single popular term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularTerm {
    pub text: String,
    #[serde(default)]
    pub count: u64,
}

/// Response from `GET /search/popular`, one list per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopularSearchResponse {
    #[serde(default)]
    pub grant: Vec<PopularTerm>,
    #[serde(default)]
    pub recipient: Vec<PopularTerm>,
    #[serde(default)]
    pub institute: Vec<PopularTerm>,
    #[serde(default)]
    pub metadata: Option<PageMetadata>,
}

impl PopularSearchResponse {
    /// Parse a body with categories at the top level or wrapped in
    /// `results` / `data`
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        let wrapper = ["results", "data"]
            .into_iter()
            .find(|key| value.get(key).is_some_and(|v| v.is_object()));

        match wrapper {
            Some(key) => {
                let mut inner = value[key].clone();
                if let (Some(fields), Some(metadata)) = (inner.as_object_mut(), value.get("metadata")) {
                    fields
                        .entry("metadata")
                        .or_insert_with(|| metadata.clone());
                }
                serde_json::from_value(inner)
            }
            None => serde_json::from_value(value),
        }
    }
}

// ============================================================================
// Bookmarks
// ============================================================================

/// Body of bookmark create/delete calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRequest {
    pub user_id: i64,
}

/// Body the server attaches to 409 responses
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ConflictBody {
    #[serde(default)]
    pub retryable: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_metadata_paging_fields() {
        let plain: SearchResponse = serde_json::from_str(
            r#"{"message":"Success","data":[{"grant_id":1}],"metadata":{"count":1,"filters":{},"searchTerms":{}}}"#,
        )
        .unwrap();
        let metadata = plain.metadata.unwrap();
        assert_eq!(metadata.count, Some(1));
        assert_eq!(metadata.paging(), None);

        let partial = SearchMetadata {
            page: Some(1),
            total_count: Some(5),
            ..Default::default()
        };
        assert_eq!(partial.paging(), None);

        let paged: SearchMetadata = serde_json::from_str(
            r#"{"page":2,"pageSize":10,"totalCount":12,"totalPages":2,"count":2}"#,
        )
        .unwrap();
        assert_eq!(paged.paging().map(|p| p.total_pages), Some(2));
    }

    #[test]
    fn test_institute_type_field() {
        let institute: Institute =
            serde_json::from_str(r#"{"institute_id": 4, "name": "McGill", "type": "University"}"#).unwrap();
        assert_eq!(institute.institute_type.as_deref(), Some("University"));
        assert_eq!(institute.total_funding, None);
    }

    #[test]
    fn test_search_request_serialization() {
        let request = SearchRequest {
            search_terms: BTreeMap::from([("recipient".to_string(), "smith".to_string())]),
            filters: SearchFilters {
                agencies: vec!["NSERC".into()],
                ..Default::default()
            },
            sort_config: SortConfig::default(),
            pagination: Pagination { page: 2, page_size: 10 },
            user_id: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["searchTerms"]["recipient"], "smith");
        assert_eq!(json["sortConfig"]["direction"], "desc");
        assert_eq!(json["pagination"]["pageSize"], 10);
        assert!(json["filters"].get("valueRange").is_none());
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn test_grant_tolerates_missing_fields() {
        let grant: Grant = serde_json::from_str(r#"{"grant_id": 7, "org": "CIHR"}"#).unwrap();
        assert_eq!(grant.grant_id, 7);
        assert_eq!(grant.org.as_deref(), Some("CIHR"));
        assert!(grant.agreement_value.is_none());
    }

    #[test]
    fn test_popular_response_shapes() {
        let flat = PopularSearchResponse::from_value(serde_json::json!({
            "grant": [{"text": "ocean", "count": 3}]
        }))
        .unwrap();
        let wrapped = PopularSearchResponse::from_value(serde_json::json!({
            "results": {"grant": [{"text": "ocean", "count": 3}]},
            "metadata": {"page": 1, "pageSize": 10, "totalCount": 1, "totalPages": 1}
        }))
        .unwrap();

        assert_eq!(flat.grant, wrapped.grant);
        assert!(flat.metadata.is_none());
        assert_eq!(wrapped.metadata.map(|m| m.total_pages), Some(1));
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!(EntityType::parse("Grants"), Some(EntityType::Grant));
        assert_eq!(EntityType::parse("institute"), Some(EntityType::Institute));
        assert_eq!(EntityType::parse("program"), None);
        assert_eq!(EntityType::Recipient.to_string(), "recipient");
    }
}
