//! Cache key definitions
//!
//! Keys identify one merged result stream (a search, the recipient list,
//! a popular-searches window). Two keys are equal iff their namespace and
//! canonical parameter serialization are equal.

use sha2::{Digest, Sha256};
use std::fmt;

/// Namespace for grant search results
pub const SEARCH_NAMESPACE: &str = "search";
/// Namespace for the recipient directory
pub const RECIPIENTS_NAMESPACE: &str = "recipients";
/// Namespace for the institute directory
pub const INSTITUTES_NAMESPACE: &str = "institutes";
/// Namespace for popular search terms
pub const POPULAR_NAMESPACE: &str = "popular";

/// Cache key for a paginated result stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Result stream kind
    pub namespace: String,
    /// Hash of the canonical parameters
    pub params_hash: String,
}

impl CacheKey {
    /// Create a key from a canonical parameter string
    pub fn new(namespace: &str, canonical: &str) -> Self {
        let params_hash = if canonical.is_empty() {
            "empty".to_string()
        } else {
            let mut hasher = Sha256::new();
            hasher.update(canonical.as_bytes());
            let hash = hasher.finalize();
            hex::encode(&hash[..8])
        };

        Self {
            namespace: namespace.to_string(),
            params_hash,
        }
    }

    /// Convert to storage key string
    pub fn to_storage_key(&self) -> String {
        format!("{}:{}", self.namespace, self.params_hash)
    }

    /// Prefix matching every key of a namespace
    pub fn invalidation_pattern(namespace: &str) -> String {
        format!("{}:", namespace)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.namespace, self.params_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_deterministic() {
        let key1 = CacheKey::new(SEARCH_NAMESPACE, r#"{"q":"ocean"}"#);
        let key2 = CacheKey::new(SEARCH_NAMESPACE, r#"{"q":"ocean"}"#);
        assert_eq!(key1, key2);
        assert_eq!(key1.params_hash.len(), 16);
    }

    #[test]
    fn test_namespace_separates_keys() {
        let search = CacheKey::new(SEARCH_NAMESPACE, "{}");
        let recipients = CacheKey::new(RECIPIENTS_NAMESPACE, "{}");
        assert_ne!(search, recipients);
        assert_eq!(search.params_hash, recipients.params_hash);
    }

    #[test]
    fn test_empty_params() {
        let key = CacheKey::new(POPULAR_NAMESPACE, "");
        assert_eq!(key.params_hash, "empty");
        assert_eq!(key.to_storage_key(), "popular:empty");
    }

    #[test]
    fn test_invalidation_pattern() {
        let key = CacheKey::new(SEARCH_NAMESPACE, r#"{"q":"x"}"#);
        assert!(key
            .to_storage_key()
            .starts_with(&CacheKey::invalidation_pattern(SEARCH_NAMESPACE)));
        assert!(key.to_string().starts_with("search("));
    }
}
