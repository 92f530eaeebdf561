use chrono::{DateTime, Utc};
use core_types::{Dataset, Period};
use sha2::{Digest, Sha256};
use std::fmt;

/// Logical identity of a fetch: who, which dataset, which period and which
/// symbols. Two requests with the same key are served the same records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds `<key-hash>_<dataset>_<period>_<tag>[_<SYMBOLS>]`.
    ///
    /// Calendar periods are keyed by their calendar tag, so "today" rolls over
    /// at UTC midnight. Symbols are upper-cased and sorted.
    pub fn new(
        api_key: &str,
        dataset: Dataset,
        period: &Period,
        now: DateTime<Utc>,
        symbols: &[String],
    ) -> Self {
        let mut key = format!(
            "{}_{}_{}_{}",
            account_hash(api_key),
            dataset.as_str(),
            period.slug(),
            period.cache_tag(now)
        );

        let mut symbols: Vec<String> = symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        symbols.sort();
        symbols.dedup();
        if !symbols.is_empty() {
            key.push('_');
            key.push_str(&symbols.join("-"));
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First 8 hex chars of the SHA-256 of an API key. Identifies an account in
/// cache keys and logs without exposing the key.
pub fn account_hash(api_key: &str) -> String {
    let digest = Sha256::digest(api_key.trim().as_bytes());
    hex::encode(digest)[..8].to_string()
}
