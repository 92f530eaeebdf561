use crate::error::CacheError;
use crate::key::CacheKey;
use core_types::RawRecord;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A directory of `<sanitised-key>.json` files, each holding one record list.
///
/// There is no locking and no expiry; concurrent writers of the same key race
/// and the last one wins.
#[derive(Debug, Clone)]
pub struct RecordCache {
    dir: PathBuf,
}

impl RecordCache {
    /// Opens the cache, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| CacheError::Io { path: dir.clone(), source })?;
        tracing::debug!(dir = %dir.display(), "Record cache ready.");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key.as_str())))
    }

    /// Returns the cached records, or `None` on a miss.
    pub async fn load(&self, key: &CacheKey) -> Result<Option<Vec<RawRecord>>, CacheError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let records: Vec<RawRecord> = serde_json::from_slice(&bytes)
            .map_err(|source| CacheError::Corrupt { path: path.clone(), source })?;
        tracing::debug!(key = %key, records = records.len(), "Cache hit.");
        Ok(Some(records))
    }

    /// Writes `records` under `key`, replacing any previous entry.
    pub async fn save(&self, key: &CacheKey, records: &[RawRecord]) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let body = serde_json::to_vec(records)?;
        // Write-then-rename so readers never see a half-written file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|source| CacheError::Io { path: tmp.clone(), source })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| CacheError::Io { path: path.clone(), source })?;
        tracing::debug!(key = %key, records = records.len(), "Cached records.");
        Ok(())
    }
}

/// Maps a logical key to a file stem made only of `[A-Za-z0-9._-]`.
///
/// Any other character becomes `_`, and a run of them becomes a single `_`.
/// Keys that leave nothing usable fall back to a 16-hex-char SHA-256 digest.
pub fn sanitize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut substituted = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            substituted = false;
        } else if !substituted {
            out.push('_');
            substituted = true;
        }
    }

    let usable = out.chars().any(|c| c != '.' && c != '_');
    if usable {
        out
    } else {
        hex::encode(Sha256::digest(raw.as_bytes()))[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn round_trip_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::new(dir.path().join("nested")).await.unwrap();
        let key = CacheKey::from("abcd1234_closed_pnl_today_2024-03-15");
        let records = vec![
            record(json!({ "symbol": "BTCUSDT", "closedPnl": "1.25", "updatedTime": "1000" })),
            record(json!({ "coin": "USDT", "amount": "5", "_source": "deposits" })),
        ];

        assert!(cache.load(&key).await.unwrap().is_none());
        cache.save(&key, &records).await.unwrap();

        assert_eq!(cache.load(&key).await.unwrap(), Some(records));
        assert!(cache.path_for(&key).exists());
    }

    #[tokio::test]
    async fn save_overwrites_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::new(dir.path()).await.unwrap();
        let key = CacheKey::from("k");

        cache.save(&key, &[record(json!({ "a": 1 }))]).await.unwrap();
        cache.save(&key, &[]).await.unwrap();

        assert_eq!(cache.load(&key).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::new(dir.path()).await.unwrap();
        let key = CacheKey::from("broken");
        std::fs::write(cache.path_for(&key), b"not json").unwrap();

        let err = cache.load(&key).await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn sanitized_names_use_only_the_safe_set() {
        let keys = [
            "abc_custom_2024-01-01T00:00:00_2024-01-02T23:59:59",
            "../../etc/passwd",
            "space and/slash\\back",
            "ünïcødé",
        ];
        for key in keys {
            let name = sanitize_key(key);
            assert!(!name.is_empty());
            assert!(
                name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')),
                "{name}"
            );
            assert!(!name.contains('/'));
        }
        assert_eq!(sanitize_key("a::b  c"), "a_b_c");
        assert_eq!(sanitize_key("2024-01-01T00:00:00"), "2024-01-01T00_00_00");
    }

    #[test]
    fn unusable_keys_fall_back_to_a_digest() {
        let name = sanitize_key("///");
        assert_eq!(name.len(), 16);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sanitize_key(""), sanitize_key(""));
        assert_ne!(sanitize_key("///"), sanitize_key("???"));
        assert_eq!(sanitize_key("..").len(), 16);
    }
}
