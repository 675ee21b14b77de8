//! Local directory backend.
//!
//! Layout: `{cache_dir}/{key}.json`, one JSON envelope per key.
//!
//! Writes are atomic: write to `{key}.json.tmp`, then rename into place. A
//! failed write never touches the previous entry. Corrupt files are
//! reported as `CacheBackend` errors; `cache clear` removes them.

use super::{CacheBackend, CacheEntry};
use crate::data::provider::DataError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Cache entries as JSON files in one directory.
pub struct LocalBackend {
    cache_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path to the envelope for a key: `{cache_dir}/{key}.json`
    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }
}

impl CacheBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn read(&self, key: &str) -> Result<Option<CacheEntry>, DataError> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DataError::CacheBackend(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            DataError::CacheBackend(format!("corrupt cache file {}: {e}", path.display()))
        })
    }

    fn write(&self, entry: &CacheEntry) -> Result<(), DataError> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::CacheBackend(format!("failed to create dir: {e}")))?;

        let json = serde_json::to_vec(entry)
            .map_err(|e| DataError::CacheBackend(format!("envelope serialization: {e}")))?;

        let path = self.entry_path(&entry.key);
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, json).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheBackend(format!("write {}: {e}", tmp_path.display()))
        })?;

        // Atomic rename
        fs::rename(&tmp_path, &path).map_err(|e| {
            // Clean up temp file on rename failure
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheBackend(format!("atomic rename failed: {e}"))
        })
    }

    fn remove(&self, key: &str) -> Result<(), DataError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DataError::CacheBackend(format!("remove {key}: {e}"))),
        }
    }

    fn keys(&self) -> Result<Vec<String>, DataError> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DataError::CacheBackend(format!("read dir: {e}"))),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheBackend(format!("dir entry: {e}")))?;
            let name = entry.file_name().to_string_lossy().to_string();
            // Skips leftover .json.tmp files and anything else in the directory.
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(key: &str, payload: serde_json::Value) -> CacheEntry {
        CacheEntry::new(key, payload, Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap())
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());

        let e = entry("SPY", serde_json::json!({"closes": [1.5, 2.25]}));
        backend.write(&e).unwrap();

        assert_eq!(backend.read("SPY").unwrap(), Some(e));
        assert!(dir.path().join("SPY.json").exists());
        assert!(!dir.path().join("SPY.json.tmp").exists());
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        assert_eq!(backend.read("NONEXISTENT").unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("SPY.json"), "not json {{{").unwrap();
        let backend = LocalBackend::new(dir.path());

        let err = backend.read("SPY").unwrap_err();
        assert!(matches!(err, DataError::CacheBackend(_)));
    }

    #[test]
    fn write_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let backend = LocalBackend::new(&nested);

        backend.write(&entry("X", serde_json::json!(1))).unwrap();
        assert!(nested.join("X.json").exists());
    }

    #[test]
    fn keys_ignore_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend.write(&entry("MSFT", serde_json::json!(1))).unwrap();
        backend.write(&entry("AAPL", serde_json::json!(2))).unwrap();
        fs::write(dir.path().join("GOOG.json.tmp"), "partial").unwrap();
        fs::write(dir.path().join("smawatch.log"), "log").unwrap();

        assert_eq!(backend.keys().unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn keys_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("never-created"));
        assert!(backend.keys().unwrap().is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend.write(&entry("SPY", serde_json::json!(1))).unwrap();

        backend.remove("SPY").unwrap();
        backend.remove("SPY").unwrap();
        assert_eq!(backend.read("SPY").unwrap(), None);
    }
}
