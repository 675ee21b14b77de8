//! Cache store with a freshness window over pluggable backends.
//!
//! Contract: `get_or_fetch(key, fetch_fn)`.
//! - A fresh entry (`now - written_at < ttl`) is returned without calling `fetch_fn`.
//! - A stale or absent entry triggers `fetch_fn`; the result is written back
//!   with the current time and returned.
//! - `fetch_fn` errors propagate untouched and nothing is written, so the
//!   previous entry (if any) stays in place.
//! - Backend read errors are `CacheBackend` errors, never a miss.
//!
//! Envelope: `{key, written_at, digest, payload}` as JSON. `digest` is a
//! BLAKE3 hash of the payload and is verified before a fresh entry is served.
//!
//! There is no locking. Two writers racing on one key: last write wins.

mod gcs;
mod local;
mod memory;

pub use gcs::GcsBackend;
pub use local::LocalBackend;
pub use memory::MemoryBackend;

use super::provider::DataError;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default freshness window.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// One cached payload and when it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub written_at: DateTime<Utc>,
    pub digest: String,
    pub payload: serde_json::Value,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, payload: serde_json::Value, written_at: DateTime<Utc>) -> Self {
        let digest = digest_of(&payload);
        Self {
            key: key.into(),
            written_at,
            digest,
            payload,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.written_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }

    /// Check the payload against its recorded digest.
    pub fn verify(&self) -> Result<(), DataError> {
        if digest_of(&self.payload) == self.digest {
            Ok(())
        } else {
            Err(DataError::CacheBackend(format!(
                "digest mismatch for '{}'; entry is corrupt",
                self.key
            )))
        }
    }
}

fn digest_of(payload: &serde_json::Value) -> String {
    blake3::hash(payload.to_string().as_bytes())
        .to_hex()
        .to_string()
}

/// Storage for cache entries. Keys arrive already sanitised.
pub trait CacheBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Read an entry. `Ok(None)` only when the key is absent.
    fn read(&self, key: &str) -> Result<Option<CacheEntry>, DataError>;

    /// Write an entry, replacing any previous one atomically.
    fn write(&self, entry: &CacheEntry) -> Result<(), DataError>;

    /// Remove an entry. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), DataError>;

    /// All stored keys, sorted.
    fn keys(&self) -> Result<Vec<String>, DataError>;
}

/// Restrict keys to `[A-Za-z0-9._-]` so they are safe file and object names.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Age and freshness of one stored entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    pub key: String,
    pub written_at: DateTime<Utc>,
    pub age: Duration,
    pub fresh: bool,
}

/// Cache store: freshness policy on top of a backend.
pub struct CacheStore {
    backend: Box<dyn CacheBackend>,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(backend: Box<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Store with the default 24-hour freshness window.
    pub fn with_default_ttl(backend: Box<dyn CacheBackend>) -> Self {
        Self::new(backend, Duration::hours(DEFAULT_TTL_HOURS))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Serve `key` if fresh, otherwise fetch, persist and return.
    pub fn get_or_fetch<T, F>(&self, key: &str, fetch: F) -> Result<T, DataError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, DataError>,
    {
        self.get_or_fetch_at(key, Utc::now(), fetch)
    }

    /// `get_or_fetch` with an explicit clock.
    pub fn get_or_fetch_at<T, F>(&self, key: &str, now: DateTime<Utc>, fetch: F) -> Result<T, DataError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, DataError>,
    {
        let key = sanitize_key(key);

        if let Some(value) = self.read_fresh_at(&key, now)? {
            debug!(key = %key, backend = self.backend.name(), "cache hit");
            return Ok(value);
        }

        info!(key = %key, backend = self.backend.name(), "cache miss, fetching");
        let value = fetch()?;
        self.put_at(&key, &value, now)?;
        Ok(value)
    }

    /// Fetch `key` regardless of freshness and write it back.
    ///
    /// The stored entry is only replaced once `fetch` has succeeded.
    pub fn refresh<T, F>(&self, key: &str, fetch: F) -> Result<T, DataError>
    where
        T: Serialize,
        F: FnOnce() -> Result<T, DataError>,
    {
        self.refresh_at(key, Utc::now(), fetch)
    }

    /// `refresh` with an explicit clock.
    pub fn refresh_at<T, F>(&self, key: &str, now: DateTime<Utc>, fetch: F) -> Result<T, DataError>
    where
        T: Serialize,
        F: FnOnce() -> Result<T, DataError>,
    {
        let key = sanitize_key(key);
        info!(key = %key, backend = self.backend.name(), "forced refresh, fetching");
        let value = fetch()?;
        self.put_at(&key, &value, now)?;
        Ok(value)
    }

    /// Decode the entry for `key` if it exists and is fresh at `now`.
    pub fn read_fresh_at<T: DeserializeOwned>(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<T>, DataError> {
        let key = sanitize_key(key);
        let entry = match self.backend.read(&key)? {
            Some(entry) if entry.is_fresh(now, self.ttl) => entry,
            Some(_) => {
                debug!(key = %key, "cache entry stale");
                return Ok(None);
            }
            None => return Ok(None),
        };

        entry.verify()?;
        let value = serde_json::from_value(entry.payload).map_err(|e| {
            DataError::CacheBackend(format!("cached payload for '{key}' does not decode: {e}"))
        })?;
        Ok(Some(value))
    }

    /// Write `value` under `key` stamped with `now`.
    pub fn put_at<T: Serialize>(&self, key: &str, value: &T, now: DateTime<Utc>) -> Result<(), DataError> {
        let key = sanitize_key(key);
        let payload = serde_json::to_value(value).map_err(|e| {
            DataError::CacheBackend(format!("failed to serialize payload for '{key}': {e}"))
        })?;
        self.backend.write(&CacheEntry::new(key, payload, now))
    }

    /// Age and freshness of one key, if present.
    pub fn entry_info(&self, key: &str, now: DateTime<Utc>) -> Result<Option<EntryInfo>, DataError> {
        let key = sanitize_key(key);
        Ok(self.backend.read(&key)?.map(|entry| EntryInfo {
            fresh: entry.is_fresh(now, self.ttl),
            age: entry.age(now),
            written_at: entry.written_at,
            key: entry.key,
        }))
    }

    /// Age and freshness of every stored entry.
    pub fn status(&self, now: DateTime<Utc>) -> Result<Vec<EntryInfo>, DataError> {
        let mut infos = Vec::new();
        for key in self.backend.keys()? {
            if let Some(info) = self.entry_info(&key, now)? {
                infos.push(info);
            }
        }
        Ok(infos)
    }

    /// Drop one entry so the next read refetches.
    pub fn invalidate(&self, key: &str) -> Result<(), DataError> {
        self.backend.remove(&sanitize_key(key))
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, DataError> {
        let keys = self.backend.keys()?;
        for key in &keys {
            self.backend.remove(key)?;
        }
        info!(removed = keys.len(), backend = self.backend.name(), "cache cleared");
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-03T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn store() -> (CacheStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        (CacheStore::with_default_ttl(Box::new(backend.clone())), backend)
    }

    #[test]
    fn miss_fetches_and_persists() {
        let (store, backend) = store();
        let calls = Cell::new(0);

        let v: Vec<u32> = store
            .get_or_fetch_at("AAPL", t0(), || {
                calls.set(calls.get() + 1);
                Ok(vec![1, 2, 3])
            })
            .unwrap();

        assert_eq!(v, vec![1, 2, 3]);
        assert_eq!(calls.get(), 1);
        let entry = backend.read("AAPL").unwrap().unwrap();
        assert_eq!(entry.written_at, t0());
    }

    #[test]
    fn fresh_entry_skips_fetch() {
        let (store, _) = store();
        store.put_at("AAPL", &42u32, t0()).unwrap();

        let later = t0() + Duration::hours(23) + Duration::minutes(59);
        let v: u32 = store
            .get_or_fetch_at("AAPL", later, || panic!("fetch must not run for a fresh entry"))
            .unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn entry_exactly_at_ttl_is_stale() {
        let (store, _) = store();
        store.put_at("AAPL", &1u32, t0()).unwrap();

        let calls = Cell::new(0);
        let v: u32 = store
            .get_or_fetch_at("AAPL", t0() + Duration::hours(24), || {
                calls.set(calls.get() + 1);
                Ok(2)
            })
            .unwrap();
        assert_eq!(v, 2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn failed_fetch_keeps_old_entry() {
        let (store, backend) = store();
        store.put_at("MSFT", &"old".to_string(), t0()).unwrap();

        let later = t0() + Duration::days(2);
        let err = store
            .get_or_fetch_at::<String, _>("MSFT", later, || {
                Err(DataError::SourceUnavailable("timeout".into()))
            })
            .unwrap_err();

        assert_eq!(err, DataError::SourceUnavailable("timeout".into()));
        let entry = backend.read("MSFT").unwrap().unwrap();
        assert_eq!(entry.payload, serde_json::json!("old"));
        assert_eq!(entry.written_at, t0());
    }

    #[test]
    fn refresh_replaces_a_fresh_entry() {
        let (store, backend) = store();
        store.put_at("AAPL", &1u32, t0()).unwrap();

        let later = t0() + Duration::hours(1);
        let v: u32 = store.refresh_at("AAPL", later, || Ok(2)).unwrap();

        assert_eq!(v, 2);
        let entry = backend.read("AAPL").unwrap().unwrap();
        assert_eq!(entry.payload, serde_json::json!(2));
        assert_eq!(entry.written_at, later);
    }

    #[test]
    fn failed_refresh_keeps_old_entry() {
        let (store, backend) = store();
        store.put_at("MSFT", &"old".to_string(), t0()).unwrap();

        let err = store
            .refresh_at::<String, _>("MSFT", t0() + Duration::hours(1), || {
                Err(DataError::SourceUnavailable("offline".into()))
            })
            .unwrap_err();

        assert_eq!(err, DataError::SourceUnavailable("offline".into()));
        let entry = backend.read("MSFT").unwrap().unwrap();
        assert_eq!(entry.payload, serde_json::json!("old"));
        assert_eq!(entry.written_at, t0());
    }

    #[test]
    fn undecodable_payload_is_backend_error() {
        let (store, _) = store();
        store.put_at("SPY", &"not a number".to_string(), t0()).unwrap();

        let err = store
            .get_or_fetch_at::<u32, _>("SPY", t0(), || Ok(1))
            .unwrap_err();
        assert!(matches!(err, DataError::CacheBackend(_)));
    }

    #[test]
    fn digest_mismatch_is_backend_error() {
        let (store, backend) = store();
        let mut entry = CacheEntry::new("SPY", serde_json::json!([1, 2]), t0());
        entry.payload = serde_json::json!([1, 3]);
        backend.write(&entry).unwrap();

        let err = store
            .get_or_fetch_at::<Vec<u32>, _>("SPY", t0(), || Ok(vec![]))
            .unwrap_err();
        assert!(err.to_string().contains("digest mismatch"));
    }

    struct BrokenBackend;

    impl CacheBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        fn read(&self, _key: &str) -> Result<Option<CacheEntry>, DataError> {
            Err(DataError::CacheBackend("403 Forbidden: bad credentials".into()))
        }
        fn write(&self, _entry: &CacheEntry) -> Result<(), DataError> {
            Err(DataError::CacheBackend("403 Forbidden: bad credentials".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), DataError> {
            Ok(())
        }
        fn keys(&self) -> Result<Vec<String>, DataError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn backend_read_failure_is_not_a_miss() {
        let store = CacheStore::with_default_ttl(Box::new(BrokenBackend));
        let err = store
            .get_or_fetch_at::<u32, _>("AAPL", t0(), || panic!("fetch must not run"))
            .unwrap_err();
        assert!(matches!(err, DataError::CacheBackend(_)));
    }

    #[test]
    fn sanitize_key_replaces_unsafe_chars() {
        assert_eq!(sanitize_key("BRK.B"), "BRK.B");
        assert_eq!(sanitize_key("sp500_constituents"), "sp500_constituents");
        assert_eq!(sanitize_key("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_key("A B"), "A_B");
    }

    #[test]
    fn status_reports_freshness() {
        let (store, _) = store();
        store.put_at("OLD", &1u8, t0() - Duration::days(3)).unwrap();
        store.put_at("NEW", &1u8, t0()).unwrap();

        let status = store.status(t0() + Duration::hours(1)).unwrap();
        assert_eq!(status.len(), 2);
        let new = status.iter().find(|i| i.key == "NEW").unwrap();
        let old = status.iter().find(|i| i.key == "OLD").unwrap();
        assert!(new.fresh);
        assert!(!old.fresh);
        assert_eq!(new.age, Duration::hours(1));
    }

    #[test]
    fn invalidate_and_clear() {
        let (store, backend) = store();
        store.put_at("A", &1u8, t0()).unwrap();
        store.put_at("B", &1u8, t0()).unwrap();
        store.put_at("C", &1u8, t0()).unwrap();

        store.invalidate("A").unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["B".to_string(), "C".to_string()]);

        assert_eq!(store.clear().unwrap(), 2);
        assert!(backend.keys().unwrap().is_empty());
    }
}
