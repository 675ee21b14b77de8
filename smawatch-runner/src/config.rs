//! Application configuration.
//!
//! Loaded from TOML (every field defaulted), then overridden from the
//! environment, then validated. Constructed once by the binary and passed
//! down; nothing reads configuration from global state.
//!
//! ```toml
//! [analysis]
//! overbought = 0.5
//! oversold = 0.3
//! history_weeks = 260
//! sma_period = 200
//!
//! [cache]
//! ttl_hours = 24
//! backend = "gcs"
//! bucket = "my-bucket"
//! prefix = "smawatch/"
//!
//! [http]
//! timeout_secs = 20
//!
//! [access]
//! code = "letmein"
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use smawatch_core::classify::{ThresholdError, Thresholds};
use smawatch_core::data::cache::{CacheBackend, CacheStore, GcsBackend, LocalBackend, MemoryBackend};
use smawatch_core::data::DataError;
use smawatch_core::indicators::DEFAULT_SMA_PERIOD;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "smawatch.toml";

/// Longest accepted freshness window: ten years.
pub const MAX_TTL_HOURS: i64 = 24 * 365 * 10;

/// Longest accepted history request: a century of weekly closes.
pub const MAX_HISTORY_WEEKS: usize = 52 * 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid config: {0}")]
    Thresholds(#[from] ThresholdError),

    #[error("setup failed: {0}")]
    Setup(#[from] DataError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Overbought threshold as a fraction above the average.
    pub overbought: f64,
    /// Oversold threshold as a positive fraction below the average.
    pub oversold: f64,
    /// Weeks of history requested per ticker.
    pub history_weeks: usize,
    pub sma_period: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            overbought: thresholds.overbought,
            oversold: thresholds.oversold,
            history_weeks: 260,
            sma_period: DEFAULT_SMA_PERIOD,
        }
    }
}

impl AnalysisConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            overbought: self.overbought,
            oversold: self.oversold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Gcs,
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "gcs" => Ok(Self::Gcs),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid(format!(
                "unknown cache backend '{other}' (expected local, gcs or memory)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_hours: i64,
    pub backend: BackendKind,
    /// Local cache directory. Defaults to the platform cache dir.
    pub dir: Option<PathBuf>,
    pub bucket: Option<String>,
    pub prefix: String,
    /// Storage API endpoint override (emulators).
    pub endpoint: Option<String>,
    /// Bearer token for the storage API. Environment only.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: smawatch_core::data::cache::DEFAULT_TTL_HOURS,
            backend: BackendKind::Local,
            dir: None,
            bucket: None,
            prefix: "smawatch/".to_string(),
            endpoint: None,
            token: None,
        }
    }
}

impl CacheConfig {
    /// Configured directory, else `{platform cache dir}/smawatch`, else
    /// `.smawatch-cache` in the working directory.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|d| d.join("smawatch"))
                .unwrap_or_else(|| PathBuf::from(".smawatch-cache"))
        })
    }

    pub fn ttl(&self) -> Result<Duration, ConfigError> {
        Duration::try_hours(self.ttl_hours).ok_or_else(|| {
            ConfigError::Invalid(format!("cache ttl_hours {} is out of range", self.ttl_hours))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: concat!("smawatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Shared access code for the dashboard. `None` disables the gate.
    pub code: Option<String>,
}

impl AccessConfig {
    pub fn is_gated(&self) -> bool {
        self.code.is_some()
    }

    /// Exact comparison against the configured code. Always true when no
    /// code is configured.
    pub fn permits(&self, attempt: &str) -> bool {
        match &self.code {
            Some(code) => code == attempt,
            None => true,
        }
    }
}

impl AppConfig {
    /// Load `path` (or `smawatch.toml` if present), apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `SMAWATCH_*` overrides. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("SMAWATCH_CACHE_DIR") {
            self.cache.dir = Some(PathBuf::from(dir));
        }
        if let Some(kind) = get("SMAWATCH_CACHE_BACKEND") {
            self.cache.backend = kind.parse()?;
        }
        if let Some(bucket) = get("SMAWATCH_BUCKET").or_else(|| get("BUCKET_NAME")) {
            self.cache.bucket = Some(bucket);
        }
        if let Some(token) = get("SMAWATCH_GCS_TOKEN") {
            self.cache.token = Some(token);
        }
        if let Some(code) = get("SMAWATCH_ACCESS_CODE") {
            self.access.code = Some(code);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.thresholds().validate()?;

        if self.analysis.sma_period == 0 {
            return Err(ConfigError::Invalid("sma_period must be at least 1".into()));
        }
        if self.analysis.history_weeks < self.analysis.sma_period {
            return Err(ConfigError::Invalid(format!(
                "history_weeks ({}) is shorter than sma_period ({})",
                self.analysis.history_weeks, self.analysis.sma_period
            )));
        }
        if self.analysis.history_weeks > MAX_HISTORY_WEEKS {
            return Err(ConfigError::Invalid(format!(
                "history_weeks ({}) exceeds {MAX_HISTORY_WEEKS}",
                self.analysis.history_weeks
            )));
        }
        if self.cache.ttl_hours <= 0 || self.cache.ttl_hours > MAX_TTL_HOURS {
            return Err(ConfigError::Invalid(format!(
                "cache ttl_hours must be between 1 and {MAX_TTL_HOURS}, got {}",
                self.cache.ttl_hours
            )));
        }
        if self.cache.backend == BackendKind::Gcs
            && self.cache.bucket.as_deref().map_or(true, |b| b.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "gcs cache backend needs a bucket (cache.bucket or SMAWATCH_BUCKET)".into(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("http timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        self.analysis.thresholds()
    }

    /// Build the cache store for the configured backend.
    pub fn build_cache_store(&self) -> Result<CacheStore, ConfigError> {
        let backend: Box<dyn CacheBackend> = match self.cache.backend {
            BackendKind::Local => Box::new(LocalBackend::new(self.cache.resolved_dir())),
            BackendKind::Memory => Box::new(MemoryBackend::new()),
            BackendKind::Gcs => {
                let bucket = self.cache.bucket.clone().ok_or_else(|| {
                    ConfigError::Invalid("gcs cache backend needs a bucket".into())
                })?;
                let mut gcs = GcsBackend::new(bucket, self.http.timeout())?
                    .with_prefix(self.cache.prefix.clone())
                    .with_token(self.cache.token.clone());
                if let Some(endpoint) = &self.cache.endpoint {
                    gcs = gcs.with_endpoint(endpoint.clone());
                }
                Box::new(gcs)
            }
        };
        Ok(CacheStore::new(backend, self.cache.ttl()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.analysis.history_weeks, 260);
        assert_eq!(config.analysis.sma_period, 200);
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.http.timeout_secs, 20);
        assert!(!config.access.is_gated());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [analysis]
            overbought = 0.4

            [cache]
            backend = "gcs"
            bucket = "b"
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.overbought, 0.4);
        assert_eq!(config.analysis.oversold, 0.3);
        assert_eq!(config.cache.backend, BackendKind::Gcs);
        assert_eq!(config.cache.prefix, "smawatch/");
        config.validate().unwrap();
    }

    #[test]
    fn unknown_backend_fails_to_parse() {
        assert!(AppConfig::from_toml_str("[cache]\nbackend = \"s3\"").is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("SMAWATCH_CACHE_DIR", "/tmp/sma"),
                ("BUCKET_NAME", "legacy-bucket"),
                ("SMAWATCH_GCS_TOKEN", "tok"),
                ("SMAWATCH_ACCESS_CODE", "secret"),
                ("SMAWATCH_CACHE_BACKEND", "gcs"),
            ]))
            .unwrap();
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/sma")));
        assert_eq!(config.cache.bucket.as_deref(), Some("legacy-bucket"));
        assert_eq!(config.cache.token.as_deref(), Some("tok"));
        assert_eq!(config.cache.backend, BackendKind::Gcs);
        assert!(config.access.permits("secret"));
        assert!(!config.access.permits("Secret"));
        config.validate().unwrap();
    }

    #[test]
    fn smawatch_bucket_wins_over_legacy_name() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("SMAWATCH_BUCKET", "new"), ("BUCKET_NAME", "old")]))
            .unwrap();
        assert_eq!(config.cache.bucket.as_deref(), Some("new"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("SMAWATCH_ACCESS_CODE", "  ")])).unwrap();
        assert!(!config.access.is_gated());
    }

    #[test]
    fn bad_backend_env_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("SMAWATCH_CACHE_BACKEND", "floppy")]))
            .unwrap_err();
        assert!(err.to_string().contains("floppy"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut c = AppConfig::default();
        c.analysis.oversold = -0.1;
        assert!(matches!(c.validate(), Err(ConfigError::Thresholds(_))));

        let mut c = AppConfig::default();
        c.cache.ttl_hours = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = AppConfig::default();
        c.analysis.history_weeks = 150;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = AppConfig::default();
        c.cache.backend = BackendKind::Gcs;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn oversized_windows_are_rejected() {
        let c = AppConfig::from_toml_str("[cache]\nttl_hours = 9999999999999\n").unwrap();
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(c.cache.ttl(), Err(ConfigError::Invalid(_))));
        assert!(matches!(c.build_cache_store(), Err(ConfigError::Invalid(_))));

        let mut c = AppConfig::default();
        c.analysis.history_weeks = MAX_HISTORY_WEEKS + 1;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = AppConfig::default();
        c.cache.ttl_hours = MAX_TTL_HOURS;
        c.analysis.history_weeks = MAX_HISTORY_WEEKS;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn open_access_permits_anything() {
        assert!(AccessConfig::default().permits(""));
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smawatch.toml");
        std::fs::write(&path, "[analysis\n").unwrap();
        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("smawatch.toml"));

        let missing = AppConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }

    #[test]
    fn builds_each_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = AppConfig::default();
        c.cache.dir = Some(dir.path().to_path_buf());
        assert_eq!(c.build_cache_store().unwrap().backend_name(), "local");

        c.cache.backend = BackendKind::Memory;
        assert_eq!(c.build_cache_store().unwrap().backend_name(), "memory");

        c.cache.backend = BackendKind::Gcs;
        c.cache.bucket = Some("bucket".into());
        let store = c.build_cache_store().unwrap();
        assert_eq!(store.backend_name(), "gcs");
        assert_eq!(store.ttl(), Duration::hours(24));
    }
}
