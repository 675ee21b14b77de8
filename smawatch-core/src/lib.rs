//! SMAWatch Core: data sources, cache store, 200-week SMA and classification.
//!
//! This crate holds everything below the orchestration layer:
//! - Domain types (constituents, weekly price series, analysis results)
//! - Remote data source adapters (Wikipedia constituents, Yahoo weekly closes)
//! - Cache store with a freshness window over pluggable backends
//!   (local directory, Cloud Storage bucket, in-memory)
//! - Trailing simple moving average and deviation math
//! - Overbought / neutral / oversold classifier

pub mod analysis;
pub mod classify;
pub mod data;
pub mod indicators;

pub use analysis::{analyze_series, AnalysisResult};
pub use classify::{classify, Classification, Thresholds};
pub use data::{DataError, PriceSeries, WeeklyClose};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the runner shares across rayon workers
    /// is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<PriceSeries>();
        require_sync::<PriceSeries>();
        require_send::<AnalysisResult>();
        require_sync::<AnalysisResult>();
        require_send::<DataError>();
        require_sync::<DataError>();
        require_send::<data::ConstituentList>();
        require_sync::<data::ConstituentList>();

        require_send::<data::cache::CacheStore>();
        require_sync::<data::cache::CacheStore>();
        require_send::<data::cache::LocalBackend>();
        require_sync::<data::cache::LocalBackend>();
        require_send::<data::cache::GcsBackend>();
        require_sync::<data::cache::GcsBackend>();
        require_send::<data::cache::MemoryBackend>();
        require_sync::<data::cache::MemoryBackend>();

        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::WikipediaConstituents>();
        require_sync::<data::WikipediaConstituents>();
    }
}
