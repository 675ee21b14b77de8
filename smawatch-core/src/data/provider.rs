//! Data source traits and structured error types.
//!
//! `ConstituentSource` and `PriceSource` abstract over the remote adapters
//! (Wikipedia, Yahoo Finance) so the pipeline can be driven by mocks in tests.
//! The cache layer sits above these traits; sources don't know about the cache.

use chrono::NaiveDate;
use thiserror::Error;

use super::series::PriceSeries;
use super::universe::ConstituentList;

/// Structured error types for data operations.
///
/// Displayable in both CLI and TUI contexts. `Clone` so batch reports can
/// carry per-ticker failures across the worker channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// Transport failure, timeout, non-success status, or a response whose
    /// structure no longer matches what we parse.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("insufficient history for {symbol}: {points} weekly closes, need {required}")]
    InsufficientHistory {
        symbol: String,
        points: usize,
        required: usize,
    },

    /// Storage read/write failure. Never folded into a cache miss.
    #[error("cache backend error: {0}")]
    CacheBackend(String),
}

impl DataError {
    /// Short machine-friendly kind, used in reports and CSV/status output.
    pub fn kind(&self) -> &'static str {
        match self {
            DataError::SourceUnavailable(_) => "source_unavailable",
            DataError::SymbolNotFound { .. } => "symbol_not_found",
            DataError::InsufficientHistory { .. } => "insufficient_history",
            DataError::CacheBackend(_) => "cache_backend",
        }
    }

    /// Omissions are expected (not enough listed history); everything else
    /// is a failure the user may want to act on.
    pub fn is_omission(&self) -> bool {
        matches!(self, DataError::InsufficientHistory { .. })
    }
}

/// Source of the current index membership.
pub trait ConstituentSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch the full constituent list. Must fail rather than return an
    /// empty list when the page structure is not recognised.
    fn fetch_constituents(&self) -> Result<ConstituentList, DataError>;
}

/// Source of weekly closing prices.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch weekly closes for a symbol over a date range (inclusive).
    fn fetch_price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError>;
}

/// Progress callback for multi-symbol operations.
///
/// Tickers may complete on several threads at once, hence `Sync`.
pub trait FetchProgress: Send + Sync {
    /// Called once before any ticker is processed.
    fn on_batch_start(&self, total: usize);

    /// Called when a ticker completes. `done` counts completed tickers so far.
    fn on_complete(&self, symbol: &str, done: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_batch_start(&self, total: usize) {
        println!("Processing {total} tickers...");
    }

    fn on_complete(&self, symbol: &str, done: usize, total: usize, result: &Result<(), DataError>) {
        match result {
            Ok(()) => println!("[{done}/{total}] OK: {symbol}"),
            Err(e) if e.is_omission() => println!("[{done}/{total}] SKIP: {symbol}: {e}"),
            Err(e) => println!("[{done}/{total}] FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nDone: {succeeded}/{total} succeeded, {failed} skipped");
    }
}

/// Progress reporter that ignores every event.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_batch_start(&self, _total: usize) {}
    fn on_complete(&self, _: &str, _: usize, _: usize, _: &Result<(), DataError>) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let errors = [
            DataError::SourceUnavailable("x".into()),
            DataError::SymbolNotFound { symbol: "X".into() },
            DataError::InsufficientHistory {
                symbol: "X".into(),
                points: 1,
                required: 200,
            },
            DataError::CacheBackend("x".into()),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), 4);
    }

    #[test]
    fn only_insufficient_history_is_an_omission() {
        assert!(DataError::InsufficientHistory {
            symbol: "NEW".into(),
            points: 12,
            required: 200
        }
        .is_omission());
        assert!(!DataError::SymbolNotFound { symbol: "OLD".into() }.is_omission());
        assert!(!DataError::CacheBackend("denied".into()).is_omission());
    }

    #[test]
    fn insufficient_history_message_names_counts() {
        let err = DataError::InsufficientHistory {
            symbol: "ABNB".into(),
            points: 199,
            required: 200,
        };
        assert_eq!(
            err.to_string(),
            "insufficient history for ABNB: 199 weekly closes, need 200"
        );
    }
}
