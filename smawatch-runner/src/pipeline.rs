//! Moving-average pipeline: cache → fetch → SMA → classify.
//!
//! Every ticker is an independent unit of work. A batch never aborts on a
//! single ticker's failure; failures land in `BatchReport::skipped` with the
//! error that caused them. The only shared resource across rayon workers is
//! the cache store.

use crate::config::{AppConfig, ConfigError};
use crate::report::{join_rows, DashboardRow};
use chrono::{Duration, NaiveDate, Utc};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use smawatch_core::analysis::{analyze_series, AnalysisResult};
use smawatch_core::classify::Thresholds;
use smawatch_core::data::cache::CacheStore;
use smawatch_core::data::{
    ConstituentList, ConstituentSource, DataError, FetchProgress, PriceSeries, PriceSource,
    WikipediaConstituents, YahooProvider,
};
use smawatch_core::indicators::DEFAULT_SMA_PERIOD;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Cache key of the constituent list.
pub const CONSTITUENTS_KEY: &str = "sp500_constituents";

/// A ticker left out of a batch, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: DataError,
}

/// Outcome of a batch: successes and skips, both in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub results: Vec<AnalysisResult>,
    pub skipped: Vec<SkippedTicker>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len() + self.skipped.len()
    }

    /// Skips caused by short listing history.
    pub fn omitted(&self) -> usize {
        self.skipped.iter().filter(|s| s.reason.is_omission()).count()
    }

    /// Skips caused by fetch, lookup or storage failures.
    pub fn failed(&self) -> usize {
        self.skipped.len() - self.omitted()
    }
}

/// Full-index run: membership, the batch, and the joined dashboard rows.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub constituents: ConstituentList,
    pub batch: BatchReport,
    pub rows: Vec<DashboardRow>,
}

/// Whether reads may be served from a fresh cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Cached,
    /// Refetch everything; entries are replaced only after a successful fetch.
    Forced,
}

/// Counts from a cache warm-up pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Pipeline {
    cache: CacheStore,
    prices: Box<dyn PriceSource>,
    constituents: Box<dyn ConstituentSource>,
    sma_period: usize,
    history_weeks: usize,
}

impl Pipeline {
    pub fn new(
        cache: CacheStore,
        prices: Box<dyn PriceSource>,
        constituents: Box<dyn ConstituentSource>,
    ) -> Self {
        Self {
            cache,
            prices,
            constituents,
            sma_period: DEFAULT_SMA_PERIOD,
            history_weeks: 260,
        }
    }

    /// Override the SMA period and the requested history window.
    pub fn with_window(mut self, sma_period: usize, history_weeks: usize) -> Self {
        self.sma_period = sma_period;
        self.history_weeks = history_weeks;
        self
    }

    /// Wire the production adapters and the configured cache backend.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let timeout = config.http.timeout();
        let ua = &config.http.user_agent;
        let prices = YahooProvider::new(timeout, ua)?;
        let constituents = WikipediaConstituents::new(timeout, ua)?;
        let cache = config.build_cache_store()?;

        info!(
            backend = cache.backend_name(),
            ttl_hours = config.cache.ttl_hours,
            "pipeline ready"
        );

        Ok(Self::new(cache, Box::new(prices), Box::new(constituents))
            .with_window(config.analysis.sma_period, config.analysis.history_weeks))
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn sma_period(&self) -> usize {
        self.sma_period
    }

    /// Requested date range. A window too long to represent starts at the
    /// earliest representable date, which asks the source for everything.
    fn window(&self) -> (NaiveDate, NaiveDate) {
        let end = Utc::now().date_naive();
        let start = i64::try_from(self.history_weeks)
            .ok()
            .and_then(Duration::try_weeks)
            .and_then(|span| end.checked_sub_signed(span))
            .unwrap_or(NaiveDate::MIN);
        (start, end)
    }

    fn through_cache<T, F>(&self, key: &str, freshness: Freshness, fetch: F) -> Result<T, DataError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, DataError>,
    {
        match freshness {
            Freshness::Cached => self.cache.get_or_fetch(key, fetch),
            Freshness::Forced => self.cache.refresh(key, fetch),
        }
    }

    /// Constituent list, served from cache when fresh.
    pub fn load_constituents(&self) -> Result<ConstituentList, DataError> {
        self.constituents_with(Freshness::Cached)
    }

    fn constituents_with(&self, freshness: Freshness) -> Result<ConstituentList, DataError> {
        self.through_cache(CONSTITUENTS_KEY, freshness, || {
            info!(source = self.constituents.name(), "fetching constituents");
            let list = self.constituents.fetch_constituents()?;
            // Never cache an empty membership.
            if list.is_empty() {
                return Err(DataError::SourceUnavailable("constituent list is empty".into()));
            }
            Ok(list)
        })
    }

    /// Weekly series for `ticker`, served from cache when fresh.
    pub fn price_series(&self, ticker: &str) -> Result<PriceSeries, DataError> {
        self.series_with(ticker, Freshness::Cached)
    }

    fn series_with(&self, ticker: &str, freshness: Freshness) -> Result<PriceSeries, DataError> {
        self.through_cache(ticker, freshness, || {
            let (start, end) = self.window();
            info!(ticker, source = self.prices.name(), %start, %end, "fetching weekly closes");
            self.prices.fetch_price_series(ticker, start, end)
        })
    }

    /// Analyze one ticker against `thresholds`.
    pub fn analyze(&self, ticker: &str, thresholds: &Thresholds) -> Result<AnalysisResult, DataError> {
        self.analyze_with(ticker, thresholds, Freshness::Cached)
    }

    fn analyze_with(
        &self,
        ticker: &str,
        thresholds: &Thresholds,
        freshness: Freshness,
    ) -> Result<AnalysisResult, DataError> {
        let series = self.series_with(ticker, freshness)?;
        analyze_series(&series, self.sma_period, thresholds)
    }

    /// Analyze every ticker in parallel. Results keep input order.
    pub fn analyze_batch<S: AsRef<str> + Sync>(
        &self,
        tickers: &[S],
        thresholds: &Thresholds,
        progress: &dyn FetchProgress,
    ) -> BatchReport {
        self.batch_with(tickers, thresholds, progress, Freshness::Cached)
    }

    fn batch_with<S: AsRef<str> + Sync>(
        &self,
        tickers: &[S],
        thresholds: &Thresholds,
        progress: &dyn FetchProgress,
        freshness: Freshness,
    ) -> BatchReport {
        let total = tickers.len();
        let done = AtomicUsize::new(0);
        progress.on_batch_start(total);

        let outcomes: Vec<(String, Result<AnalysisResult, DataError>)> = tickers
            .par_iter()
            .map(|ticker| {
                let ticker = ticker.as_ref();
                let outcome = self.analyze_with(ticker, thresholds, freshness);
                let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.on_complete(ticker, n, total, &outcome.as_ref().map(|_| ()).map_err(|e| e.clone()));
                (ticker.to_string(), outcome)
            })
            .collect();

        let mut report = BatchReport::default();
        for (ticker, outcome) in outcomes {
            match outcome {
                Ok(result) => report.results.push(result),
                Err(reason) => {
                    warn!(ticker = %ticker, kind = reason.kind(), "skipped: {reason}");
                    report.skipped.push(SkippedTicker { ticker, reason });
                }
            }
        }

        progress.on_batch_complete(report.results.len(), report.skipped.len(), total);
        info!(
            analysed = report.results.len(),
            omitted = report.omitted(),
            failed = report.failed(),
            "batch complete"
        );
        report
    }

    /// Constituents, then the whole index, joined into dashboard rows.
    ///
    /// Failing to obtain the constituent list aborts the run.
    pub fn run_index(
        &self,
        thresholds: &Thresholds,
        progress: &dyn FetchProgress,
    ) -> Result<IndexReport, DataError> {
        self.index_with(thresholds, progress, Freshness::Cached)
    }

    /// `run_index` that refetches the constituents and every ticker even
    /// when their entries are fresh.
    ///
    /// Nothing is deleted up front: an entry is overwritten only by a
    /// successful fetch, so a failed refresh leaves the previous data
    /// servable.
    pub fn run_index_forced(
        &self,
        thresholds: &Thresholds,
        progress: &dyn FetchProgress,
    ) -> Result<IndexReport, DataError> {
        self.index_with(thresholds, progress, Freshness::Forced)
    }

    fn index_with(
        &self,
        thresholds: &Thresholds,
        progress: &dyn FetchProgress,
        freshness: Freshness,
    ) -> Result<IndexReport, DataError> {
        let constituents = self.constituents_with(freshness)?;
        let tickers = constituents.all_tickers();
        let batch = self.batch_with(tickers.as_slice(), thresholds, progress, freshness);
        let rows = join_rows(&batch.results, &constituents);
        Ok(IndexReport {
            constituents,
            batch,
            rows,
        })
    }

    /// Fetch-or-serve every ticker's series without analysing it.
    pub fn warm_cache<S: AsRef<str> + Sync>(
        &self,
        tickers: &[S],
        progress: &dyn FetchProgress,
    ) -> WarmSummary {
        let total = tickers.len();
        let done = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        progress.on_batch_start(total);

        tickers.par_iter().for_each(|ticker| {
            let ticker = ticker.as_ref();
            let outcome = self.price_series(ticker).map(|_| ());
            if let Err(e) = &outcome {
                warn!(ticker, kind = e.kind(), "warm-up failed: {e}");
                failed.fetch_add(1, Ordering::SeqCst);
            }
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            progress.on_complete(ticker, n, total, &outcome);
        });

        let failed = failed.into_inner();
        let summary = WarmSummary {
            succeeded: total - failed,
            failed,
        };
        progress.on_batch_complete(summary.succeeded, summary.failed, total);
        summary
    }
}
