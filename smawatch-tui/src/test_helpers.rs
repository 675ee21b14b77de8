//! Test helpers: stub sources, in-memory pipelines and dashboard rows.

use chrono::{Duration, NaiveDate};
use smawatch_core::classify::Thresholds;
use smawatch_core::data::cache::{CacheStore, MemoryBackend};
use smawatch_core::data::{
    Constituent, ConstituentList, ConstituentSource, DataError, PriceSeries, PriceSource,
    WeeklyClose,
};
use smawatch_runner::report::DashboardRow;
use smawatch_runner::Pipeline;

/// Index of three: `UP` and `DOWN` have 200 weeks, `NEW` only 10.
pub struct StubIndex;

impl ConstituentSource for StubIndex {
    fn name(&self) -> &str {
        "stub"
    }

    fn fetch_constituents(&self) -> Result<ConstituentList, DataError> {
        let member = |ticker: &str| Constituent {
            ticker: ticker.into(),
            company: format!("{ticker} Inc"),
            sector: "Industrials".into(),
            sub_industry: "Machinery".into(),
        };
        Ok(ConstituentList::new(vec![member("UP"), member("DOWN"), member("NEW")]))
    }
}

impl PriceSource for StubIndex {
    fn name(&self) -> &str {
        "stub"
    }

    fn fetch_price_series(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let (weeks, last) = match symbol {
            "UP" => (200, 500.0),
            "DOWN" => (200, 20.0),
            "NEW" => (10, 100.0),
            _ => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.into(),
                })
            }
        };
        let base = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let mut points: Vec<WeeklyClose> = (0..weeks - 1)
            .map(|i| WeeklyClose::new(base + Duration::weeks(i), 100.0))
            .collect();
        points.push(WeeklyClose::new(base + Duration::weeks(weeks - 1), last));
        Ok(PriceSeries::align_weekly(symbol, points))
    }
}

/// Every request fails with `SourceUnavailable("offline")`.
pub struct FailingConstituents;

impl ConstituentSource for FailingConstituents {
    fn name(&self) -> &str {
        "failing"
    }

    fn fetch_constituents(&self) -> Result<ConstituentList, DataError> {
        Err(DataError::SourceUnavailable("offline".into()))
    }
}

impl PriceSource for FailingConstituents {
    fn name(&self) -> &str {
        "failing"
    }

    fn fetch_price_series(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<PriceSeries, DataError> {
        Err(DataError::SourceUnavailable("offline".into()))
    }
}

pub fn memory_pipeline() -> Pipeline {
    Pipeline::new(
        CacheStore::with_default_ttl(Box::new(MemoryBackend::new())),
        Box::new(StubIndex),
        Box::new(StubIndex),
    )
}

/// A row with `sma = 100` and the default label for `deviation`.
pub fn row(ticker: &str, deviation: f64) -> DashboardRow {
    DashboardRow {
        ticker: ticker.into(),
        company: format!("{ticker} Inc"),
        sector: "Industrials".into(),
        sub_industry: "Machinery".into(),
        close: 100.0 * (1.0 + deviation),
        sma: 100.0,
        deviation,
        as_of: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        classification: Thresholds::default().classify(deviation),
    }
}
