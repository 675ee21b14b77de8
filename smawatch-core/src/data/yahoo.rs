//! Yahoo Finance weekly price provider.
//!
//! Fetches weekly closes from Yahoo's v8 chart API (`interval=1wk`). Every
//! request carries a timeout; there are no automatic retries, a failure
//! surfaces immediately so the caller can skip the ticker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. Anything we can't parse is reported as `SourceUnavailable`.

use super::provider::{DataError, PriceSource};
use super::series::{PriceSeries, WeeklyClose};
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

/// Yahoo Finance weekly price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(timeout: std::time::Duration, user_agent: &str) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DataError::SourceUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the provider at a different host (mirrors, local stubs).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Yahoo uses dashes where the index lists use dots (BRK.B → BRK-B).
    pub fn yahoo_symbol(symbol: &str) -> String {
        symbol.trim().replace('.', "-")
    }

    /// Build the weekly chart API URL for a symbol and date range.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive, so step past the end date.
        let end_ts = (end + Duration::days(1))
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{}/v8/finance/chart/{}?period1={start_ts}&period2={end_ts}&interval=1wk&events=history",
            self.base_url.trim_end_matches('/'),
            Self::yahoo_symbol(symbol),
        )
    }
}

/// Parse a chart API body into a weekly series.
fn parse_response(symbol: &str, resp: ChartResponse) -> Result<PriceSeries, DataError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => DataError::SourceUnavailable(format!("{}: {}", err.code, err.description)),
        None => DataError::SourceUnavailable("empty chart result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::SourceUnavailable("chart result array is empty".into()))?;

    // A known symbol with no trading history comes back without timestamps.
    let timestamps = data.timestamp.unwrap_or_default();

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::SourceUnavailable("no quote data".into()))?;

    let mut points = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| DataError::SourceUnavailable(format!("invalid timestamp: {ts}")))?;

        // Null closes mark weeks without trades (halts, holidays).
        if let Some(close) = quote.close.get(i).copied().flatten() {
            points.push(WeeklyClose::new(date, close));
        }
    }

    let series = PriceSeries::align_weekly(symbol, points);
    if series.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(series)
}

/// Parse a raw chart API body, given the HTTP status it came with.
fn parse_body(
    symbol: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> Result<PriceSeries, DataError> {
    match serde_json::from_str::<ChartResponse>(body) {
        // Yahoo sends 404 with a well-formed error body for unknown symbols.
        Ok(chart) => parse_response(symbol, chart),
        Err(_) if status == reqwest::StatusCode::NOT_FOUND => Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }),
        Err(e) if status.is_success() => Err(DataError::SourceUnavailable(format!(
            "failed to parse chart response for {symbol}: {e}"
        ))),
        Err(_) => Err(DataError::SourceUnavailable(format!(
            "HTTP {status} for {symbol}"
        ))),
    }
}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let url = self.chart_url(symbol, start, end);
        debug!(%url, symbol, "requesting weekly chart");

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                DataError::SourceUnavailable(format!("request for {symbol} timed out"))
            } else {
                DataError::SourceUnavailable(format!("request for {symbol} failed: {e}"))
            }
        })?;

        let status = resp.status();
        let body = resp.text().map_err(|e| {
            DataError::SourceUnavailable(format!("failed to read body for {symbol}: {e}"))
        })?;

        parse_body(symbol, status, &body)
    }
}
