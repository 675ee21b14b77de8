//! Per-ticker analysis: trailing SMA, deviation, classification.
//!
//! Results are derived on every read and never cached.

use crate::classify::{Classification, Thresholds};
use crate::data::{DataError, PriceSeries};
use crate::indicators::{deviation, Sma};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ticker: String,
    /// Latest weekly close.
    pub close: f64,
    /// Week of the latest close.
    pub as_of: NaiveDate,
    /// Mean of the trailing `period` weekly closes.
    pub sma: f64,
    /// `(close - sma) / sma` as a fraction.
    pub deviation: f64,
    pub classification: Classification,
}

impl AnalysisResult {
    pub fn deviation_pct(&self) -> f64 {
        self.deviation * 100.0
    }
}

/// Analyze one series over exactly its trailing `period` closes.
///
/// Fewer than `period` points is `InsufficientHistory`; no partial average
/// is produced.
pub fn analyze_series(
    series: &PriceSeries,
    period: usize,
    thresholds: &Thresholds,
) -> Result<AnalysisResult, DataError> {
    let insufficient = || DataError::InsufficientHistory {
        symbol: series.symbol().to_string(),
        points: series.len(),
        required: period,
    };

    let latest = series.latest().ok_or_else(insufficient)?;
    let closes = series.closes();
    let sma = Sma::new(period).trailing(&closes).ok_or_else(insufficient)?;
    let dev = deviation(latest.close, sma);

    Ok(AnalysisResult {
        ticker: series.symbol().to_string(),
        close: latest.close,
        as_of: latest.date,
        sma,
        deviation: dev,
        classification: thresholds.classify(dev),
    })
}
