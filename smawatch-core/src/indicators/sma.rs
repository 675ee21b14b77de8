//! Simple Moving Average (SMA) over weekly closes.
//!
//! The dashboard only needs the latest value, so `trailing` averages
//! exactly the last `period` closes instead of building a rolling series.

/// Lookback of the dashboard's moving average, in weeks.
pub const DEFAULT_SMA_PERIOD: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// `period` must be at least 1; a zero period is clamped to 1.
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Mean of exactly the trailing `period` closes, or `None` when there
    /// are fewer than `period` closes or the window holds a NaN.
    pub fn trailing(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        if window.iter().any(|c| c.is_nan()) {
            return None;
        }
        Some(window.iter().sum::<f64>() / self.period as f64)
    }
}

impl Default for Sma {
    fn default() -> Self {
        Self::new(DEFAULT_SMA_PERIOD)
    }
}

/// Relative distance of `close` from `ma`: `(close - ma) / ma`.
pub fn deviation(close: f64, ma: f64) -> f64 {
    (close - ma) / ma
}
