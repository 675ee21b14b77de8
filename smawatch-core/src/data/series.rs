//! Weekly close series.
//!
//! A `PriceSeries` is always strictly ascending by date with at most one
//! point per ISO week. Missing weeks stay missing (no forward-fill).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One weekly closing price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeeklyClose {
    pub date: NaiveDate,
    pub close: f64,
}

impl WeeklyClose {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Ordered weekly closes for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<WeeklyClose>,
}

impl PriceSeries {
    /// Build a series from raw points in any order.
    ///
    /// Drops non-finite closes, sorts by date, and collapses several points
    /// in the same ISO week to the latest one (the chart API reports the
    /// in-progress week as an extra row next to the week's opening bar).
    pub fn align_weekly(symbol: impl Into<String>, mut raw: Vec<WeeklyClose>) -> Self {
        raw.retain(|p| p.close.is_finite());
        raw.sort_by_key(|p| p.date);

        let mut points: Vec<WeeklyClose> = Vec::with_capacity(raw.len());
        for point in raw {
            match points.last_mut() {
                Some(last) if last.date.iso_week() == point.date.iso_week() => *last = point,
                _ => points.push(point),
            }
        }

        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[WeeklyClose] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent weekly close.
    pub fn latest(&self) -> Option<&WeeklyClose> {
        self.points.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn sorts_ascending() {
        let s = PriceSeries::align_weekly(
            "SPY",
            vec![
                WeeklyClose::new(d(2024, 1, 15), 3.0),
                WeeklyClose::new(d(2024, 1, 1), 1.0),
                WeeklyClose::new(d(2024, 1, 8), 2.0),
            ],
        );
        assert_eq!(s.closes(), vec![1.0, 2.0, 3.0]);
        for w in s.points().windows(2) {
            assert!(w[0].date < w[1].date);
        }
    }

    #[test]
    fn same_week_keeps_latest_point() {
        // Monday 2024-03-04 is the weekly bar, Thursday 2024-03-07 the live row.
        let s = PriceSeries::align_weekly(
            "AAPL",
            vec![
                WeeklyClose::new(d(2024, 2, 26), 180.0),
                WeeklyClose::new(d(2024, 3, 4), 175.0),
                WeeklyClose::new(d(2024, 3, 7), 169.0),
            ],
        );
        assert_eq!(s.len(), 2);
        assert_eq!(s.latest().unwrap().date, d(2024, 3, 7));
        assert_eq!(s.latest().unwrap().close, 169.0);
    }

    #[test]
    fn drops_non_finite_closes() {
        let s = PriceSeries::align_weekly(
            "MSFT",
            vec![
                WeeklyClose::new(d(2024, 1, 1), f64::NAN),
                WeeklyClose::new(d(2024, 1, 8), 400.0),
                WeeklyClose::new(d(2024, 1, 15), f64::INFINITY),
            ],
        );
        assert_eq!(s.closes(), vec![400.0]);
    }

    #[test]
    fn iso_week_boundary_across_year_end() {
        // 2024-12-30 (Mon) and 2025-01-02 (Thu) share ISO week 2025-W01.
        let s = PriceSeries::align_weekly(
            "QQQ",
            vec![
                WeeklyClose::new(d(2024, 12, 30), 510.0),
                WeeklyClose::new(d(2025, 1, 2), 515.0),
            ],
        );
        assert_eq!(s.len(), 1);
        assert_eq!(s.latest().unwrap().close, 515.0);
    }

    #[test]
    fn empty_input_is_empty_series() {
        let s = PriceSeries::align_weekly("NONE", Vec::new());
        assert!(s.is_empty());
        assert!(s.latest().is_none());
    }
}
