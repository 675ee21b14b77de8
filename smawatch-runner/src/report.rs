//! Dashboard report: analysis results joined with index metadata.
//!
//! Bounds and thresholds here are fractions, like `AnalysisResult::deviation`.
//! Percent only appears in the CSV export and in the UI.

use chrono::NaiveDate;
use serde::Serialize;
use smawatch_core::analysis::AnalysisResult;
use smawatch_core::classify::{Classification, Thresholds};
use smawatch_core::data::ConstituentList;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One dashboard table row.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRow {
    pub ticker: String,
    pub company: String,
    pub sector: String,
    pub sub_industry: String,
    pub close: f64,
    pub sma: f64,
    pub deviation: f64,
    pub as_of: NaiveDate,
    pub classification: Classification,
}

impl DashboardRow {
    pub fn deviation_pct(&self) -> f64 {
        self.deviation * 100.0
    }
}

/// Join results with constituent metadata, sorted ascending by deviation.
///
/// Tickers not in the list (explicit CLI tickers) keep empty metadata.
pub fn join_rows(results: &[AnalysisResult], constituents: &ConstituentList) -> Vec<DashboardRow> {
    let mut rows: Vec<DashboardRow> = results
        .iter()
        .map(|r| {
            let meta = constituents.get(&r.ticker);
            DashboardRow {
                ticker: r.ticker.clone(),
                company: meta.map(|c| c.company.clone()).unwrap_or_default(),
                sector: meta.map(|c| c.sector.clone()).unwrap_or_default(),
                sub_industry: meta.map(|c| c.sub_industry.clone()).unwrap_or_default(),
                close: r.close,
                sma: r.sma,
                deviation: r.deviation,
                as_of: r.as_of,
                classification: r.classification,
            }
        })
        .collect();
    sort_by_deviation(&mut rows);
    rows
}

/// Ascending by deviation; ties broken by ticker.
pub fn sort_by_deviation(rows: &mut [DashboardRow]) {
    rows.sort_by(|a, b| {
        a.deviation
            .total_cmp(&b.deviation)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
}

/// Re-derive every row's label under new thresholds.
pub fn reclassify(rows: &mut [DashboardRow], thresholds: &Thresholds) {
    for row in rows {
        row.classification = thresholds.classify(row.deviation);
    }
}

/// Rows with `lower <= deviation <= upper`.
pub fn filter_bounds(rows: &[DashboardRow], lower: f64, upper: f64) -> Vec<DashboardRow> {
    rows.iter()
        .filter(|r| r.deviation >= lower && r.deviation <= upper)
        .cloned()
        .collect()
}

/// Rows strictly above the overbought threshold.
pub fn above_threshold(rows: &[DashboardRow], overbought: f64) -> Vec<&DashboardRow> {
    rows.iter().filter(|r| r.deviation > overbought).collect()
}

/// Rows strictly below the negative oversold threshold.
pub fn below_threshold(rows: &[DashboardRow], oversold: f64) -> Vec<&DashboardRow> {
    rows.iter().filter(|r| r.deviation < -oversold).collect()
}

/// Smallest and largest deviation, for bound limits.
pub fn deviation_range(rows: &[DashboardRow]) -> Option<(f64, f64)> {
    let mut iter = rows.iter().map(|r| r.deviation);
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

#[derive(Serialize)]
struct CsvRow<'a> {
    deviation_pct: f64,
    ticker: &'a str,
    company: &'a str,
    sma_200w: f64,
    close: f64,
    sector: &'a str,
    sub_industry: &'a str,
    label: &'static str,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Write rows as CSV (header + one line per row).
pub fn write_csv<W: Write>(rows: &[DashboardRow], writer: W) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(CsvRow {
            deviation_pct: round2(row.deviation_pct()),
            ticker: &row.ticker,
            company: &row.company,
            sma_200w: round2(row.sma),
            close: round2(row.close),
            sector: &row.sector,
            sub_industry: &row.sub_industry,
            label: row.classification.label(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_csv(rows: &[DashboardRow], path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    write_csv(rows, std::io::BufWriter::new(file))
}
