//! Criterion benchmarks for the SMA hot path.
//!
//! 1. Trailing 200-week average over typical history lengths
//! 2. Full per-ticker analysis (align + SMA + classify)

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use smawatch_core::data::{PriceSeries, WeeklyClose};
use smawatch_core::indicators::{Sma, DEFAULT_SMA_PERIOD};
use smawatch_core::{analyze_series, Thresholds};

fn make_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0)
        .collect()
}

fn make_points(n: usize) -> Vec<WeeklyClose> {
    let base_date = NaiveDate::from_ymd_opt(2015, 1, 5).unwrap();
    make_closes(n)
        .into_iter()
        .enumerate()
        .map(|(i, close)| WeeklyClose::new(base_date + chrono::Duration::weeks(i as i64), close))
        .collect()
}

fn bench_sma(c: &mut Criterion) {
    let mut group = c.benchmark_group("sma");
    let sma = Sma::new(DEFAULT_SMA_PERIOD);

    for &weeks in &[200, 260, 520] {
        let closes = make_closes(weeks);
        group.bench_with_input(BenchmarkId::new("trailing_200", weeks), &weeks, |b, _| {
            b.iter(|| sma.trailing(black_box(&closes)));
        });
    }

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    let thresholds = Thresholds::default();
    let points = make_points(260);

    group.bench_function("align_and_analyze_260_weeks", |b| {
        b.iter(|| {
            let series = PriceSeries::align_weekly("BENCH", black_box(points.clone()));
            analyze_series(&series, DEFAULT_SMA_PERIOD, &thresholds)
        });
    });

    // Roughly one full index pass, sequential.
    let universe: Vec<PriceSeries> = (0..500)
        .map(|i| PriceSeries::align_weekly(format!("T{i}"), make_points(260)))
        .collect();
    group.bench_function("analyze_500_tickers", |b| {
        b.iter(|| {
            universe
                .iter()
                .map(|s| analyze_series(black_box(s), DEFAULT_SMA_PERIOD, &thresholds))
                .filter(|r| r.is_ok())
                .count()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sma, bench_analysis);
criterion_main!(benches);
