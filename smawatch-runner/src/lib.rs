//! SMAWatch Runner: configuration, the moving-average pipeline, and the
//! dashboard report.
//!
//! This crate builds on `smawatch-core` to provide:
//! - `AppConfig`: TOML + environment configuration and backend wiring
//! - `Pipeline`: cached per-ticker analysis, parallel batches with
//!   per-ticker failure isolation, full-index runs, cache warm-up
//! - Report: constituent join, deviation sort, bound filter, threshold
//!   views, CSV export

pub mod config;
pub mod pipeline;
pub mod report;

pub use config::{AppConfig, BackendKind, ConfigError};
pub use pipeline::{BatchReport, IndexReport, Pipeline, SkippedTicker, WarmSummary, CONSTITUENTS_KEY};
pub use report::{DashboardRow, ReportError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn pipeline_is_send_sync() {
        assert_send::<Pipeline>();
        assert_sync::<Pipeline>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<BatchReport>();
        assert_sync::<BatchReport>();
        assert_send::<IndexReport>();
        assert_send::<DashboardRow>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
    }
}
