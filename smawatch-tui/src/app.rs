//! Application state, single-owner, main-thread only.
//!
//! All TUI state lives here. The worker thread communicates via channels.
//! Thresholds and bounds are fractions, like `DashboardRow::deviation`.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};

use chrono::{DateTime, Local};

use smawatch_core::classify::{Classification, Thresholds};
use smawatch_runner::config::AccessConfig;
use smawatch_runner::report::{
    above_threshold, below_threshold, deviation_range, export_csv, filter_bounds, reclassify,
    DashboardRow,
};
use smawatch_runner::{IndexReport, SkippedTicker};

use crate::worker::{WorkerCommand, WorkerResponse};

/// Step applied by the threshold and bound keys.
pub const ADJUST_STEP: f64 = 0.05;

/// File name of the dashboard export.
pub const EXPORT_FILE: &str = "sp500_filtered.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Help,
    Skipped,
}

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Access-code entry.
#[derive(Debug, Default)]
pub struct LoginState {
    pub input: String,
    pub error: Option<String>,
}

/// Progress of the running index job.
#[derive(Debug, Default)]
pub struct LoadState {
    pub in_progress: bool,
    pub done: usize,
    pub total: usize,
    pub current: Option<String>,
    pub failures: usize,
}

/// Label counts over the rows inside the bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub overbought: usize,
    pub neutral: usize,
    pub oversold: usize,
}

pub struct AppState {
    pub running: bool,
    pub screen: Screen,
    pub overlay: Overlay,
    pub access: AccessConfig,
    pub login: LoginState,

    pub thresholds: Thresholds,
    /// `None` follows the data's minimum deviation.
    pub lower: Option<f64>,
    /// `None` follows the data's maximum deviation.
    pub upper: Option<f64>,

    pub rows: Vec<DashboardRow>,
    pub skipped: Vec<SkippedTicker>,
    pub constituent_count: usize,
    pub loaded_at: Option<DateTime<Local>>,
    pub load: LoadState,

    pub cursor: usize,
    pub scroll_offset: usize,
    pub status_message: Option<(String, StatusLevel)>,
    pub export_path: PathBuf,
    pub cache_label: String,

    pub worker_tx: Sender<WorkerCommand>,
    pub worker_rx: Receiver<WorkerResponse>,
}

impl AppState {
    pub fn new(
        worker_tx: Sender<WorkerCommand>,
        worker_rx: Receiver<WorkerResponse>,
        access: AccessConfig,
        thresholds: Thresholds,
        export_path: PathBuf,
    ) -> Self {
        let screen = if access.is_gated() {
            Screen::Login
        } else {
            Screen::Dashboard
        };
        Self {
            running: true,
            screen,
            overlay: Overlay::None,
            access,
            login: LoginState::default(),
            thresholds,
            lower: None,
            upper: None,
            rows: Vec::new(),
            skipped: Vec::new(),
            constituent_count: 0,
            loaded_at: None,
            load: LoadState::default(),
            cursor: 0,
            scroll_offset: 0,
            status_message: None,
            export_path,
            cache_label: String::new(),
            worker_tx,
            worker_rx,
        }
    }

    // ── Access ───────────────────────────────────────────────────────

    /// Check the typed code. On success the dashboard loads.
    pub fn submit_login(&mut self) {
        let attempt = std::mem::take(&mut self.login.input);
        if self.access.permits(&attempt) {
            self.login.error = None;
            self.screen = Screen::Dashboard;
            self.set_status("Access granted");
            if self.rows.is_empty() {
                self.request_run(false);
            }
        } else {
            tracing::warn!("rejected access code");
            self.login.error = Some("Incorrect access code".into());
        }
    }

    /// Back to the login screen; loaded data is dropped.
    pub fn logout(&mut self) {
        if !self.access.is_gated() {
            self.set_warning("No access code configured; nothing to log out of");
            return;
        }
        self.screen = Screen::Login;
        self.overlay = Overlay::None;
        self.login = LoginState::default();
        self.rows.clear();
        self.skipped.clear();
        self.constituent_count = 0;
        self.loaded_at = None;
        self.lower = None;
        self.upper = None;
        self.cursor = 0;
        self.scroll_offset = 0;
        self.status_message = None;
    }

    // ── Worker traffic ───────────────────────────────────────────────

    /// Ask the worker for a full index run. `force` refetches fresh entries too.
    pub fn request_run(&mut self, force: bool) {
        if self.load.in_progress {
            self.set_warning("A refresh is already running");
            return;
        }
        let thresholds = self.thresholds;
        let cmd = if force {
            WorkerCommand::ForceRefresh { thresholds }
        } else {
            WorkerCommand::RunIndex { thresholds }
        };
        if self.worker_tx.send(cmd).is_err() {
            self.set_error("Worker is not running");
            return;
        }
        self.load = LoadState {
            in_progress: true,
            ..LoadState::default()
        };
        self.set_status(if force {
            "Refetching every ticker..."
        } else {
            "Loading S&P 500 data..."
        });
    }

    pub fn handle_response(&mut self, resp: WorkerResponse) {
        match resp {
            WorkerResponse::BatchStarted { total } => {
                self.load.total = total;
                self.load.done = 0;
            }
            WorkerResponse::TickerDone {
                ticker,
                done,
                total,
                error,
            } => {
                self.load.done = done;
                self.load.total = total;
                if error.is_some() {
                    self.load.failures += 1;
                }
                self.load.current = Some(ticker);
            }
            WorkerResponse::IndexReady { report } => self.apply_report(*report),
            WorkerResponse::IndexFailed { error } => {
                self.load = LoadState::default();
                self.set_error(format!("Could not load the index: {error}"));
            }
        }
    }

    /// Replace the table with a finished run.
    pub fn apply_report(&mut self, report: IndexReport) {
        let IndexReport {
            constituents,
            batch,
            rows,
        } = report;
        self.rows = rows;
        // Thresholds may have moved while the run was in flight.
        reclassify(&mut self.rows, &self.thresholds);
        self.skipped = batch.skipped;
        self.constituent_count = constituents.len();
        self.loaded_at = Some(Local::now());
        self.load = LoadState::default();
        self.clamp_cursor();

        let analysed = self.rows.len();
        let omitted = batch_omitted(&self.skipped);
        let failed = self.skipped.len() - omitted;
        if failed == 0 {
            self.set_status(format!(
                "Loaded {analysed} of {} tickers ({omitted} with short history)",
                self.constituent_count
            ));
        } else {
            self.set_warning(format!(
                "Loaded {analysed} of {} tickers, {failed} failed, {omitted} with short history [s] to list",
                self.constituent_count
            ));
        }
    }

    // ── Thresholds and bounds ────────────────────────────────────────

    pub fn adjust_overbought(&mut self, delta: f64) {
        let next = round_step(self.thresholds.overbought + delta);
        self.set_thresholds(next, self.thresholds.oversold);
    }

    pub fn adjust_oversold(&mut self, delta: f64) {
        let next = round_step(self.thresholds.oversold + delta);
        self.set_thresholds(self.thresholds.overbought, next);
    }

    fn set_thresholds(&mut self, overbought: f64, oversold: f64) {
        match Thresholds::new(overbought, oversold) {
            Ok(t) => {
                self.thresholds = t;
                reclassify(&mut self.rows, &t);
                self.set_status(format!(
                    "Overbought ≥ +{:.0}%, oversold ≤ -{:.0}%",
                    t.overbought * 100.0,
                    t.oversold * 100.0
                ));
            }
            Err(e) => self.set_warning(e.to_string()),
        }
    }

    /// Effective `(lower, upper)` bounds; `None` until data has loaded.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let (lo, hi) = deviation_range(&self.rows)?;
        Some((self.lower.unwrap_or(lo), self.upper.unwrap_or(hi)))
    }

    pub fn adjust_lower(&mut self, delta: f64) {
        let Some((lower, upper)) = self.bounds() else {
            return;
        };
        self.lower = Some(round_step(lower + delta).min(upper));
        self.clamp_cursor();
    }

    pub fn adjust_upper(&mut self, delta: f64) {
        let Some((lower, upper)) = self.bounds() else {
            return;
        };
        self.upper = Some(round_step(upper + delta).max(lower));
        self.clamp_cursor();
    }

    /// Bounds back to the data's full range.
    pub fn reset_bounds(&mut self) {
        self.lower = None;
        self.upper = None;
        self.clamp_cursor();
        self.set_status("Bounds reset to the full range");
    }

    // ── Views ────────────────────────────────────────────────────────

    /// Rows inside the bounds, ascending by deviation.
    pub fn filtered_rows(&self) -> Vec<DashboardRow> {
        match self.bounds() {
            Some((lower, upper)) => filter_bounds(&self.rows, lower, upper),
            None => Vec::new(),
        }
    }

    /// Filtered rows strictly above the overbought threshold, furthest first.
    pub fn above_rows(&self, filtered: &[DashboardRow]) -> Vec<DashboardRow> {
        let mut rows: Vec<DashboardRow> = above_threshold(filtered, self.thresholds.overbought)
            .into_iter()
            .cloned()
            .collect();
        rows.reverse();
        rows
    }

    /// Filtered rows strictly below the negative oversold threshold, furthest first.
    pub fn below_rows(&self, filtered: &[DashboardRow]) -> Vec<DashboardRow> {
        below_threshold(filtered, self.thresholds.oversold)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn label_counts(rows: &[DashboardRow]) -> LabelCounts {
        rows.iter().fold(LabelCounts::default(), |mut acc, r| {
            match r.classification {
                Classification::Overbought => acc.overbought += 1,
                Classification::Neutral => acc.neutral += 1,
                Classification::Oversold => acc.oversold += 1,
            }
            acc
        })
    }

    /// Write the filtered rows to `export_path`.
    pub fn export(&mut self) {
        let rows = self.filtered_rows();
        if rows.is_empty() {
            self.set_warning("Nothing to export");
            return;
        }
        match export_csv(&rows, &self.export_path) {
            Ok(()) => {
                tracing::info!(rows = rows.len(), path = %self.export_path.display(), "exported csv");
                self.set_status(format!(
                    "Exported {} rows to {}",
                    rows.len(),
                    self.export_path.display()
                ));
            }
            Err(e) => self.set_error(format!("Export failed: {e}")),
        }
    }

    // ── Cursor ───────────────────────────────────────────────────────

    pub fn visible_len(&self) -> usize {
        self.filtered_rows().len()
    }

    pub fn cursor_down(&mut self) {
        let len = self.visible_len();
        if len > 0 && self.cursor + 1 < len {
            self.cursor += 1;
        }
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_top(&mut self) {
        self.cursor = 0;
        self.scroll_offset = 0;
    }

    pub fn cursor_bottom(&mut self) {
        self.cursor = self.visible_len().saturating_sub(1);
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible_len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
        if self.scroll_offset > self.cursor {
            self.scroll_offset = self.cursor;
        }
    }

    /// Keep the cursor inside a window of `height` rows.
    pub fn scroll_to_cursor(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + height {
            self.scroll_offset = self.cursor + 1 - height;
        }
    }

    // ── Status ───────────────────────────────────────────────────────

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::error!("{msg}");
        self.status_message = Some((msg, StatusLevel::Error));
    }
}

fn batch_omitted(skipped: &[SkippedTicker]) -> usize {
    skipped.iter().filter(|s| s.reason.is_omission()).count()
}

/// Snap to hundredths so repeated steps don't drift.
fn round_step(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
