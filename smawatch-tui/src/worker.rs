//! Background worker thread. Fetching and analysis never run on the UI thread.
//!
//! Communication with the TUI main thread is via `mpsc` channels.
//! The worker owns the `Pipeline` and a private rayon::ThreadPool (not the
//! global pool), so the per-ticker fan-out stays off the UI's threads.

use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use smawatch_core::classify::Thresholds;
use smawatch_core::data::{DataError, FetchProgress};
use smawatch_runner::{IndexReport, Pipeline};
use tracing::{info, warn};

/// Commands sent from the TUI to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    /// Constituents plus every ticker, served from cache when fresh.
    RunIndex { thresholds: Thresholds },
    /// Refetch the constituents and every ticker even when cached entries
    /// are fresh. Entries are only replaced by successful fetches.
    ForceRefresh { thresholds: Thresholds },
    Shutdown,
}

/// Responses sent from the worker back to the TUI.
#[derive(Debug)]
pub enum WorkerResponse {
    BatchStarted {
        total: usize,
    },
    TickerDone {
        ticker: String,
        done: usize,
        total: usize,
        error: Option<String>,
    },
    IndexReady {
        report: Box<IndexReport>,
    },
    IndexFailed {
        error: String,
    },
}

/// Spawn the background worker thread.
pub fn spawn_worker(
    pipeline: Pipeline,
    rx: Receiver<WorkerCommand>,
    tx: Sender<WorkerResponse>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("smawatch-worker".into())
        .spawn(move || worker_loop(pipeline, rx, tx))
}

fn fetch_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(8)
}

fn worker_loop(pipeline: Pipeline, rx: Receiver<WorkerCommand>, tx: Sender<WorkerResponse>) {
    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(fetch_threads())
        .thread_name(|i| format!("smawatch-fetch-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("private fetch pool unavailable, using the global pool: {e}");
            None
        }
    };

    while let Ok(cmd) = rx.recv() {
        match cmd {
            WorkerCommand::Shutdown => break,
            WorkerCommand::RunIndex { thresholds } => {
                run_index(&pipeline, pool.as_ref(), &thresholds, false, &tx);
            }
            WorkerCommand::ForceRefresh { thresholds } => {
                run_index(&pipeline, pool.as_ref(), &thresholds, true, &tx);
            }
        }
    }
    info!("worker stopped");
}

fn run_index(
    pipeline: &Pipeline,
    pool: Option<&rayon::ThreadPool>,
    thresholds: &Thresholds,
    forced: bool,
    tx: &Sender<WorkerResponse>,
) {
    let progress = ChannelProgress { tx: tx.clone() };
    let job = || {
        if forced {
            pipeline.run_index_forced(thresholds, &progress)
        } else {
            pipeline.run_index(thresholds, &progress)
        }
    };
    let outcome = match pool {
        Some(pool) => pool.install(job),
        None => job(),
    };

    let response = match outcome {
        Ok(report) => {
            if forced {
                // Constituents, plus every series that was fetched, short ones included.
                let refreshed = 1 + report.batch.results.len() + report.batch.omitted();
                info!(refreshed, "forced refresh complete");
            }
            WorkerResponse::IndexReady {
                report: Box::new(report),
            }
        }
        Err(e) => {
            warn!(kind = e.kind(), "index run failed: {e}");
            WorkerResponse::IndexFailed {
                error: e.to_string(),
            }
        }
    };
    let _ = tx.send(response);
}

/// FetchProgress implementation that sends messages through a channel.
struct ChannelProgress {
    tx: Sender<WorkerResponse>,
}

impl FetchProgress for ChannelProgress {
    fn on_batch_start(&self, total: usize) {
        let _ = self.tx.send(WorkerResponse::BatchStarted { total });
    }

    fn on_complete(&self, symbol: &str, done: usize, total: usize, result: &Result<(), DataError>) {
        let _ = self.tx.send(WorkerResponse::TickerDone {
            ticker: symbol.to_string(),
            done,
            total,
            error: result.as_ref().err().map(|e| e.to_string()),
        });
    }

    // The full report follows as IndexReady.
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
