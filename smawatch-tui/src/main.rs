//! smawatch TUI: S&P 500 constituents against their 200-week simple moving
//! average.
//!
//! Screens:
//! 1. Login: access-code gate, skipped when no code is configured
//! 2. Dashboard: summary, deviation table, distribution, above/below views
//!
//! Logs go to `smawatch.log` in the cache directory; the terminal belongs
//! to the UI.

mod app;
mod input;
mod persistence;
#[cfg(test)]
mod test_helpers;
mod theme;
mod ui;
mod worker;

use std::fs::File;
use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use smawatch_runner::{AppConfig, Pipeline};

use crate::app::{AppState, Screen, EXPORT_FILE};
use crate::worker::WorkerCommand;

fn init_file_tracing(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let path = dir.join("smawatch.log");
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(path)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var_os("SMAWATCH_CONFIG").map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;
    let log_path = init_file_tracing(&config.cache.resolved_dir())?;
    tracing::info!(log = %log_path.display(), "smawatch tui starting");

    // Fail before touching the terminal if the backend can't be built.
    let pipeline = Pipeline::from_config(&config).context("building the pipeline")?;
    let cache_label = pipeline.cache().backend_name().to_string();

    // Install a panic hook that restores the terminal before printing the panic.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));

    let state_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("smawatch")
        .join("state.json");
    let persisted = persistence::load(&state_path);

    // Worker channels
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();
    let worker_handle =
        worker::spawn_worker(pipeline, cmd_rx, resp_tx).context("spawning the worker thread")?;

    let mut app = AppState::new(
        cmd_tx.clone(),
        resp_rx,
        config.access.clone(),
        config.thresholds(),
        PathBuf::from(EXPORT_FILE),
    );
    app.cache_label = cache_label;
    persistence::apply(&mut app, persisted);

    // Without a gate the dashboard loads straight away.
    if app.screen == Screen::Dashboard {
        app.request_run(false);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app);

    if let Err(e) = persistence::save(&state_path, &persistence::extract(&app)) {
        tracing::warn!("could not save ui state: {e}");
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let _ = cmd_tx.send(WorkerCommand::Shutdown);
    if app.load.in_progress {
        // The batch would finish before the worker saw Shutdown.
        tracing::info!("exiting with an index run in flight");
    } else {
        let _ = worker_handle.join();
    }

    tracing::info!("smawatch tui stopped");
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
) -> Result<()> {
    loop {
        // 1. Render
        terminal.draw(|f| ui::draw(f, app))?;

        // 2. Drain worker responses (non-blocking)
        while let Ok(resp) = app.worker_rx.try_recv() {
            app.handle_response(resp);
        }

        // 3. Poll for input events (50ms timeout for ~20 FPS tick)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                input::handle_key(app, key);
            }
        }

        if !app.running {
            break;
        }
    }
    Ok(())
}
