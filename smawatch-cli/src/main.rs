//! SMAWatch CLI: one-shot data and analysis commands.
//!
//! Commands:
//! - `constituents`: list current S&P 500 members and sector counts
//! - `fetch`: warm the cache for some or all tickers
//! - `analyze`: 200-week SMA deviation table, threshold views, CSV export
//! - `cache status`: age and freshness of every cached entry
//! - `cache clear`: remove every cached entry

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use smawatch_core::classify::Thresholds;
use smawatch_core::data::{Constituent, ConstituentList, StdoutProgress};
use smawatch_runner::report::{
    above_threshold, below_threshold, deviation_range, export_csv, filter_bounds, join_rows,
    DashboardRow,
};
use smawatch_runner::{AppConfig, BackendKind, BatchReport, Pipeline};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "smawatch",
    about = "SMAWatch CLI: S&P 500 stocks against their 200-week moving average"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./smawatch.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List index members (cached for the freshness window).
    Constituents {
        /// Only show members of this GICS sector.
        #[arg(long)]
        sector: Option<String>,
    },
    /// Fetch weekly closes into the cache without analysing them.
    Fetch {
        /// Tickers to fetch. Defaults to every index member.
        tickers: Vec<String>,

        /// Only process the first N tickers.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compute each ticker's deviation from its 200-week SMA.
    Analyze {
        /// Tickers to analyze. Defaults to every index member.
        tickers: Vec<String>,

        /// Overbought threshold as a fraction (0.5 = 50% above the SMA).
        #[arg(long)]
        overbought: Option<f64>,

        /// Oversold threshold as a positive fraction (0.3 = 30% below the SMA).
        #[arg(long)]
        oversold: Option<f64>,

        /// Hide rows with deviation below this fraction.
        #[arg(long, allow_hyphen_values = true)]
        lower: Option<f64>,

        /// Hide rows with deviation above this fraction.
        #[arg(long, allow_hyphen_values = true)]
        upper: Option<f64>,

        /// Write the (filtered) table to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Only process the first N tickers.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show every cached entry with its age and freshness.
    Status,
    /// Remove every cached entry.
    Clear {
        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Constituents { sector } => run_constituents(&config, sector.as_deref()),
        Commands::Fetch { tickers, limit } => run_fetch(&config, tickers, limit),
        Commands::Analyze {
            tickers,
            overbought,
            oversold,
            lower,
            upper,
            csv,
            limit,
        } => {
            let defaults = config.thresholds();
            let thresholds = Thresholds::new(
                overbought.unwrap_or(defaults.overbought),
                oversold.unwrap_or(defaults.oversold),
            )?;
            let opts = AnalyzeOptions {
                thresholds,
                lower,
                upper,
                csv,
                limit,
            };
            run_analyze(&config, tickers, &opts)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config),
            CacheAction::Clear { confirm } => run_cache_clear(&config, confirm),
        },
    }
}

fn pipeline(config: &AppConfig) -> Result<Pipeline> {
    Pipeline::from_config(config).context("setting up data sources and cache")
}

/// Explicit tickers, or every index member; truncated to `limit`.
fn resolve_tickers(
    pipeline: &Pipeline,
    tickers: Vec<String>,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let mut tickers = if tickers.is_empty() {
        let list = pipeline
            .load_constituents()
            .context("loading S&P 500 constituents")?;
        list.all_tickers().into_iter().map(String::from).collect()
    } else {
        tickers
            .into_iter()
            .map(|t| t.trim().to_ascii_uppercase())
            .collect::<Vec<_>>()
    };
    if let Some(n) = limit {
        tickers.truncate(n);
    }
    if tickers.is_empty() {
        bail!("no tickers to process");
    }
    Ok(tickers)
}

fn run_constituents(config: &AppConfig, sector: Option<&str>) -> Result<()> {
    let pipeline = pipeline(config)?;
    let list = pipeline
        .load_constituents()
        .context("loading S&P 500 constituents")?;

    let members = select_sector(&list, sector)?;

    println!("{:<8} {:<40} {:<24} {}", "Ticker", "Company", "Sector", "Sub-Industry");
    println!("{}", "-".repeat(100));
    for c in &members {
        println!(
            "{:<8} {:<40} {:<24} {}",
            c.ticker,
            truncate(&c.company, 40),
            truncate(&c.sector, 24),
            c.sub_industry
        );
    }

    println!();
    println!("Members: {} of {}", members.len(), list.len());
    if sector.is_none() {
        for (name, group) in list.by_sector() {
            println!("  {name:<28} {:>4}", group.len());
        }
    }
    Ok(())
}

/// Members of `sector` (matched case-insensitively), or every member.
fn select_sector<'a>(list: &'a ConstituentList, sector: Option<&str>) -> Result<Vec<&'a Constituent>> {
    let Some(wanted) = sector else {
        return Ok(list.constituents().iter().collect());
    };
    let names = list.sector_names();
    match names.iter().find(|name| name.eq_ignore_ascii_case(wanted)) {
        Some(name) => Ok(list.sector_members(name)),
        None => bail!("unknown sector '{wanted}'; known sectors: {}", names.join(", ")),
    }
}

fn run_fetch(config: &AppConfig, tickers: Vec<String>, limit: Option<usize>) -> Result<()> {
    let pipeline = pipeline(config)?;
    let tickers = resolve_tickers(&pipeline, tickers, limit)?;

    let summary = pipeline.warm_cache(tickers.as_slice(), &StdoutProgress);
    if summary.succeeded == 0 {
        bail!("every fetch failed ({} tickers)", summary.failed);
    }
    Ok(())
}

struct AnalyzeOptions {
    thresholds: Thresholds,
    lower: Option<f64>,
    upper: Option<f64>,
    csv: Option<PathBuf>,
    limit: Option<usize>,
}

fn run_analyze(config: &AppConfig, tickers: Vec<String>, opts: &AnalyzeOptions) -> Result<()> {
    let pipeline = pipeline(config)?;
    let explicit = !tickers.is_empty();
    let tickers = resolve_tickers(&pipeline, tickers, opts.limit)?;

    let batch = pipeline.analyze_batch(tickers.as_slice(), &opts.thresholds, &StdoutProgress);

    // Metadata is optional for hand-picked tickers.
    let constituents = match pipeline.load_constituents() {
        Ok(list) => list,
        Err(e) if explicit => {
            warn!("constituent metadata unavailable: {e}");
            ConstituentList::new(Vec::new())
        }
        Err(e) => return Err(e).context("loading S&P 500 constituents"),
    };
    let rows = join_rows(&batch.results, &constituents);

    let (min, max) = deviation_range(&rows).unwrap_or((0.0, 0.0));
    let lower = opts.lower.unwrap_or(min);
    let upper = opts.upper.unwrap_or(max);
    if lower > upper {
        bail!("lower bound {lower} is above upper bound {upper}");
    }
    let filtered = filter_bounds(&rows, lower, upper);

    println!();
    print_table(&filtered);
    print_threshold_views(&filtered, &opts.thresholds);
    print_skipped(&batch);

    println!();
    println!(
        "Analysed {} of {} tickers ({} shown, bounds {:.1}% to {:.1}%)",
        batch.results.len(),
        batch.total(),
        filtered.len(),
        lower * 100.0,
        upper * 100.0
    );

    if let Some(path) = &opts.csv {
        export_csv(&filtered, path)
            .with_context(|| format!("writing CSV to {}", path.display()))?;
        info!(path = %path.display(), rows = filtered.len(), "exported CSV");
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_table(rows: &[DashboardRow]) {
    println!(
        "{:>9} {:<7} {:<32} {:>10} {:>10} {:<24} {}",
        "Dev %", "Ticker", "Company", "SMA 200w", "Close", "Sector", "Label"
    );
    println!("{}", "-".repeat(108));
    for r in rows {
        println!(
            "{:>8.2}% {:<7} {:<32} {:>10.2} {:>10.2} {:<24} {}",
            r.deviation_pct(),
            r.ticker,
            truncate(&r.company, 32),
            r.sma,
            r.close,
            truncate(&r.sector, 24),
            r.classification
        );
    }
}

fn print_threshold_views(rows: &[DashboardRow], thresholds: &Thresholds) {
    let above = above_threshold(rows, thresholds.overbought);
    let below = below_threshold(rows, thresholds.oversold);

    println!();
    println!(
        "Above +{:.0}%: {}",
        thresholds.overbought * 100.0,
        join_tickers(&above)
    );
    println!(
        "Below -{:.0}%: {}",
        thresholds.oversold * 100.0,
        join_tickers(&below)
    );
}

fn join_tickers(rows: &[&DashboardRow]) -> String {
    if rows.is_empty() {
        return "(none)".to_string();
    }
    rows.iter()
        .map(|r| format!("{} ({:+.1}%)", r.ticker, r.deviation_pct()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_skipped(batch: &BatchReport) {
    if batch.skipped.is_empty() {
        return;
    }
    println!();
    println!(
        "Skipped {} ticker(s): {} without enough history, {} failed",
        batch.skipped.len(),
        batch.omitted(),
        batch.failed()
    );
    for s in &batch.skipped {
        println!("  {:<7} {:<22} {}", s.ticker, s.reason.kind(), s.reason);
    }
}

fn run_cache_status(config: &AppConfig) -> Result<()> {
    let store = config.build_cache_store()?;
    let now = Utc::now();
    let entries = store.status(now).context("reading cache")?;

    println!("Backend: {}", store.backend_name());
    print_location(config);
    println!("Freshness window: {} h", store.ttl().num_hours());

    if entries.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }

    let fresh = entries.iter().filter(|e| e.fresh).count();
    println!("Entries: {} ({fresh} fresh, {} stale)", entries.len(), entries.len() - fresh);
    println!();
    println!("{:<24} {:<22} {:>10} {}", "Key", "Written (UTC)", "Age", "State");
    println!("{}", "-".repeat(66));
    for e in &entries {
        println!(
            "{:<24} {:<22} {:>10} {}",
            e.key,
            e.written_at.format("%Y-%m-%d %H:%M:%S"),
            format_age(e.age),
            if e.fresh { "fresh" } else { "stale" }
        );
    }
    Ok(())
}

fn run_cache_clear(config: &AppConfig, confirm: bool) -> Result<()> {
    let store = config.build_cache_store()?;
    let entries = store.status(Utc::now()).context("reading cache")?;

    if entries.is_empty() {
        println!("Cache is already empty.");
        return Ok(());
    }

    println!("Found {} cached entr(y/ies) in {}:", entries.len(), store.backend_name());
    print_location(config);

    if !confirm {
        println!();
        println!("Dry run. Pass --confirm to actually delete.");
        return Ok(());
    }

    let removed = store.clear().context("clearing cache")?;
    println!("Done. Removed {removed} entr(y/ies).");
    Ok(())
}

fn print_location(config: &AppConfig) {
    match config.cache.backend {
        BackendKind::Local => println!("Location: {}", config.cache.resolved_dir().display()),
        BackendKind::Gcs => println!(
            "Location: gs://{}/{}",
            config.cache.bucket.as_deref().unwrap_or_default(),
            config.cache.prefix
        ),
        BackendKind::Memory => println!("Location: (process memory)"),
    }
}

fn format_age(age: chrono::Duration) -> String {
    let minutes = age.num_minutes();
    if minutes < 60 {
        format!("{minutes}m")
    } else if minutes < 60 * 48 {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    } else {
        format!("{}d", minutes / (60 * 24))
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
