// =============================================================================
// Meridian — deterministic tick-driven FX/metals trading engine
// =============================================================================
//
// The engine always starts against the paper broker unless live mode passes
// every startup precondition. One evaluation cycle runs per minute.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod backtest;
mod broker;
mod config;
mod engine;
mod execution;
mod indicators;
mod journal;
mod ml;
mod models;
mod news;
mod observer;
mod pips;
mod report;
mod risk;
mod sessions;
mod snd;
mod store;
mod strategies;
mod supervisor;
mod trade_book;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::broker::{BrokerAdapter, PaperBroker};
use crate::config::{validate_live, BotConfig, StartupError};
use crate::engine::BotEngine;
use crate::journal::TradeJournal;
use crate::report::DailyReporter;
use crate::store::SqliteStore;

const STORE_PATH: &str = "data/trades.sqlite";
const JOURNAL_PATH: &str = "journal/trades.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Paper,
    DryRun,
    Live,
}

#[derive(Parser)]
#[command(name = "meridian-bot", about = "Deterministic FX/metals trading engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the live evaluation loop (one cycle per minute).
    Run {
        #[arg(long)]
        config: String,
        #[arg(long, value_enum, default_value = "paper")]
        mode: Mode,
    },
    /// Replay an M15 CSV file through the engine against the paper broker.
    Backtest {
        #[arg(long)]
        config: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        m15_csv: String,
    },
    /// Print the daily report for a date (YYYY-MM-DD).
    Report {
        #[arg(long)]
        date: String,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config, mode } => run(&config, mode).await,
        Command::Backtest {
            config,
            symbol,
            m15_csv,
        } => {
            let config = BotConfig::load(&config)?;
            let store = SqliteStore::open(STORE_PATH)?;
            let journal = TradeJournal::new(JOURNAL_PATH)?;
            backtest::run_backtest(config, &symbol, &m15_csv, store, journal)
        }
        Command::Report { date, json } => {
            let store = SqliteStore::open(STORE_PATH)?;
            let reporter = DailyReporter::new(&store);
            let day = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")?;
            let at = Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN));
            let output = if json {
                reporter.daily_report_json(at)?
            } else {
                reporter.daily_report(at)?
            };
            println!("{output}");
            Ok(())
        }
    }
}

async fn run(config_path: &str, mode: Mode) -> Result<()> {
    let mut config = BotConfig::load(config_path)?;

    match mode {
        Mode::Live => {
            validate_live(&config)?;
            info!(
                acknowledgement = %config.live_acknowledgement,
                "live_enabled"
            );
            // The live venue adapter ships separately; without it there is
            // nothing safe to connect to.
            return Err(StartupError::LiveAdapterUnavailable.into());
        }
        Mode::Paper => {
            config.paper_trading = true;
            config.dry_run = false;
        }
        Mode::DryRun => {
            config.paper_trading = true;
            config.dry_run = true;
            info!("dry_run");
        }
    }

    let mut adapter = PaperBroker::default();
    if !adapter.connect() {
        return Err(StartupError::ConnectFailed("paper broker".to_string()).into());
    }

    let store = SqliteStore::open(STORE_PATH)?;
    let journal = TradeJournal::new(JOURNAL_PATH)?;
    let mut engine = BotEngine::new(config, adapter, store, journal)?;

    info!(mode = ?mode, "engine started");
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Utc::now();
                if let Err(err) = engine.run_once(now) {
                    error!(error = %err, "cycle failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }
    engine.adapter_mut().shutdown();
    Ok(())
}
