// =============================================================================
// Backtest harness — CSV replay through the real engine
// =============================================================================
//
// Loads M15 bars from CSV, resamples H1 on the fly, and replays bar-by-bar:
// each step seeds the paper broker with the history seen so far plus a tick
// at the bar's close, then calls the engine's `run_once` with the bar time.
// The trade rows land in the same store the live engine writes, so the daily
// reporter and the metrics below work unchanged.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::broker::PaperBroker;
use crate::config::BotConfig;
use crate::engine::BotEngine;
use crate::journal::TradeJournal;
use crate::models::{Bar, Tick};
use crate::store::SqliteStore;

// ---------------------------------------------------------------------------
// CSV loading
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BarRow {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Naive timestamps in the CSV are treated as UTC.
fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    anyhow::bail!("unparseable bar timestamp: {raw}")
}

pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut bars = Vec::new();
    for row in reader.deserialize() {
        let row: BarRow = row.context("malformed bar row")?;
        bars.push(Bar {
            time: parse_time(&row.time)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

/// Collapse every four M15 bars into one H1 bar; a trailing partial chunk is
/// dropped.
pub fn resample_h1(m15_bars: &[Bar]) -> Vec<Bar> {
    m15_bars
        .chunks(4)
        .filter(|chunk| chunk.len() == 4)
        .map(|chunk| Bar {
            time: chunk[3].time,
            open: chunk[0].open,
            high: chunk.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            low: chunk.iter().map(|b| b.low).fold(f64::MAX, f64::min),
            close: chunk[3].close,
            volume: chunk.iter().map(|b| b.volume).sum(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Replay runner
// ---------------------------------------------------------------------------

pub fn run_backtest(
    config: BotConfig,
    symbol: &str,
    m15_csv: impl AsRef<Path>,
    store: SqliteStore,
    journal: TradeJournal,
) -> Result<()> {
    let bars_m15 = load_bars_csv(m15_csv)?;
    info!(symbol, bars = bars_m15.len(), "backtest starting");

    let broker = PaperBroker::default();
    let mut engine = BotEngine::new(config, broker, store, journal)?;

    for i in 0..bars_m15.len() {
        let seen = &bars_m15[..=i];
        let last = &bars_m15[i];
        {
            let broker = engine.adapter_mut();
            broker.seed_bars(symbol, "M15", seen.to_vec());
            broker.seed_bars(symbol, "H1", resample_h1(seen));
            broker.seed_tick(
                symbol,
                Tick {
                    time: last.time,
                    bid: last.close,
                    ask: last.close + 0.0001,
                },
            );
        }
        engine.run_once(last.time)?;
    }

    // Summarize the sealed trades over every replayed day.
    let days: std::collections::BTreeSet<String> = bars_m15
        .iter()
        .map(|b| b.time.format("%Y-%m-%d").to_string())
        .collect();
    let mut trades = Vec::new();
    for day in &days {
        for row in engine.store().trades_for_day(day)? {
            trades.push((row.pnl, row.entry_time, row.hold_minutes));
        }
    }
    let metrics = compute_metrics(&trades);
    info!(
        symbol,
        trades = trades.len(),
        win_rate = metrics.win_rate,
        profit_factor = metrics.profit_factor,
        expectancy = metrics.expectancy,
        max_drawdown = metrics.max_drawdown,
        "backtest complete"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestMetrics {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub max_drawdown: f64,
    pub avg_trades_per_day: f64,
    /// Mean hold time per trade, in minutes.
    pub exposure_time: f64,
}

/// Summary statistics over sealed trades (PnL, entry day, hold minutes).
pub fn compute_metrics(trades: &[(f64, String, f64)]) -> BacktestMetrics {
    if trades.is_empty() {
        return BacktestMetrics {
            win_rate: 0.0,
            profit_factor: 0.0,
            expectancy: 0.0,
            max_drawdown: 0.0,
            avg_trades_per_day: 0.0,
            exposure_time: 0.0,
        };
    }

    let pnls: Vec<f64> = trades.iter().map(|t| t.0).collect();
    let wins: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
    let losses: f64 = pnls.iter().filter(|p| **p < 0.0).sum();
    let win_count = pnls.iter().filter(|p| **p > 0.0).count();
    let win_rate = win_count as f64 / pnls.len() as f64;
    let profit_factor = if losses < 0.0 {
        wins / losses.abs()
    } else {
        f64::INFINITY
    };
    let expectancy = pnls.iter().sum::<f64>() / pnls.len() as f64;

    let mut equity = 0.0;
    let mut peak = 0.0;
    let mut max_drawdown = 0.0;
    for pnl in &pnls {
        equity += pnl;
        if equity > peak {
            peak = equity;
        }
        let drawdown = peak - equity;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }
    }

    let days: std::collections::HashSet<&str> = trades
        .iter()
        .filter(|t| t.1.len() >= 10)
        .map(|t| &t.1[..10])
        .collect();
    let avg_trades_per_day = trades.len() as f64 / days.len().max(1) as f64;
    let exposure_time = trades.iter().map(|t| t.2).sum::<f64>() / trades.len() as f64;

    BacktestMetrics {
        win_rate,
        profit_factor,
        expectancy,
        max_drawdown,
        avg_trades_per_day,
        exposure_time,
    }
}

// ---------------------------------------------------------------------------
// Walk-forward splits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkForwardSplit {
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

/// Rolling train/test windows over a bar index range.
pub fn generate_splits(
    total_bars: usize,
    train_size: usize,
    test_size: usize,
    step: usize,
) -> Vec<WalkForwardSplit> {
    let mut splits = Vec::new();
    if step == 0 {
        return splits;
    }
    let mut start = 0;
    while start + train_size + test_size <= total_bars {
        splits.push(WalkForwardSplit {
            train_start: start,
            train_end: start + train_size,
            test_start: start + train_size,
            test_end: start + train_size + test_size,
        });
        start += step;
    }
    splits
}
