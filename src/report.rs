// =============================================================================
// Daily reporter — text and JSON summaries from the store
// =============================================================================

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;

use crate::store::SqliteStore;

pub struct DailyReporter<'a> {
    store: &'a SqliteStore,
}

struct DaySummary {
    trades: usize,
    skipped: usize,
    win_rate: f64,
    pnl: f64,
    expectancy: f64,
    avg_rr: f64,
    max_drawdown: f64,
    skip_reasons: BTreeMap<String, u64>,
}

impl<'a> DailyReporter<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    fn summarize(&self, date: DateTime<Utc>) -> Result<(String, DaySummary)> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let trades = self.store.trades_for_day(&date_str)?;
        let skips = self.store.events_for_day(&date_str, "no_trade")?;

        let pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            wins as f64 / trades.len() as f64
        };
        let avg_rr = if trades.is_empty() {
            0.0
        } else {
            trades.iter().map(|t| t.rr).sum::<f64>() / trades.len() as f64
        };
        let expectancy = if trades.is_empty() {
            0.0
        } else {
            pnl / trades.len() as f64
        };

        let mut equity = 0.0;
        let mut peak = 0.0;
        let mut max_drawdown = 0.0;
        for trade in &trades {
            equity += trade.pnl;
            if equity > peak {
                peak = equity;
            }
            let drawdown = peak - equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        // Event payloads are "symbol:reason"; histogram the reasons.
        let mut skip_reasons: BTreeMap<String, u64> = BTreeMap::new();
        for event in &skips {
            let reason = event
                .payload
                .rsplit_once(':')
                .map(|(_, r)| r.to_string())
                .unwrap_or_else(|| event.payload.clone());
            *skip_reasons.entry(reason).or_insert(0) += 1;
        }

        Ok((
            date_str,
            DaySummary {
                trades: trades.len(),
                skipped: skips.len(),
                win_rate,
                pnl,
                expectancy,
                avg_rr,
                max_drawdown,
                skip_reasons,
            },
        ))
    }

    pub fn daily_report(&self, date: DateTime<Utc>) -> Result<String> {
        let (date_str, s) = self.summarize(date)?;
        let reasons = serde_json::to_string(&s.skip_reasons)?;
        Ok([
            format!("Daily Report {date_str}"),
            format!("Trades: {}", s.trades),
            format!("Trades skipped: {}", s.skipped),
            format!("Win rate: {:.2}%", s.win_rate * 100.0),
            format!("PnL: {:.2}", s.pnl),
            format!("Max Drawdown: {:.2}", s.max_drawdown),
            format!("Expectancy: {:.2}", s.expectancy),
            format!("Avg RR: {:.2}", s.avg_rr),
            format!("Skip reasons: {reasons}"),
        ]
        .join("\n"))
    }

    pub fn daily_report_json(&self, date: DateTime<Utc>) -> Result<String> {
        let (date_str, s) = self.summarize(date)?;
        let payload = json!({
            "date": date_str,
            "trades": s.trades,
            "trades_skipped": s.skipped,
            "win_rate": s.win_rate,
            "pnl": s.pnl,
            "expectancy": s.expectancy,
            "max_drawdown": s.max_drawdown,
            "skip_reasons": s.skip_reasons,
        });
        Ok(serde_json::to_string_pretty(&payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Side, TradeRecord};
    use chrono::TimeZone;

    fn trade(pnl: f64, hour: u32) -> TradeRecord {
        TradeRecord {
            symbol: "EURUSD".to_string(),
            strategy: "trend_pullback".to_string(),
            side: Side::Buy,
            entry_time: Utc.with_ymd_and_hms(2026, 1, 28, hour, 0, 0).unwrap(),
            entry_price: 1.1000,
            exit_time: Some(Utc.with_ymd_and_hms(2026, 1, 28, hour + 1, 0, 0).unwrap()),
            exit_price: Some(1.1010),
            volume: 0.10,
            pnl,
            reason: "broker_exit".to_string(),
            rr: 1.5,
            tags: vec![],
            contract_size: 100_000.0,
            hold_minutes: 60.0,
        }
    }

    #[test]
    fn report_aggregates_day() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_trade(&trade(20.0, 9)).unwrap();
        store.insert_trade(&trade(-10.0, 11)).unwrap();
        store
            .insert_event("2026-01-28T09:15:00+00:00", "no_trade", "EURUSD:rr_too_low")
            .unwrap();
        store
            .insert_event("2026-01-28T09:30:00+00:00", "no_trade", "GBPUSD:rr_too_low")
            .unwrap();
        store
            .insert_event("2026-01-28T10:00:00+00:00", "no_trade", "EURUSD:outside_session")
            .unwrap();

        let reporter = DailyReporter::new(&store);
        let date = Utc.with_ymd_and_hms(2026, 1, 28, 23, 0, 0).unwrap();
        let text = reporter.daily_report(date).unwrap();
        assert!(text.contains("Trades: 2"));
        assert!(text.contains("Trades skipped: 3"));
        assert!(text.contains("Win rate: 50.00%"));
        assert!(text.contains("PnL: 10.00"));

        let parsed: serde_json::Value =
            serde_json::from_str(&reporter.daily_report_json(date).unwrap()).unwrap();
        assert_eq!(parsed["trades"], 2);
        assert_eq!(parsed["skip_reasons"]["rr_too_low"], 2);
        assert_eq!(parsed["skip_reasons"]["outside_session"], 1);
        // Drawdown: +20 then -10 => 10 off the peak.
        assert_eq!(parsed["max_drawdown"], 10.0);
    }

    #[test]
    fn empty_day_reports_zeroes() {
        let store = SqliteStore::in_memory().unwrap();
        let reporter = DailyReporter::new(&store);
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let text = reporter.daily_report(date).unwrap();
        assert!(text.contains("Trades: 0"));
        assert!(text.contains("Win rate: 0.00%"));
    }
}
