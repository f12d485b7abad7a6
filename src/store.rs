// =============================================================================
// SQLite store — durable trade and event rows
// =============================================================================
//
// Two tables: `trades` (sealed trade records) and `events` (engine decisions,
// payload format "symbol:reason"). The daily reporter reads both back by
// date prefix.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::TradeRecord;

/// One persisted event row.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub time: String,
    pub kind: String,
    pub payload: String,
}

/// Slim projection of a trade row for reporting.
#[derive(Debug, Clone)]
pub struct TradeRow {
    pub symbol: String,
    pub strategy: String,
    pub entry_time: String,
    pub pnl: f64,
    pub rr: f64,
    pub hold_minutes: f64,
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating parent directories and tables as needed).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store {}", path.display()))?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// In-memory store for tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT,
                strategy TEXT,
                side TEXT,
                entry_time TEXT,
                entry_price REAL,
                exit_time TEXT,
                exit_price REAL,
                volume REAL,
                pnl REAL,
                reason TEXT,
                rr REAL,
                tags TEXT,
                hold_minutes REAL
            );
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time TEXT,
                event_type TEXT,
                payload TEXT
            );",
        )?;
        Ok(())
    }

    pub fn insert_trade(&self, trade: &TradeRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO trades (symbol, strategy, side, entry_time, entry_price, exit_time,
                                 exit_price, volume, pnl, reason, rr, tags, hold_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                trade.symbol,
                trade.strategy,
                trade.side.to_string(),
                trade.entry_time.to_rfc3339(),
                trade.entry_price,
                trade.exit_time.map(|t| t.to_rfc3339()),
                trade.exit_price,
                trade.volume,
                trade.pnl,
                trade.reason,
                trade.rr,
                trade.tags.join(","),
                trade.hold_minutes,
            ],
        )?;
        Ok(())
    }

    pub fn insert_event(&self, time: &str, kind: &str, payload: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (time, event_type, payload) VALUES (?1, ?2, ?3)",
            params![time, kind, payload],
        )?;
        Ok(())
    }

    /// Trades entered on the given day ("YYYY-MM-DD").
    pub fn trades_for_day(&self, date: &str) -> Result<Vec<TradeRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, strategy, entry_time, pnl, rr, hold_minutes
             FROM trades WHERE entry_time LIKE ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![format!("{date}%")], |row| {
                Ok(TradeRow {
                    symbol: row.get(0)?,
                    strategy: row.get(1)?,
                    entry_time: row.get(2)?,
                    pnl: row.get(3)?,
                    rr: row.get(4)?,
                    hold_minutes: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Events of one kind on the given day.
    pub fn events_for_day(&self, date: &str, kind: &str) -> Result<Vec<EventRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT time, event_type, payload FROM events
             WHERE time LIKE ?1 AND event_type = ?2 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![format!("{date}%"), kind], |row| {
                Ok(EventRow {
                    time: row.get(0)?,
                    kind: row.get(1)?,
                    payload: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn event_count(&self, kind: &str) -> Result<u64> {
        let count: Option<u64> = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM events WHERE event_type = ?1",
                params![kind],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::{TimeZone, Utc};

    fn record() -> TradeRecord {
        TradeRecord {
            symbol: "EURUSD".to_string(),
            strategy: "trend_pullback".to_string(),
            side: Side::Buy,
            entry_time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
            entry_price: 1.1000,
            exit_time: Some(Utc.with_ymd_and_hms(2026, 1, 28, 10, 0, 0).unwrap()),
            exit_price: Some(1.1010),
            volume: 0.10,
            pnl: 10.0,
            reason: "broker_exit".to_string(),
            rr: 1.5,
            tags: vec!["h1_trend_up".to_string(), "m15_pullback".to_string()],
            contract_size: 100_000.0,
            hold_minutes: 60.0,
        }
    }

    #[test]
    fn trade_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_trade(&record()).unwrap();
        let rows = store.trades_for_day("2026-01-28").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "EURUSD");
        assert_eq!(rows[0].pnl, 10.0);
        assert!(store.trades_for_day("2026-01-29").unwrap().is_empty());
    }

    #[test]
    fn event_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_event("2026-01-28T09:00:00+00:00", "no_trade", "EURUSD:rr_too_low")
            .unwrap();
        store
            .insert_event("2026-01-28T09:01:00+00:00", "order", "trend_pullback:FILLED")
            .unwrap();
        let events = store.events_for_day("2026-01-28", "no_trade").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, "EURUSD:rr_too_low");
        assert_eq!(store.event_count("no_trade").unwrap(), 1);
        assert_eq!(store.event_count("order").unwrap(), 1);
    }
}
