// =============================================================================
// Trade Book — in-memory open-trade ledger and broker reconciliation
// =============================================================================
//
// Keyed by broker position id; a position id appears in at most one entry.
// Reconciliation compares the book against the broker's reported positions:
// any tracked id the broker no longer knows is sealed as a closed trade at
// the symbol's current bid with reason "broker_exit". Each close is emitted
// exactly once.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{Position, Side, TradeRecord};

#[derive(Default)]
pub struct TradeBook {
    open_trades: HashMap<String, TradeRecord>,
}

impl TradeBook {
    pub fn new() -> Self {
        Self {
            open_trades: HashMap::new(),
        }
    }

    pub fn register_open(&mut self, position_id: &str, trade: TradeRecord) {
        self.open_trades.insert(position_id.to_string(), trade);
    }

    pub fn open_count(&self) -> usize {
        self.open_trades.len()
    }

    /// Seal a tracked trade with its exit fields and side-aware PnL.
    pub fn close(
        &mut self,
        position_id: &str,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: &str,
    ) -> Option<TradeRecord> {
        let mut trade = self.open_trades.remove(position_id)?;
        trade.exit_price = Some(exit_price);
        trade.exit_time = Some(exit_time);
        trade.hold_minutes = (exit_time - trade.entry_time).num_seconds() as f64 / 60.0;
        trade.pnl = match trade.side {
            Side::Buy => (exit_price - trade.entry_price) * trade.volume * trade.contract_size,
            Side::Sell => (trade.entry_price - exit_price) * trade.volume * trade.contract_size,
        };
        trade.reason = reason.to_string();
        Some(trade)
    }

    /// Close every tracked trade whose id is absent from the broker's current
    /// positions, pricing the exit from the per-symbol bid map.
    pub fn reconcile(
        &mut self,
        current_positions: &[Position],
        tick_map: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Vec<TradeRecord> {
        let current_ids: HashSet<&str> = current_positions
            .iter()
            .filter_map(|p| p.broker_position_id.as_deref())
            .collect();

        let vanished: Vec<String> = self
            .open_trades
            .keys()
            .filter(|id| !current_ids.contains(id.as_str()))
            .cloned()
            .collect();

        let mut closed = Vec::new();
        for position_id in vanished {
            let price = {
                let trade = &self.open_trades[&position_id];
                tick_map
                    .get(&trade.symbol)
                    .copied()
                    .unwrap_or(trade.entry_price)
            };
            if let Some(trade) = self.close(&position_id, price, now, "broker_exit") {
                closed.push(trade);
            }
        }
        closed
    }
}
