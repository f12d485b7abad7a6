// =============================================================================
// Broker adapter — capability trait plus the in-memory paper implementation
// =============================================================================
//
// The engine only ever talks to this trait. A live venue adapter implements
// the same contract out-of-tree; the paper broker below backs the paper and
// dry-run modes and every test. `place_order` must be idempotent per
// client_order_id as observed by the engine.
// =============================================================================

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::models::{AccountInfo, Bar, OrderRequest, OrderResult, Position, Side, Tick};

/// Static per-symbol trading parameters as reported by the venue.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub point: f64,
    pub digits: u32,
    pub trade_contract_size: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    /// Minimum stop/take distance from price, in points.
    pub trade_stops_level: f64,
    /// No-modification band around price, in points. 0 = unset.
    pub trade_freeze_level: f64,
    /// 0 means the symbol is not tradable.
    pub trade_mode: i32,
}

/// The narrow contract every venue implementation satisfies.
pub trait BrokerAdapter {
    fn connect(&mut self) -> bool;
    fn is_connected(&self) -> bool;
    fn shutdown(&mut self);

    /// Most recent `count` bars, oldest first.
    fn get_bars(&self, symbol: &str, timeframe: &str, count: usize) -> Result<Vec<Bar>>;
    fn get_tick(&self, symbol: &str) -> Result<Tick>;
    fn get_account_info(&self) -> Result<AccountInfo>;
    fn get_open_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>>;

    fn place_order(&mut self, order: &OrderRequest) -> Result<OrderResult>;
    fn modify_position(
        &mut self,
        position_id: &str,
        stop_loss: f64,
        take_profit: f64,
    ) -> Result<OrderResult>;
    fn close_position(&mut self, position_id: &str) -> Result<OrderResult>;

    fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;
}

// =============================================================================
// Paper broker
// =============================================================================

/// In-memory simulator. Bars and ticks are seeded by the caller (backtests
/// seed bar-by-bar); fills are immediate at the requested entry; SL/TP hits
/// are simulated when a tick arrives.
pub struct PaperBroker {
    balance: f64,
    equity: f64,
    margin_free: f64,
    currency: String,
    positions: HashMap<String, Position>,
    last_tick: HashMap<String, Tick>,
    bars: HashMap<(String, String), Vec<Bar>>,
}

impl PaperBroker {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            equity: initial_balance,
            margin_free: initial_balance,
            currency: "USD".to_string(),
            positions: HashMap::new(),
            last_tick: HashMap::new(),
            bars: HashMap::new(),
        }
    }

    pub fn seed_bars(&mut self, symbol: &str, timeframe: &str, bars: Vec<Bar>) {
        self.bars
            .insert((symbol.to_string(), timeframe.to_string()), bars);
    }

    /// Record the latest tick and simulate SL/TP fills against it.
    pub fn seed_tick(&mut self, symbol: &str, tick: Tick) {
        self.last_tick.insert(symbol.to_string(), tick);

        let hit: Vec<String> = self
            .positions
            .values()
            .filter(|pos| pos.symbol == symbol)
            .filter(|pos| match pos.side {
                Side::Buy => tick.bid <= pos.stop_loss || tick.bid >= pos.take_profit,
                Side::Sell => tick.ask >= pos.stop_loss || tick.ask <= pos.take_profit,
            })
            .filter_map(|pos| pos.broker_position_id.clone())
            .collect();
        for position_id in hit {
            self.positions.remove(&position_id);
        }
    }
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

impl BrokerAdapter for PaperBroker {
    fn connect(&mut self) -> bool {
        true
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn shutdown(&mut self) {}

    fn get_bars(&self, symbol: &str, timeframe: &str, count: usize) -> Result<Vec<Bar>> {
        let bars = self
            .bars
            .get(&(symbol.to_string(), timeframe.to_string()))
            .cloned()
            .unwrap_or_default();
        let start = bars.len().saturating_sub(count);
        Ok(bars[start..].to_vec())
    }

    fn get_tick(&self, symbol: &str) -> Result<Tick> {
        match self.last_tick.get(symbol) {
            Some(tick) => Ok(*tick),
            None => bail!("no tick seeded for {symbol}"),
        }
    }

    fn get_account_info(&self) -> Result<AccountInfo> {
        Ok(AccountInfo {
            equity: self.equity,
            balance: self.balance,
            margin_free: self.margin_free,
            currency: self.currency.clone(),
        })
    }

    fn get_open_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        let positions = self
            .positions
            .values()
            .filter(|p| symbol.map_or(true, |s| p.symbol == s))
            .cloned()
            .collect();
        Ok(positions)
    }

    fn place_order(&mut self, order: &OrderRequest) -> Result<OrderResult> {
        let position_id = order.client_order_id.clone();
        self.positions.insert(
            position_id.clone(),
            Position {
                symbol: order.symbol.clone(),
                side: order.side,
                volume: order.volume,
                entry_price: order.entry_price,
                stop_loss: order.stop_loss,
                take_profit: order.take_profit,
                open_time: order.time,
                broker_position_id: Some(position_id.clone()),
            },
        );
        Ok(OrderResult {
            success: true,
            broker_order_id: Some(position_id),
            status: "FILLED".to_string(),
            message: "Paper fill".to_string(),
        })
    }

    fn modify_position(
        &mut self,
        position_id: &str,
        stop_loss: f64,
        take_profit: f64,
    ) -> Result<OrderResult> {
        match self.positions.get_mut(position_id) {
            Some(pos) => {
                pos.stop_loss = stop_loss;
                pos.take_profit = take_profit;
                Ok(OrderResult {
                    success: true,
                    broker_order_id: Some(position_id.to_string()),
                    status: "MODIFIED".to_string(),
                    message: "Paper modify".to_string(),
                })
            }
            None => Ok(OrderResult {
                success: false,
                broker_order_id: None,
                status: "NOT_FOUND".to_string(),
                message: "Position not found".to_string(),
            }),
        }
    }

    fn close_position(&mut self, position_id: &str) -> Result<OrderResult> {
        match self.positions.remove(position_id) {
            Some(_) => Ok(OrderResult {
                success: true,
                broker_order_id: Some(position_id.to_string()),
                status: "CLOSED".to_string(),
                message: "Paper close".to_string(),
            }),
            None => Ok(OrderResult {
                success: false,
                broker_order_id: None,
                status: "NOT_FOUND".to_string(),
                message: "Position not found".to_string(),
            }),
        }
    }

    fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let upper = symbol.to_uppercase();
        let mut contract_size = 100_000.0;
        let mut point = 0.0001;
        let mut digits = 5;
        if upper.contains("JPY") {
            point = 0.001;
            digits = 3;
        }
        if upper.contains("XAU") {
            contract_size = 100.0;
            point = 0.01;
            digits = 2;
        }
        if upper.contains("XAG") {
            contract_size = 5_000.0;
            point = 0.01;
            digits = 2;
        }
        Ok(SymbolInfo {
            point,
            digits,
            trade_contract_size: contract_size,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            trade_stops_level: 10.0,
            trade_freeze_level: 0.0,
            trade_mode: 1,
        })
    }
}
