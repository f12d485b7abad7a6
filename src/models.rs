// =============================================================================
// Shared types used across the Meridian trading engine
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// How the order is to be filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Market => write!(f, "MARKET"),
            Self::Limit => write!(f, "LIMIT"),
        }
    }
}

/// Qualitative market classification. `Trend`/`Range` are the primary axis,
/// the volatility buckets and `Mixed` make up the secondary axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Trend,
    Range,
    HighVol,
    LowVol,
    Mixed,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trend => write!(f, "TREND"),
            Self::Range => write!(f, "RANGE"),
            Self::HighVol => write!(f, "HIGH_VOL"),
            Self::LowVol => write!(f, "LOW_VOL"),
            Self::Mixed => write!(f, "MIXED"),
        }
    }
}

/// A single OHLCV bar (oldest-first ordering is assumed everywhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Best bid/ask snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tick {
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Snapshot of the observer's view of one symbol at one instant.
///
/// Cycle-local: a fresh state is computed on every evaluation pass and never
/// cached across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub regime_primary: Regime,
    pub regime_secondary: Regime,
    pub trend_strength: f64,
    /// ATR on the lower timeframe, in price units.
    pub volatility: f64,
    pub range_compression: f64,
    /// One-bar close-to-close return.
    pub return_1: f64,
    /// Session label from the configured windows, or "OFF".
    pub session: String,
    /// Classification confidence in [0, 1].
    pub confidence: f64,
    pub notes: Vec<String>,
}

/// A candidate entry produced by a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub strategy: String,
    pub side: Side,
    pub order_type: OrderType,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub max_hold_minutes: i64,
    pub confidence: f64,
    pub rationale: Vec<String>,
}

impl Signal {
    /// Reward-to-risk ratio; 0.0 when the stop distance is not positive.
    pub fn rr(&self) -> f64 {
        let risk = (self.entry_price - self.stop_loss).abs();
        let reward = (self.take_profit - self.entry_price).abs();
        if risk > 0.0 {
            reward / risk
        } else {
            0.0
        }
    }
}

/// What the execution engine hands to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub client_order_id: String,
    pub time: DateTime<Utc>,
}

/// Broker response for place/modify/close operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    pub broker_order_id: Option<String>,
    pub status: String,
    pub message: String,
}

/// An open position as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub open_time: DateTime<Utc>,
    pub broker_position_id: Option<String>,
}

/// Full lifecycle record of one trade. Exit fields stay unset until the trade
/// book seals the record at close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub strategy: String,
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub volume: f64,
    /// Account-currency PnL, side-aware, set at close.
    pub pnl: f64,
    pub reason: String,
    pub rr: f64,
    pub tags: Vec<String>,
    pub contract_size: f64,
    pub hold_minutes: f64,
}

/// Account snapshot from the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub equity: f64,
    pub balance: f64,
    pub margin_free: f64,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signal(entry: f64, stop: f64, take: f64) -> Signal {
        Signal {
            symbol: "EURUSD".to_string(),
            time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
            strategy: "trend_pullback".to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            entry_price: entry,
            stop_loss: stop,
            take_profit: take,
            max_hold_minutes: 60,
            confidence: 0.9,
            rationale: vec![],
        }
    }

    #[test]
    fn rr_basic() {
        let s = signal(1.1000, 1.0990, 1.1005);
        assert!((s.rr() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rr_zero_risk_is_zero() {
        let s = signal(1.1000, 1.1000, 1.1020);
        assert_eq!(s.rr(), 0.0);
    }

    #[test]
    fn side_display_matches_wire_form() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Regime::HighVol.to_string(), "HIGH_VOL");
    }

    #[test]
    fn tick_spread() {
        let tick = Tick {
            time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
            bid: 1.1000,
            ask: 1.1002,
        };
        assert!((tick.spread() - 0.0002).abs() < 1e-12);
    }
}
