// =============================================================================
// Range mean-revert strategy
// =============================================================================
//
// Fades the edges of a 20-bar range when the regime is RANGE: buys the bottom
// 15% of the range on an oversold RSI, sells the top 15% on an overbought
// one. Stops sit just past the range extreme with an ATR cushion; takes are
// 1.3R back toward the middle.

use crate::indicators::atr::atr;
use crate::indicators::range::rolling_high_low;
use crate::indicators::rsi::rsi;
use crate::models::{Bar, MarketState, OrderType, Regime, Side, Signal};
use crate::strategies::{Strategy, StrategyContext};

pub struct RangeStrategy {
    lookback: usize,
    rr: f64,
}

impl RangeStrategy {
    pub fn new() -> Self {
        Self {
            lookback: 20,
            rr: 1.3,
        }
    }
}

impl Default for RangeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for RangeStrategy {
    fn name(&self) -> &'static str {
        "range_mean_revert"
    }

    fn generate(
        &self,
        state: &MarketState,
        bars_m15: &[Bar],
        _bars_h1: &[Bar],
        _context: &StrategyContext<'_>,
    ) -> Option<Signal> {
        if state.regime_primary != Regime::Range {
            return None;
        }
        if bars_m15.is_empty() {
            return None;
        }

        let last = &bars_m15[bars_m15.len() - 1];
        let (highs, lows) = rolling_high_low(bars_m15, self.lookback);
        if highs == 0.0 || lows == 0.0 {
            return None;
        }
        let range_size = highs - lows;
        if range_size <= 0.0 {
            return None;
        }

        let closes: Vec<f64> = bars_m15.iter().map(|b| b.close).collect();
        let last_rsi = rsi(&closes, 14);
        let atr_val = atr(bars_m15, 14);

        let near_high = (highs - last.close) / range_size < 0.15;
        let near_low = (last.close - lows) / range_size < 0.15;
        let confidence = (0.45 + (50.0 - last_rsi).abs() / 100.0).min(1.0);

        if near_low && last_rsi < 30.0 {
            let entry = last.close;
            let mut stop = lows - atr_val * 0.2;
            let mut risk = entry - stop;
            if risk <= atr_val * 0.4 {
                stop = entry - atr_val * 0.6;
                risk = entry - stop;
            }
            let take = entry + risk * self.rr;
            return Some(Signal {
                symbol: state.symbol.clone(),
                time: last.time,
                strategy: self.name().to_string(),
                side: Side::Buy,
                order_type: OrderType::Market,
                entry_price: entry,
                stop_loss: stop,
                take_profit: take,
                max_hold_minutes: 120,
                confidence,
                rationale: vec!["range_low".to_string(), "rsi_oversold".to_string()],
            });
        }

        if near_high && last_rsi > 70.0 {
            let entry = last.close;
            let mut stop = highs + atr_val * 0.2;
            let mut risk = stop - entry;
            if risk <= atr_val * 0.4 {
                stop = entry + atr_val * 0.6;
                risk = stop - entry;
            }
            let take = entry - risk * self.rr;
            return Some(Signal {
                symbol: state.symbol.clone(),
                time: last.time,
                strategy: self.name().to_string(),
                side: Side::Sell,
                order_type: OrderType::Market,
                entry_price: entry,
                stop_loss: stop,
                take_profit: take,
                max_hold_minutes: 120,
                confidence,
                rationale: vec!["range_high".to_string(), "rsi_overbought".to_string()],
            });
        }

        None
    }
}
