// =============================================================================
// Trend-pullback strategy
// =============================================================================
//
// Trades shallow pullbacks to the M15 EMA(20) in the direction of the H1
// trend. Long setup:
//
//   - primary regime is TREND and |H1 trend| >= 0.0006
//   - last close inside the pullback band around EMA20 (-0.3% .. +0.1%)
//   - last bar closes bullish, RSI(14) not overbought
//   - stop below the 12-bar swing low with a 0.3*ATR cushion, widened to
//     0.7*ATR when the raw risk is tighter than half an ATR
//   - take at 1.6R
//
// Shorts are symmetric.

use crate::indicators::atr::atr;
use crate::indicators::ema::{ema, trend_strength};
use crate::indicators::range::rolling_high_low;
use crate::indicators::rsi::rsi;
use crate::models::{Bar, MarketState, OrderType, Regime, Side, Signal};
use crate::strategies::{Strategy, StrategyContext};

pub struct TrendStrategy {
    min_trend: f64,
    rr: f64,
}

impl TrendStrategy {
    pub fn new() -> Self {
        Self {
            min_trend: 0.0006,
            rr: 1.6,
        }
    }
}

impl Default for TrendStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for TrendStrategy {
    fn name(&self) -> &'static str {
        "trend_pullback"
    }

    fn generate(
        &self,
        state: &MarketState,
        bars_m15: &[Bar],
        bars_h1: &[Bar],
        _context: &StrategyContext<'_>,
    ) -> Option<Signal> {
        if state.regime_primary != Regime::Trend {
            return None;
        }
        if bars_m15.is_empty() || bars_h1.is_empty() {
            return None;
        }

        let trend = trend_strength(bars_h1, 20, 50);
        if trend.abs() < self.min_trend {
            return None;
        }

        let closes: Vec<f64> = bars_m15.iter().map(|b| b.close).collect();
        let fast_ema = ema(&closes, 20);
        let last = &bars_m15[bars_m15.len() - 1];
        let last_rsi = rsi(&closes, 14);
        let atr_val = atr(bars_m15, 14);
        let (swing_high, swing_low) = rolling_high_low(bars_m15, 12);
        let confidence = (0.5 + trend.abs() * 800.0).min(1.0);

        if trend > 0.0 {
            let pullback = last.close <= fast_ema * 1.001 && last.close >= fast_ema * 0.997;
            if !pullback || last.close <= last.open || last_rsi > 70.0 {
                return None;
            }
            let entry = last.close;
            let mut stop = swing_low.min(last.low) - atr_val * 0.3;
            let mut risk = entry - stop;
            if risk <= atr_val * 0.5 {
                stop = entry - atr_val * 0.7;
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
                max_hold_minutes: 180,
                confidence,
                rationale: vec![
                    "h1_trend_up".to_string(),
                    "m15_pullback".to_string(),
                    "ema20_touch".to_string(),
                ],
            });
        }

        if trend < 0.0 {
            let pullback = last.close >= fast_ema * 0.999 && last.close <= fast_ema * 1.003;
            if !pullback || last.close >= last.open || last_rsi < 30.0 {
                return None;
            }
            let entry = last.close;
            let mut stop = swing_high.max(last.high) + atr_val * 0.3;
            let mut risk = stop - entry;
            if risk <= atr_val * 0.5 {
                stop = entry + atr_val * 0.7;
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
                max_hold_minutes: 180,
                confidence,
                rationale: vec![
                    "h1_trend_down".to_string(),
                    "m15_pullback".to_string(),
                    "ema20_touch".to_string(),
                ],
            });
        }

        None
    }
}
