// =============================================================================
// Supply-and-demand zone strategy
// =============================================================================
//
// For each configured higher timeframe, detect zones and keep the top-K by
// score. On the lower timeframe:
//
//   1. Classify the HTF trend with the last-swing rule (BULL/BEAR/NEUTRAL);
//      neutral is skipped unless configured otherwise.
//   2. Count touches for zones containing the last close and drop exhausted
//      zones.
//   3. Walk active zones best-score-first, demanding trend alignment
//      (BULL => demand, BEAR => supply) and the last close inside the zone.
//   4. On the first zone with LTF confirmation, emit a market order with the
//      stop buffered past the zone edge and the take at `min_rr` multiples.
//
// Zones live for exactly one evaluation cycle.

use tracing::debug;

use crate::models::{Bar, MarketState, OrderType, Side, Signal};
use crate::pips::pip_size;
use crate::snd::config::SupplyDemandConfig;
use crate::snd::confirmation::confirmation_passed;
use crate::snd::zone_detector::{detect_zones, update_zone_touches};
use crate::snd::zone_models::{Zone, ZoneKind};
use crate::strategies::{Strategy, StrategyContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrendDirection {
    Bull,
    Bear,
    Neutral,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bull => write!(f, "BULL"),
            Self::Bear => write!(f, "BEAR"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

pub struct SupplyDemandStrategy {
    cfg: SupplyDemandConfig,
}

impl SupplyDemandStrategy {
    pub fn new(cfg: SupplyDemandConfig) -> Self {
        Self { cfg }
    }

    /// Last-swing trend rule: BULL when the last bar prints both a higher
    /// high and a higher low against the prior five bars; BEAR when both are
    /// lower; NEUTRAL otherwise.
    fn trend_state(bars: &[Bar]) -> TrendDirection {
        if bars.len() < 10 {
            return TrendDirection::Neutral;
        }
        let n = bars.len();
        let last_high = bars[n - 1].high;
        let last_low = bars[n - 1].low;
        let prior = &bars[n - 6..n - 1];
        let prior_max = prior.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let prior_min = prior.iter().map(|b| b.low).fold(f64::MAX, f64::min);

        let hh = last_high > prior_max;
        let hl = last_low > prior_min;
        let lh = last_high < prior_max;
        let ll = last_low < prior_min;
        if hh && hl {
            TrendDirection::Bull
        } else if lh && ll {
            TrendDirection::Bear
        } else {
            TrendDirection::Neutral
        }
    }

    fn select_zones(
        &self,
        symbol: &str,
        timeframe: &str,
        bars: &[Bar],
        pip: f64,
    ) -> Vec<Zone> {
        let mut zones = detect_zones(symbol, timeframe, bars, &self.cfg.zone, 14, pip).zones;
        zones.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        zones.truncate(self.cfg.top_k_zones);
        zones
    }
}

impl Strategy for SupplyDemandStrategy {
    fn name(&self) -> &'static str {
        "supply_demand"
    }

    fn generate(
        &self,
        state: &MarketState,
        bars_m15: &[Bar],
        bars_h1: &[Bar],
        context: &StrategyContext<'_>,
    ) -> Option<Signal> {
        if !self.cfg.enable {
            return None;
        }

        let (digits, point) = context
            .symbol_info
            .map(|info| (info.digits, info.point))
            .unwrap_or((5, 0.0001));
        let pip = pip_size(&state.symbol, digits, point);

        let ltf = self.cfg.ltf_timeframe.as_str();
        let ltf_bars: &[Bar] = context
            .bars_by_timeframe
            .get(ltf)
            .copied()
            .or(if ltf == "M15" { Some(bars_m15) } else { None })?;
        if ltf_bars.is_empty() {
            return None;
        }

        // Build HTF zones, best-first per timeframe.
        let mut all_zones: Vec<Zone> = Vec::new();
        for tf in &self.cfg.htf_timeframes {
            let Some(htf_bars) = context.bars_by_timeframe.get(tf.as_str()) else {
                continue;
            };
            all_zones.extend(self.select_zones(&state.symbol, tf, htf_bars, pip));
        }
        if all_zones.is_empty() {
            debug!(symbol = %state.symbol, reason = "no_zones", "snd_skip");
            return None;
        }

        let trend_bars: &[Bar] = self
            .cfg
            .htf_timeframes
            .first()
            .and_then(|tf| context.bars_by_timeframe.get(tf.as_str()).copied())
            .unwrap_or(bars_h1);
        let trend = Self::trend_state(trend_bars);
        if trend == TrendDirection::Neutral && !self.cfg.allow_neutral_trend {
            debug!(symbol = %state.symbol, reason = "neutral_trend", "snd_skip");
            return None;
        }

        // Touch accounting against the current price, then drop dead zones.
        let last_price = ltf_bars[ltf_bars.len() - 1].close;
        let mut active_zones: Vec<Zone> = Vec::new();
        for mut zone in all_zones {
            update_zone_touches(&mut zone, last_price, &self.cfg.zone);
            if zone.active {
                active_zones.push(zone);
            }
        }

        debug!(
            symbol = %state.symbol,
            zones = active_zones.len(),
            trend = %trend,
            "snd_zones"
        );

        active_zones.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for zone in &active_zones {
            let aligned = match trend {
                TrendDirection::Bull => zone.kind == ZoneKind::Demand,
                TrendDirection::Bear => zone.kind == ZoneKind::Supply,
                TrendDirection::Neutral => true,
            };
            if !aligned || !zone.contains(last_price) {
                continue;
            }

            if !confirmation_passed(ltf_bars, zone, &self.cfg.confirmation) {
                debug!(
                    symbol = %state.symbol,
                    zone_id = %zone.id,
                    reason = "confirmation_failed",
                    "snd_skip"
                );
                continue;
            }

            let entry = last_price;
            let side = match zone.kind {
                ZoneKind::Demand => Side::Buy,
                ZoneKind::Supply => Side::Sell,
            };
            let buffer = (self.cfg.sl_buffer_atr * zone.atr.max(state.volatility))
                .max(self.cfg.sl_buffer_pips * pip);
            let (stop, take) = match side {
                Side::Buy => {
                    let stop = zone.lower - buffer;
                    (stop, entry + (entry - stop) * self.cfg.min_rr)
                }
                Side::Sell => {
                    let stop = zone.upper + buffer;
                    (stop, entry - (stop - entry) * self.cfg.min_rr)
                }
            };

            return Some(Signal {
                symbol: state.symbol.clone(),
                time: ltf_bars[ltf_bars.len() - 1].time,
                strategy: self.name().to_string(),
                side,
                order_type: OrderType::Market,
                entry_price: entry,
                stop_loss: stop,
                take_profit: take,
                max_hold_minutes: 240,
                confidence: zone.score,
                rationale: vec![
                    format!("zone:{}", zone.id),
                    format!("trend:{trend}"),
                    format!("tf:{}", zone.timeframe),
                ],
            });
        }

        debug!(symbol = %state.symbol, reason = "no_entry", "snd_skip");
        None
    }
}
