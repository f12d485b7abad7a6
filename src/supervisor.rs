// =============================================================================
// Trade Supervisor — live management of open positions
// =============================================================================
//
// Per open position, in order:
//
//   1. Timed exit once the hold exceeds the signal's max_hold_minutes.
//   2. Good-profit close (optional): close when per-unit PnL reaches
//      good_profit_rr multiples of the initial risk.
//   3. Break-even: after 1R or 1 ATR of profit, move the stop to entry.
//   4. ATR trailing: after 0.8 ATR of profit, trail at 0.8 ATR behind price.
//   5. Regime-flip exit: close when the regime degrades to a flat RANGE.
//
// Stop modifications only ever tighten in the favourable direction, and every
// action is gated through the risk manager's kill switches.
// =============================================================================

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::broker::BrokerAdapter;
use crate::models::{MarketState, Position, Regime, Side};
use crate::risk::RiskManager;

/// Engine-side metadata attached when an order fills, keyed by broker
/// position id.
#[derive(Debug, Clone)]
pub struct PositionMeta {
    pub max_hold_minutes: i64,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub atr_at_entry: f64,
}

pub struct TradeSupervisor {
    meta: HashMap<String, PositionMeta>,
    close_on_good_profit: bool,
    good_profit_rr: f64,
}

impl TradeSupervisor {
    pub fn new(close_on_good_profit: bool, good_profit_rr: f64) -> Self {
        Self {
            meta: HashMap::new(),
            close_on_good_profit,
            good_profit_rr,
        }
    }

    pub fn register(&mut self, position_id: &str, meta: PositionMeta) {
        self.meta.insert(position_id.to_string(), meta);
    }

    /// Supervise every open position for one symbol.
    pub fn evaluate(
        &mut self,
        state: &MarketState,
        positions: &[Position],
        adapter: &mut dyn BrokerAdapter,
        risk: &mut RiskManager,
    ) -> Result<()> {
        for pos in positions {
            let Some(position_id) = pos.broker_position_id.as_deref() else {
                continue;
            };
            let decision = risk.approve_adjustment(&pos.symbol, state.time, adapter)?;
            if !decision.approved() {
                debug!(position_id, "supervision skipped, kill switch active");
                continue;
            }

            let tick = adapter.get_tick(&pos.symbol)?;
            let current_price = match pos.side {
                Side::Buy => tick.bid,
                Side::Sell => tick.ask,
            };
            let pnl_per_unit = match pos.side {
                Side::Buy => current_price - pos.entry_price,
                Side::Sell => pos.entry_price - current_price,
            };

            if let Some(meta) = self.meta.get(position_id).cloned() {
                if state.time - meta.entry_time > Duration::minutes(meta.max_hold_minutes) {
                    info!(position_id, "timed exit");
                    adapter.close_position(position_id)?;
                    continue;
                }

                let initial_risk = (pos.entry_price - pos.stop_loss).abs();
                if self.close_on_good_profit
                    && initial_risk > 0.0
                    && pnl_per_unit >= self.good_profit_rr * initial_risk
                {
                    info!(position_id, pnl_per_unit, "good-profit exit");
                    adapter.close_position(position_id)?;
                    continue;
                }

                // Break-even after 1R or 1 ATR, whichever is larger.
                if pnl_per_unit > meta.atr_at_entry.max(initial_risk) {
                    let new_sl = meta.entry_price;
                    let tightens = match pos.side {
                        Side::Buy => new_sl > pos.stop_loss,
                        Side::Sell => new_sl < pos.stop_loss,
                    };
                    if tightens {
                        debug!(position_id, new_sl, "break-even stop");
                        adapter.modify_position(position_id, new_sl, pos.take_profit)?;
                    }
                }

                // Conservative ATR trail once profit is protected.
                let trail_distance = meta.atr_at_entry * 0.8;
                if pnl_per_unit > trail_distance {
                    let trail_sl = match pos.side {
                        Side::Buy => current_price - trail_distance,
                        Side::Sell => current_price + trail_distance,
                    };
                    let tightens = match pos.side {
                        Side::Buy => trail_sl > pos.stop_loss,
                        Side::Sell => trail_sl < pos.stop_loss,
                    };
                    if tightens {
                        debug!(position_id, trail_sl, "trailing stop");
                        adapter.modify_position(position_id, trail_sl, pos.take_profit)?;
                    }
                }
            }

            // Exit when the regime flips hard against any directional thesis.
            if state.regime_primary == Regime::Range && state.trend_strength.abs() < 0.0002 {
                info!(position_id, "regime-flip exit");
                adapter.close_position(position_id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::PaperBroker;
    use crate::config::BotConfig;
    use crate::models::{OrderRequest, OrderType, Tick};
    use chrono::TimeZone;

    fn open_position(broker: &mut PaperBroker, stop: f64, take: f64) -> String {
        let order = OrderRequest {
            symbol: "EURUSD".to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            volume: 0.10,
            entry_price: 1.1000,
            stop_loss: stop,
            take_profit: take,
            client_order_id: "p1".to_string(),
            time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
        };
        broker.place_order(&order).unwrap();
        "p1".to_string()
    }

    fn state(primary: Regime, trend: f64, minute: u32) -> MarketState {
        MarketState {
            symbol: "EURUSD".to_string(),
            time: Utc.with_ymd_and_hms(2026, 1, 28, 9, minute, 0).unwrap(),
            regime_primary: primary,
            regime_secondary: Regime::LowVol,
            trend_strength: trend,
            volatility: 0.001,
            range_compression: 0.001,
            return_1: 0.0001,
            session: "LONDON".to_string(),
            confidence: 0.8,
            notes: vec![],
        }
    }

    fn meta(max_hold: i64) -> PositionMeta {
        PositionMeta {
            max_hold_minutes: max_hold,
            entry_time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
            entry_price: 1.1000,
            atr_at_entry: 0.0008,
        }
    }

    fn seed(broker: &mut PaperBroker, bid: f64) {
        broker.seed_tick(
            "EURUSD",
            Tick {
                time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 20, 0).unwrap(),
                bid,
                ask: bid + 0.0001,
            },
        );
    }

    #[test]
    fn good_profit_policy_closes_winner() {
        let mut broker = PaperBroker::default();
        // Take far away so the paper SL/TP simulation stays quiet.
        let id = open_position(&mut broker, 1.0990, 1.1100);
        seed(&mut broker, 1.1012);

        let mut supervisor = TradeSupervisor::new(true, 1.0);
        supervisor.register(&id, meta(60));
        let mut risk = RiskManager::new(BotConfig::default());

        let positions = broker.get_open_positions(Some("EURUSD")).unwrap();
        supervisor
            .evaluate(&state(Regime::Trend, 0.001, 20), &positions, &mut broker, &mut risk)
            .unwrap();
        // PnL/unit 0.0012 >= 1.0 * initial risk 0.0010 => closed.
        assert!(broker.get_open_positions(Some("EURUSD")).unwrap().is_empty());
    }

    #[test]
    fn timed_exit_after_max_hold() {
        let mut broker = PaperBroker::default();
        let id = open_position(&mut broker, 1.0990, 1.1100);
        seed(&mut broker, 1.1001);

        let mut supervisor = TradeSupervisor::new(false, 1.0);
        supervisor.register(&id, meta(10));
        let mut risk = RiskManager::new(BotConfig::default());

        let positions = broker.get_open_positions(Some("EURUSD")).unwrap();
        supervisor
            .evaluate(&state(Regime::Trend, 0.001, 30), &positions, &mut broker, &mut risk)
            .unwrap();
        assert!(broker.get_open_positions(Some("EURUSD")).unwrap().is_empty());
    }

    #[test]
    fn trailing_stop_tightens_behind_price() {
        let mut broker = PaperBroker::default();
        let id = open_position(&mut broker, 1.0990, 1.1100);
        seed(&mut broker, 1.1012);

        let mut supervisor = TradeSupervisor::new(false, 1.0);
        supervisor.register(&id, meta(60));
        let mut risk = RiskManager::new(BotConfig::default());

        let positions = broker.get_open_positions(Some("EURUSD")).unwrap();
        supervisor
            .evaluate(&state(Regime::Trend, 0.001, 20), &positions, &mut broker, &mut risk)
            .unwrap();
        let after = broker.get_open_positions(Some("EURUSD")).unwrap();
        assert_eq!(after.len(), 1);
        // Trail at bid - 0.8 * ATR = 1.1012 - 0.00064; break-even would only
        // reach entry, so the trail wins.
        assert!((after[0].stop_loss - (1.1012 - 0.00064)).abs() < 1e-9);
    }

    #[test]
    fn regime_flip_closes_position() {
        let mut broker = PaperBroker::default();
        let id = open_position(&mut broker, 1.0990, 1.1100);
        seed(&mut broker, 1.1001);

        let mut supervisor = TradeSupervisor::new(false, 1.0);
        supervisor.register(&id, meta(60));
        let mut risk = RiskManager::new(BotConfig::default());

        let positions = broker.get_open_positions(Some("EURUSD")).unwrap();
        supervisor
            .evaluate(&state(Regime::Range, 0.0001, 20), &positions, &mut broker, &mut risk)
            .unwrap();
        assert!(broker.get_open_positions(Some("EURUSD")).unwrap().is_empty());
    }

    #[test]
    fn small_profit_leaves_position_untouched() {
        let mut broker = PaperBroker::default();
        let id = open_position(&mut broker, 1.0990, 1.1100);
        seed(&mut broker, 1.1003);

        let mut supervisor = TradeSupervisor::new(false, 1.0);
        supervisor.register(&id, meta(60));
        let mut risk = RiskManager::new(BotConfig::default());

        let positions = broker.get_open_positions(Some("EURUSD")).unwrap();
        supervisor
            .evaluate(&state(Regime::Trend, 0.001, 20), &positions, &mut broker, &mut risk)
            .unwrap();
        let after = broker.get_open_positions(Some("EURUSD")).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].stop_loss, 1.0990);
    }
}
