// =============================================================================
// Risk Manager — multi-gate admission control protecting capital
// =============================================================================
//
// `approve` evaluates its gates strictly in order and returns the first
// failure as a typed rejection; a pass returns the sized volume. Gates:
//
//   1.  Daily rollover (per-symbol and global stats reset on date change)
//   2.  Kill switch (per-symbol or global; latched until rollover)
//   3.  Session must not be OFF
//   4.  Regime confidence floor; MIXED secondary regime rejected
//   5.  Minimum reward:risk
//   6.  Cooldown since the symbol's last close
//   7.  Symbol tradable (trade_mode != 0)
//   8.  Spread-spike cooldown not armed
//   9.  Spread within threshold (arming the spike cooldown on repeats)
//   10. ATR within the configured band
//   11. Per-symbol daily trade / consecutive-loss caps
//   12. Global daily trade / consecutive-loss caps
//   13. Free margin positive
//   14. Per-symbol and global daily loss caps
//   15. Drawdown kill switch (latches the global kill)
//   16. Broker stops/freeze distance compliance
//   17. Stop distance positive and not tighter than min_stop_atr * ATR
//   18. Volume sizing against broker lot constraints
//
// Expected rejections are values, never errors; only broker I/O failures
// propagate as `Err`.
// =============================================================================

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::broker::BrokerAdapter;
use crate::config::{BotConfig, SpreadMode, SymbolConfig};
use crate::models::{MarketState, Regime, Side, Signal};
use crate::pips::{spread_in_pips, spread_in_points};
use crate::sessions::SESSION_OFF;

// ---------------------------------------------------------------------------
// Rejection taxonomy
// ---------------------------------------------------------------------------

/// Machine codes for every gate rejection, with a human-readable mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    KillSwitch,
    OutsideSession,
    LowRegimeConfidence,
    RrTooLow,
    CooldownActive,
    SpreadSpikeCooldown,
    SpreadTooWide,
    VolatilityTooLow,
    VolatilityTooHigh,
    MaxTradesReached,
    MaxConsecutiveLosses,
    GlobalMaxTrades,
    GlobalConsecutiveLosses,
    GlobalDailyLoss,
    InsufficientMargin,
    DailyLossLimit,
    DrawdownKillSwitch,
    MarketClosed,
    StopTooClose,
    TpTooClose,
    FreezeLevel,
    InvalidStopDistance,
    StopTooTightAtr,
    VolumeBelowMin,
}

impl RejectReason {
    /// Stable machine code used in events and journal rows.
    pub fn code(&self) -> &'static str {
        match self {
            Self::KillSwitch => "kill_switch",
            Self::OutsideSession => "outside_session",
            Self::LowRegimeConfidence => "low_regime_confidence",
            Self::RrTooLow => "rr_too_low",
            Self::CooldownActive => "cooldown_active",
            Self::SpreadSpikeCooldown => "spread_spike_cooldown",
            Self::SpreadTooWide => "spread_too_wide",
            Self::VolatilityTooLow => "volatility_too_low",
            Self::VolatilityTooHigh => "volatility_too_high",
            Self::MaxTradesReached => "max_trades_reached",
            Self::MaxConsecutiveLosses => "max_consecutive_losses",
            Self::GlobalMaxTrades => "global_max_trades",
            Self::GlobalConsecutiveLosses => "global_consecutive_losses",
            Self::GlobalDailyLoss => "global_daily_loss",
            Self::InsufficientMargin => "insufficient_margin",
            Self::DailyLossLimit => "daily_loss_limit",
            Self::DrawdownKillSwitch => "drawdown_kill_switch",
            Self::MarketClosed => "market_closed",
            Self::StopTooClose => "stop_too_close",
            Self::TpTooClose => "tp_too_close",
            Self::FreezeLevel => "freeze_level",
            Self::InvalidStopDistance => "invalid_stop_distance",
            Self::StopTooTightAtr => "stop_too_tight_atr",
            Self::VolumeBelowMin => "volume_below_min",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::KillSwitch => "Kill switch active",
            Self::OutsideSession => "Outside allowed sessions",
            Self::LowRegimeConfidence => "Regime confidence too low or mixed",
            Self::RrTooLow => "Risk-reward below minimum",
            Self::CooldownActive => "Cooldown active after recent trade",
            Self::SpreadSpikeCooldown => "Spread spike cooldown active",
            Self::SpreadTooWide => "Spread too wide",
            Self::VolatilityTooLow => "Volatility below minimum",
            Self::VolatilityTooHigh => "Volatility above maximum",
            Self::MaxTradesReached => "Max trades per symbol reached",
            Self::MaxConsecutiveLosses => "Max consecutive losses per symbol reached",
            Self::GlobalMaxTrades => "Max trades per day reached",
            Self::GlobalConsecutiveLosses => "Max consecutive losses reached",
            Self::GlobalDailyLoss => "Global daily loss limit reached",
            Self::InsufficientMargin => "Insufficient margin",
            Self::DailyLossLimit => "Daily loss limit reached",
            Self::DrawdownKillSwitch => "Drawdown kill switch triggered",
            Self::MarketClosed => "Market closed or symbol not tradable",
            Self::StopTooClose => "Stop loss too close",
            Self::TpTooClose => "Take profit too close",
            Self::FreezeLevel => "Freeze level constraint",
            Self::InvalidStopDistance => "Invalid stop distance",
            Self::StopTooTightAtr => "Stop loss too tight vs ATR",
            Self::VolumeBelowMin => "Calculated volume below broker minimum",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskDecision {
    Approved { volume: f64 },
    Rejected(RejectReason),
}

impl RiskDecision {
    pub fn approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    pub fn volume(&self) -> f64 {
        match self {
            Self::Approved { volume } => *volume,
            Self::Rejected(_) => 0.0,
        }
    }

    /// Machine code for events; "approved" on the success path.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Approved { .. } => "approved",
            Self::Rejected(reason) => reason.code(),
        }
    }
}

// ---------------------------------------------------------------------------
// Daily accounting
// ---------------------------------------------------------------------------

/// Per-symbol daily counters. `daily_loss` accumulates only negative PnL and
/// is therefore always <= 0.
#[derive(Debug, Clone)]
pub struct RiskStats {
    pub date: String,
    pub daily_loss: f64,
    pub trades_today: u32,
    pub consecutive_losses: u32,
    pub peak_equity: f64,
    pub kill_switch: bool,
    pub spread_spike_count: u32,
    pub spread_cooldown_until: Option<DateTime<Utc>>,
    pub last_close_time: Option<DateTime<Utc>>,
}

impl RiskStats {
    fn new(date: String, peak_equity: f64) -> Self {
        Self {
            date,
            daily_loss: 0.0,
            trades_today: 0,
            consecutive_losses: 0,
            peak_equity,
            kill_switch: false,
            spread_spike_count: 0,
            spread_cooldown_until: None,
            last_close_time: None,
        }
    }
}

/// Universe-wide daily counters.
#[derive(Debug, Clone)]
pub struct GlobalRiskStats {
    pub date: String,
    pub daily_loss: f64,
    pub trades_today: u32,
    pub consecutive_losses: u32,
    pub peak_equity: f64,
    pub kill_switch: bool,
}

impl GlobalRiskStats {
    fn new(date: String, peak_equity: f64) -> Self {
        Self {
            date,
            daily_loss: 0.0,
            trades_today: 0,
            consecutive_losses: 0,
            peak_equity,
            kill_switch: false,
        }
    }
}

fn day_tag(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

// ---------------------------------------------------------------------------
// Risk manager
// ---------------------------------------------------------------------------

pub struct RiskManager {
    config: BotConfig,
    drawdown_kill: f64,
    stats: HashMap<String, RiskStats>,
    global_stats: Option<GlobalRiskStats>,
}

impl RiskManager {
    pub fn new(config: BotConfig) -> Self {
        let drawdown_kill = config.drawdown_kill_switch;
        Self {
            config,
            drawdown_kill,
            stats: HashMap::new(),
            global_stats: None,
        }
    }

    fn symbol_cfg(&self, symbol: &str) -> Result<&SymbolConfig> {
        self.config
            .symbol(symbol)
            .ok_or_else(|| anyhow::anyhow!("no config for symbol {symbol}"))
    }

    /// Reset per-symbol stats when the calendar date moved on. Peak equity is
    /// re-seeded from the current account equity.
    fn reset_if_new_day(
        &mut self,
        symbol: &str,
        now: DateTime<Utc>,
        adapter: &dyn BrokerAdapter,
    ) -> Result<()> {
        let date = day_tag(now);
        let stale = self
            .stats
            .get(symbol)
            .map_or(true, |stats| stats.date != date);
        if stale {
            let equity = adapter.get_account_info()?.equity;
            debug!(symbol, date = %date, "daily risk counters reset");
            self.stats
                .insert(symbol.to_string(), RiskStats::new(date, equity));
        }
        Ok(())
    }

    fn reset_global_if_new_day(
        &mut self,
        now: DateTime<Utc>,
        adapter: &dyn BrokerAdapter,
    ) -> Result<()> {
        let date = day_tag(now);
        let stale = self
            .global_stats
            .as_ref()
            .map_or(true, |stats| stats.date != date);
        if stale {
            let equity = adapter.get_account_info()?.equity;
            self.global_stats = Some(GlobalRiskStats::new(date, equity));
        }
        Ok(())
    }

    /// Run the full gate sequence for a candidate signal.
    pub fn approve(
        &mut self,
        signal: &Signal,
        state: &MarketState,
        adapter: &dyn BrokerAdapter,
    ) -> Result<RiskDecision> {
        self.reset_if_new_day(&signal.symbol, signal.time, adapter)?;
        self.reset_global_if_new_day(signal.time, adapter)?;
        let cfg = self.symbol_cfg(&signal.symbol)?.clone();

        let global_kill = self
            .global_stats
            .as_ref()
            .map_or(false, |stats| stats.kill_switch);
        {
            let stats = &self.stats[&signal.symbol];
            if stats.kill_switch || global_kill {
                return Ok(RiskDecision::Rejected(RejectReason::KillSwitch));
            }
        }

        if state.session == SESSION_OFF {
            return Ok(RiskDecision::Rejected(RejectReason::OutsideSession));
        }

        if state.confidence < cfg.min_regime_confidence || state.regime_secondary == Regime::Mixed
        {
            return Ok(RiskDecision::Rejected(RejectReason::LowRegimeConfidence));
        }

        if signal.rr() < cfg.min_rr {
            return Ok(RiskDecision::Rejected(RejectReason::RrTooLow));
        }

        let cooldown_minutes = cfg
            .trade_cooldown_minutes
            .unwrap_or(self.config.trade_cooldown_minutes);
        if let Some(last_close) = self.stats[&signal.symbol].last_close_time {
            if signal.time < last_close + Duration::minutes(cooldown_minutes) {
                return Ok(RiskDecision::Rejected(RejectReason::CooldownActive));
            }
        }

        let symbol_info = adapter.symbol_info(&signal.symbol)?;
        if symbol_info.trade_mode == 0 {
            return Ok(RiskDecision::Rejected(RejectReason::MarketClosed));
        }
        let point = symbol_info.point;
        let digits = symbol_info.digits;

        let tick = adapter.get_tick(&signal.symbol)?;
        if let Some(until) = self.stats[&signal.symbol].spread_cooldown_until {
            if signal.time < until {
                return Ok(RiskDecision::Rejected(RejectReason::SpreadSpikeCooldown));
            }
        }

        let spread_value = match cfg.spread_mode {
            SpreadMode::Points => spread_in_points(tick.bid, tick.ask, point),
            SpreadMode::Pips => {
                spread_in_pips(tick.bid, tick.ask, &signal.symbol, digits, point)
            }
        };

        if spread_value > cfg.max_spread * self.config.spread_filter_multiplier {
            if let Some(stats) = self.stats.get_mut(&signal.symbol) {
                stats.spread_spike_count += 1;
                if stats.spread_spike_count >= cfg.min_spread_checks {
                    stats.spread_cooldown_until =
                        Some(signal.time + Duration::minutes(cfg.spread_spike_cooldown_minutes));
                    stats.spread_spike_count = 0;
                    warn!(
                        symbol = %signal.symbol,
                        spread = spread_value,
                        "spread spike cooldown armed"
                    );
                }
            }
            return Ok(RiskDecision::Rejected(RejectReason::SpreadTooWide));
        }
        // A single clean check clears the spike counter.
        if let Some(stats) = self.stats.get_mut(&signal.symbol) {
            stats.spread_spike_count = 0;
        }

        if state.volatility < cfg.min_atr {
            return Ok(RiskDecision::Rejected(RejectReason::VolatilityTooLow));
        }
        if state.volatility > cfg.max_atr {
            return Ok(RiskDecision::Rejected(RejectReason::VolatilityTooHigh));
        }

        {
            let stats = &self.stats[&signal.symbol];
            if stats.trades_today >= cfg.max_trades_per_day {
                return Ok(RiskDecision::Rejected(RejectReason::MaxTradesReached));
            }
            if stats.consecutive_losses >= cfg.max_consecutive_losses {
                return Ok(RiskDecision::Rejected(RejectReason::MaxConsecutiveLosses));
            }
        }

        if let Some(global) = &self.global_stats {
            if global.trades_today >= self.config.max_daily_trades {
                return Ok(RiskDecision::Rejected(RejectReason::GlobalMaxTrades));
            }
            if global.consecutive_losses >= self.config.max_consecutive_losses {
                return Ok(RiskDecision::Rejected(RejectReason::GlobalConsecutiveLosses));
            }
        }

        let account = adapter.get_account_info()?;
        if account.margin_free <= 0.0 {
            return Ok(RiskDecision::Rejected(RejectReason::InsufficientMargin));
        }

        let max_daily_loss = cfg.max_daily_loss.min(self.config.max_daily_loss);
        if self.stats[&signal.symbol].daily_loss <= -(max_daily_loss * account.equity).abs() {
            return Ok(RiskDecision::Rejected(RejectReason::DailyLossLimit));
        }
        if let Some(global) = &self.global_stats {
            if global.daily_loss <= -(self.config.max_daily_loss * account.equity).abs() {
                return Ok(RiskDecision::Rejected(RejectReason::GlobalDailyLoss));
            }
        }

        if let Some(global) = self.global_stats.as_mut() {
            if account.equity > global.peak_equity {
                global.peak_equity = account.equity;
            }
            let drawdown = if global.peak_equity > 0.0 {
                (global.peak_equity - account.equity) / global.peak_equity
            } else {
                0.0
            };
            if drawdown >= self.drawdown_kill {
                global.kill_switch = true;
                warn!(drawdown, "drawdown kill switch latched");
                return Ok(RiskDecision::Rejected(RejectReason::DrawdownKillSwitch));
            }
        }

        let mut min_lot = symbol_info.volume_min;
        let mut step = symbol_info.volume_step;
        if let Some(lot_override) = cfg.min_lot_override {
            min_lot = lot_override;
        }
        if let Some(step_override) = cfg.lot_step_override {
            step = step_override;
        }

        let stops_level = symbol_info.trade_stops_level * point;
        let freeze_level = symbol_info.trade_freeze_level * point;
        match signal.side {
            Side::Buy => {
                if signal.entry_price - signal.stop_loss < stops_level {
                    return Ok(RiskDecision::Rejected(RejectReason::StopTooClose));
                }
                if signal.take_profit - signal.entry_price < stops_level {
                    return Ok(RiskDecision::Rejected(RejectReason::TpTooClose));
                }
                if freeze_level > 0.0 && signal.entry_price - signal.stop_loss < freeze_level {
                    return Ok(RiskDecision::Rejected(RejectReason::FreezeLevel));
                }
            }
            Side::Sell => {
                if signal.stop_loss - signal.entry_price < stops_level {
                    return Ok(RiskDecision::Rejected(RejectReason::StopTooClose));
                }
                if signal.entry_price - signal.take_profit < stops_level {
                    return Ok(RiskDecision::Rejected(RejectReason::TpTooClose));
                }
                if freeze_level > 0.0 && signal.stop_loss - signal.entry_price < freeze_level {
                    return Ok(RiskDecision::Rejected(RejectReason::FreezeLevel));
                }
            }
        }

        let contract_size = symbol_info.trade_contract_size;
        let risk_amount = account.equity * cfg.risk_per_trade;
        let stop_distance = (signal.entry_price - signal.stop_loss).abs();
        if stop_distance <= 0.0 {
            return Ok(RiskDecision::Rejected(RejectReason::InvalidStopDistance));
        }
        if stop_distance < cfg.min_stop_atr * state.volatility {
            return Ok(RiskDecision::Rejected(RejectReason::StopTooTightAtr));
        }

        let raw_volume = risk_amount / (stop_distance * contract_size);
        let volume = ((raw_volume / step).round() * step).max(min_lot);
        if volume < min_lot {
            return Ok(RiskDecision::Rejected(RejectReason::VolumeBelowMin));
        }

        Ok(RiskDecision::Approved { volume })
    }

    /// Count an opened trade against the per-symbol and global daily caps.
    pub fn register_trade_open(
        &mut self,
        symbol: &str,
        now: DateTime<Utc>,
        adapter: &dyn BrokerAdapter,
    ) -> Result<()> {
        self.reset_if_new_day(symbol, now, adapter)?;
        if let Some(stats) = self.stats.get_mut(symbol) {
            stats.trades_today += 1;
        }
        self.reset_global_if_new_day(now, adapter)?;
        if let Some(global) = self.global_stats.as_mut() {
            global.trades_today += 1;
        }
        Ok(())
    }

    /// Fold a closed trade into the loss counters and cooldown clock.
    /// Any non-negative PnL resets the consecutive-loss streaks.
    pub fn register_trade_result(
        &mut self,
        symbol: &str,
        pnl: f64,
        close_time: DateTime<Utc>,
        adapter: &dyn BrokerAdapter,
    ) -> Result<()> {
        self.reset_if_new_day(symbol, close_time, adapter)?;
        self.reset_global_if_new_day(close_time, adapter)?;
        if let Some(stats) = self.stats.get_mut(symbol) {
            if pnl < 0.0 {
                stats.daily_loss += pnl;
                stats.consecutive_losses += 1;
            } else {
                stats.consecutive_losses = 0;
            }
            stats.last_close_time = Some(close_time);
        }
        if let Some(global) = self.global_stats.as_mut() {
            global.daily_loss += pnl;
            if pnl < 0.0 {
                global.consecutive_losses += 1;
            } else {
                global.consecutive_losses = 0;
            }
        }
        Ok(())
    }

    /// Position modifications only need the kill switches checked.
    pub fn approve_adjustment(
        &mut self,
        symbol: &str,
        now: DateTime<Utc>,
        adapter: &dyn BrokerAdapter,
    ) -> Result<RiskDecision> {
        self.reset_if_new_day(symbol, now, adapter)?;
        self.reset_global_if_new_day(now, adapter)?;
        let global_kill = self
            .global_stats
            .as_ref()
            .map_or(false, |stats| stats.kill_switch);
        let symbol_kill = self
            .stats
            .get(symbol)
            .map_or(false, |stats| stats.kill_switch);
        if symbol_kill || global_kill {
            return Ok(RiskDecision::Rejected(RejectReason::KillSwitch));
        }
        Ok(RiskDecision::Approved { volume: 0.0 })
    }

    #[cfg(test)]
    fn global_stats_mut(&mut self) -> Option<&mut GlobalRiskStats> {
        self.global_stats.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::PaperBroker;
    use crate::config::{SessionConfig, SymbolConfig};
    use crate::models::{OrderType, Tick};
    use chrono::{NaiveTime, TimeZone};

    fn config() -> BotConfig {
        let mut config = BotConfig::default();
        config.default_timezone = "UTC".to_string();
        config.sessions = vec![SessionConfig {
            name: "LONDON".to_string(),
            start: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }];
        config.symbols = vec![SymbolConfig {
            symbol: "EURUSD".to_string(),
            spread_mode: SpreadMode::Pips,
            max_spread: 1.5,
            min_spread_checks: 2,
            spread_spike_cooldown_minutes: 10,
            min_atr: 0.0005,
            max_atr: 0.005,
            min_stop_atr: 0.5,
            min_regime_confidence: 0.5,
            risk_per_trade: 0.005,
            max_daily_loss: 0.02,
            max_trades_per_day: 5,
            max_consecutive_losses: 5,
            min_rr: 1.2,
            news_sensitivity: "high".to_string(),
            lot_step_override: None,
            min_lot_override: None,
            trade_cooldown_minutes: None,
        }];
        config.max_daily_trades = 1;
        config.max_daily_loss = 0.02;
        config.max_consecutive_losses = 2;
        config
    }

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
            rationale: vec!["test".to_string()],
        }
    }

    fn state() -> MarketState {
        MarketState {
            symbol: "EURUSD".to_string(),
            time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
            regime_primary: Regime::Trend,
            regime_secondary: Regime::LowVol,
            trend_strength: 0.001,
            volatility: 0.001,
            range_compression: 0.001,
            return_1: 0.0001,
            session: "LONDON".to_string(),
            confidence: 0.9,
            notes: vec![],
        }
    }

    fn broker() -> PaperBroker {
        let mut broker = PaperBroker::default();
        broker.seed_tick(
            "EURUSD",
            Tick {
                time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
                bid: 1.1000,
                ask: 1.1001,
            },
        );
        broker
    }

    #[test]
    fn rejects_low_rr() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        // RR = 0.5 against min 1.2
        let decision = risk
            .approve(&signal(1.1000, 1.0990, 1.1005), &state(), &broker)
            .unwrap();
        assert!(!decision.approved());
        assert_eq!(decision, RiskDecision::Rejected(RejectReason::RrTooLow));
    }

    #[test]
    fn approves_and_sizes_valid_trade() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        // RR = 1.667; equity 10k, risk 0.5%, stop 15 pips on a 100k contract
        // => 50 / 150 = 0.3333 -> stepped to 0.33 lots.
        let decision = risk
            .approve(&signal(1.1000, 1.0985, 1.1025), &state(), &broker)
            .unwrap();
        assert!(decision.approved());
        assert!((decision.volume() - 0.33).abs() < 1e-9);
    }

    #[test]
    fn sized_volume_is_stepped_and_at_least_min_lot() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let decision = risk
            .approve(&signal(1.1000, 1.0985, 1.1025), &state(), &broker)
            .unwrap();
        let volume = decision.volume();
        let stepped = (volume / 0.01).round() * 0.01;
        assert!((volume - stepped).abs() < 1e-9);
        assert!(volume >= 0.01);
        // Realised risk stays within one step of the nominal risk amount.
        let stop_distance = 0.0015;
        let contract = 100_000.0;
        let nominal = 10_000.0 * 0.005;
        assert!((nominal - volume * stop_distance * contract).abs() <= 0.01 * stop_distance * contract);
    }

    #[test]
    fn global_trade_cap_blocks_second_entry() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);
        let first = risk.approve(&sig, &state(), &broker).unwrap();
        assert!(first.approved());
        risk.register_trade_open("EURUSD", sig.time, &broker).unwrap();

        let second = risk.approve(&sig, &state(), &broker).unwrap();
        assert_eq!(
            second,
            RiskDecision::Rejected(RejectReason::GlobalMaxTrades)
        );
    }

    #[test]
    fn global_consecutive_losses_block() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);
        risk.register_trade_result("EURUSD", -10.0, sig.time, &broker)
            .unwrap();
        risk.register_trade_result("EURUSD", -5.0, sig.time, &broker)
            .unwrap();

        // Move past the cooldown so the loss gate is the one that fires.
        let mut late = sig.clone();
        late.time += Duration::minutes(30);
        let mut late_state = state();
        late_state.time = late.time;
        let decision = risk.approve(&late, &late_state, &broker).unwrap();
        assert_eq!(
            decision,
            RiskDecision::Rejected(RejectReason::GlobalConsecutiveLosses)
        );
    }

    #[test]
    fn winning_trade_resets_loss_streak() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);
        risk.register_trade_result("EURUSD", -10.0, sig.time, &broker)
            .unwrap();
        risk.register_trade_result("EURUSD", 25.0, sig.time, &broker)
            .unwrap();

        let mut late = sig.clone();
        late.time += Duration::minutes(30);
        let mut late_state = state();
        late_state.time = late.time;
        let decision = risk.approve(&late, &late_state, &broker).unwrap();
        assert!(decision.approved());
    }

    #[test]
    fn cooldown_blocks_entry_after_recent_close() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);
        risk.register_trade_result("EURUSD", 5.0, sig.time, &broker)
            .unwrap();
        let soon = {
            let mut s = sig.clone();
            s.time += Duration::minutes(5);
            s
        };
        let decision = risk.approve(&soon, &state(), &broker).unwrap();
        assert_eq!(decision, RiskDecision::Rejected(RejectReason::CooldownActive));
    }

    #[test]
    fn session_off_is_rejected() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let mut off_state = state();
        off_state.session = SESSION_OFF.to_string();
        let decision = risk
            .approve(&signal(1.1000, 1.0985, 1.1025), &off_state, &broker)
            .unwrap();
        assert_eq!(decision, RiskDecision::Rejected(RejectReason::OutsideSession));
    }

    #[test]
    fn mixed_secondary_regime_is_rejected() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let mut mixed_state = state();
        mixed_state.regime_secondary = Regime::Mixed;
        let decision = risk
            .approve(&signal(1.1000, 1.0985, 1.1025), &mixed_state, &broker)
            .unwrap();
        assert_eq!(
            decision,
            RiskDecision::Rejected(RejectReason::LowRegimeConfidence)
        );
    }

    #[test]
    fn day_rollover_is_idempotent_within_a_day() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);
        risk.approve(&sig, &state(), &broker).unwrap();
        let date_before = risk.stats["EURUSD"].date.clone();
        risk.approve(&sig, &state(), &broker).unwrap();
        assert_eq!(risk.stats["EURUSD"].date, date_before);
    }

    #[test]
    fn crossing_midnight_resets_counters() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);
        risk.register_trade_open("EURUSD", sig.time, &broker).unwrap();
        risk.register_trade_result("EURUSD", -10.0, sig.time, &broker)
            .unwrap();
        assert_eq!(risk.stats["EURUSD"].trades_today, 1);

        let next_day = Utc.with_ymd_and_hms(2026, 1, 29, 9, 0, 0).unwrap();
        risk.reset_if_new_day("EURUSD", next_day, &broker).unwrap();
        let stats = &risk.stats["EURUSD"];
        assert_eq!(stats.trades_today, 0);
        assert_eq!(stats.consecutive_losses, 0);
        assert_eq!(stats.daily_loss, 0.0);
        assert_eq!(stats.peak_equity, 10_000.0);
    }

    #[test]
    fn kill_switch_is_monotone_within_day() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);
        // Prime the global stats, then latch the kill switch.
        risk.approve(&sig, &state(), &broker).unwrap();
        risk.global_stats_mut().unwrap().kill_switch = true;

        for _ in 0..3 {
            let decision = risk.approve(&sig, &state(), &broker).unwrap();
            assert_eq!(decision, RiskDecision::Rejected(RejectReason::KillSwitch));
        }
        let adjustment = risk.approve_adjustment("EURUSD", sig.time, &broker).unwrap();
        assert!(!adjustment.approved());
    }

    #[test]
    fn spread_spike_arms_cooldown_after_repeated_checks() {
        let mut broker = PaperBroker::default();
        // 3-pip spread against a 1.5-pip limit.
        broker.seed_tick(
            "EURUSD",
            Tick {
                time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
                bid: 1.1000,
                ask: 1.1003,
            },
        );
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);

        let first = risk.approve(&sig, &state(), &broker).unwrap();
        assert_eq!(first, RiskDecision::Rejected(RejectReason::SpreadTooWide));
        // min_spread_checks = 2: second spike arms the cooldown.
        let second = risk.approve(&sig, &state(), &broker).unwrap();
        assert_eq!(second, RiskDecision::Rejected(RejectReason::SpreadTooWide));

        let mut later = sig.clone();
        later.time += Duration::minutes(5);
        let third = risk.approve(&later, &state(), &broker).unwrap();
        assert_eq!(
            third,
            RiskDecision::Rejected(RejectReason::SpreadSpikeCooldown)
        );
    }

    #[test]
    fn clean_check_resets_spike_counter() {
        let mut broker = PaperBroker::default();
        broker.seed_tick(
            "EURUSD",
            Tick {
                time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap(),
                bid: 1.1000,
                ask: 1.1003,
            },
        );
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);
        risk.approve(&sig, &state(), &broker).unwrap();
        assert_eq!(risk.stats["EURUSD"].spread_spike_count, 1);

        // Spread normalises; the counter must clear on one clean pass.
        broker.seed_tick(
            "EURUSD",
            Tick {
                time: Utc.with_ymd_and_hms(2026, 1, 28, 9, 1, 0).unwrap(),
                bid: 1.1000,
                ask: 1.1001,
            },
        );
        let decision = risk.approve(&sig, &state(), &broker).unwrap();
        assert!(decision.approved());
        assert_eq!(risk.stats["EURUSD"].spread_spike_count, 0);
    }

    #[test]
    fn volatility_bounds_are_enforced() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        let sig = signal(1.1000, 1.0985, 1.1025);

        let mut quiet = state();
        quiet.volatility = 0.0001;
        assert_eq!(
            risk.approve(&sig, &quiet, &broker).unwrap(),
            RiskDecision::Rejected(RejectReason::VolatilityTooLow)
        );

        let mut wild = state();
        wild.volatility = 0.01;
        assert_eq!(
            risk.approve(&sig, &wild, &broker).unwrap(),
            RiskDecision::Rejected(RejectReason::VolatilityTooHigh)
        );
    }

    #[test]
    fn stop_too_tight_for_atr_is_rejected() {
        let broker = broker();
        let mut risk = RiskManager::new(config());
        // 12-pip stop clears the broker stops level but not
        // min_stop_atr 0.5 * ATR 0.003 = 15 pips.
        let sig = signal(1.1000, 1.0988, 1.1015);
        let mut calm = state();
        calm.volatility = 0.003;
        assert_eq!(
            risk.approve(&sig, &calm, &broker).unwrap(),
            RiskDecision::Rejected(RejectReason::StopTooTightAtr)
        );
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(RejectReason::RrTooLow.code(), "rr_too_low");
        assert_eq!(RejectReason::GlobalMaxTrades.code(), "global_max_trades");
        assert_eq!(
            RejectReason::DrawdownKillSwitch.text(),
            "Drawdown kill switch triggered"
        );
    }
}
