// =============================================================================
// Bot Engine — per-cycle orchestration and cross-symbol arbitration
// =============================================================================
//
// `run_once(now)` drives one synchronous evaluation pass:
//
//   1. Health probe on the broker link; abort the cycle when down.
//   2. Per symbol: fetch bars, observe the market, apply the news and
//      open-position gates, collect strategy candidates, pick the symbol's
//      best by confidence, score with the ML filter, run the risk gates.
//   3. Arbitrate the surviving pool: the candidate with the highest
//      confidence x ML score is placed (at most one order per cycle); the
//      rest are recorded as lower-quality skips.
//   4. Supervise open positions and reconcile the trade book against the
//      broker; every sealed trade feeds the risk counters.
//
// Expected gate failures are recorded and the cycle continues; broker or
// store failures propagate to the caller, which logs and moves on.
// =============================================================================

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::broker::BrokerAdapter;
use crate::config::BotConfig;
use crate::execution::ExecutionEngine;
use crate::journal::TradeJournal;
use crate::ml::{MlFilter, PassthroughFilter};
use crate::models::{Bar, MarketState, Signal, TradeRecord};
use crate::news::NewsRiskFilter;
use crate::observer::MarketObserver;
use crate::risk::{RiskDecision, RiskManager};
use crate::snd::config::{load_supply_demand_config, SupplyDemandConfig};
use crate::store::SqliteStore;
use crate::strategies::range::RangeStrategy;
use crate::strategies::supply_demand::SupplyDemandStrategy;
use crate::strategies::trend::TrendStrategy;
use crate::strategies::{Strategy, StrategyContext};
use crate::supervisor::{PositionMeta, TradeSupervisor};
use crate::trade_book::TradeBook;

pub struct BotEngine<B: BrokerAdapter> {
    config: BotConfig,
    adapter: B,
    observer: MarketObserver,
    risk: RiskManager,
    execution: ExecutionEngine,
    supervisor: TradeSupervisor,
    news: NewsRiskFilter,
    ml_filter: Box<dyn MlFilter>,
    strategies: Vec<Box<dyn Strategy>>,
    snd_cfg: Option<SupplyDemandConfig>,
    trade_book: TradeBook,
    store: SqliteStore,
    journal: TradeJournal,
}

impl<B: BrokerAdapter> BotEngine<B> {
    pub fn new(
        config: BotConfig,
        adapter: B,
        store: SqliteStore,
        journal: TradeJournal,
    ) -> Result<Self> {
        let observer = MarketObserver::new(config.clone());
        let risk = RiskManager::new(config.clone());
        let supervisor =
            TradeSupervisor::new(config.close_on_good_profit, config.good_profit_rr);
        let mut news = NewsRiskFilter::new(
            config.news_window_pre_minutes,
            config.news_window_post_minutes,
        );
        news.load_schedule(config.news_schedule_path.as_deref())?;

        let mut strategies: Vec<Box<dyn Strategy>> =
            vec![Box::new(TrendStrategy::new()), Box::new(RangeStrategy::new())];
        let mut snd_cfg = None;
        if config.enable_supply_demand {
            let mut cfg = load_supply_demand_config(config.supply_demand_config_path.as_deref())?;
            cfg.enable = true;
            strategies.push(Box::new(SupplyDemandStrategy::new(cfg.clone())));
            snd_cfg = Some(cfg);
        }

        Ok(Self {
            config,
            adapter,
            observer,
            risk,
            execution: ExecutionEngine::new(),
            supervisor,
            news,
            ml_filter: Box::new(PassthroughFilter),
            strategies,
            snd_cfg,
            trade_book: TradeBook::new(),
            store,
            journal,
        })
    }

    /// Swap in a non-default ML filter.
    pub fn with_ml_filter(mut self, ml_filter: Box<dyn MlFilter>) -> Self {
        self.ml_filter = ml_filter;
        self
    }

    pub fn adapter_mut(&mut self) -> &mut B {
        &mut self.adapter
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    fn journal_skip(&self, now: DateTime<Utc>, symbol: &str, reason: &str) -> Result<()> {
        self.journal.write(&json!({
            "time": now.to_rfc3339(),
            "symbol": symbol,
            "action": "skip",
            "reason": reason,
        }))
    }

    /// Record an expected gate failure: structured log, event row, journal.
    fn record_no_trade(&self, now: DateTime<Utc>, symbol: &str, reason: &str) -> Result<()> {
        info!(symbol, reason, "no_trade");
        self.store
            .insert_event(&now.to_rfc3339(), "no_trade", &format!("{symbol}:{reason}"))?;
        self.journal_skip(now, symbol, reason)
    }

    /// One full evaluation cycle.
    pub fn run_once(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.adapter.is_connected() {
            warn!(status = "disconnected", "health");
            return Ok(());
        }

        let mut candidate_pool: Vec<(Signal, MarketState, RiskDecision, f64)> = Vec::new();

        for symbol_cfg in self.config.symbols.clone() {
            let symbol = symbol_cfg.symbol.as_str();
            let bars_m15 = self.adapter.get_bars(symbol, "M15", 200)?;
            let bars_h1 = self.adapter.get_bars(symbol, "H1", 200)?;
            if bars_m15.len() < 50 || bars_h1.len() < 50 {
                self.journal_skip(now, symbol, "insufficient_bars")?;
                continue;
            }

            // Extra inputs for the zone strategy: bars at its configured
            // timeframes plus the broker's symbol parameters.
            let mut extra_bars: HashMap<String, Vec<Bar>> = HashMap::new();
            let mut symbol_info = None;
            if let Some(snd_cfg) = &self.snd_cfg {
                let mut wanted = snd_cfg.htf_timeframes.clone();
                wanted.push(snd_cfg.ltf_timeframe.clone());
                for timeframe in wanted {
                    if timeframe != "M15" && timeframe != "H1" {
                        let bars = self.adapter.get_bars(symbol, &timeframe, 300)?;
                        extra_bars.insert(timeframe, bars);
                    }
                }
                symbol_info = Some(self.adapter.symbol_info(symbol)?);
            }
            let mut bars_by_timeframe: HashMap<&str, &[Bar]> = HashMap::new();
            bars_by_timeframe.insert("M15", bars_m15.as_slice());
            bars_by_timeframe.insert("H1", bars_h1.as_slice());
            for (timeframe, bars) in &extra_bars {
                bars_by_timeframe.insert(timeframe.as_str(), bars.as_slice());
            }
            let context = StrategyContext {
                bars_by_timeframe,
                symbol_info: symbol_info.as_ref(),
            };

            let state = self.observer.evaluate(symbol, &bars_m15, &bars_h1, now);
            info!(
                symbol,
                regime = %state.regime_primary,
                vol = state.volatility,
                session = %state.session,
                "market_state"
            );

            if self
                .news
                .in_risk_window(now, Some(symbol), &symbol_cfg.news_sensitivity)
            {
                self.record_no_trade(now, symbol, "news_window")?;
                continue;
            }

            if !self
                .execution
                .can_open(&self.adapter, symbol, self.config.max_positions_per_symbol)?
            {
                self.record_no_trade(now, symbol, "position_exists")?;
                continue;
            }

            let mut candidates: Vec<Signal> = self
                .strategies
                .iter()
                .filter_map(|strategy| strategy.generate(&state, &bars_m15, &bars_h1, &context))
                .collect();
            if candidates.is_empty() {
                self.record_no_trade(now, symbol, "no_signal")?;
                continue;
            }

            // Best candidate per symbol by confidence.
            candidates.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let signal = candidates.remove(0);

            let ml_decision = self.ml_filter.score(&signal, &state);
            if !ml_decision.approved {
                self.record_no_trade(now, symbol, "ml_filter")?;
                continue;
            }

            let risk_decision = self.risk.approve(&signal, &state, &self.adapter)?;
            if !risk_decision.approved() {
                self.record_no_trade(now, symbol, risk_decision.code())?;
                continue;
            }

            candidate_pool.push((signal, state, risk_decision, ml_decision.score));
        }

        if !candidate_pool.is_empty() {
            candidate_pool.sort_by(|a, b| {
                (b.0.confidence * b.3)
                    .partial_cmp(&(a.0.confidence * a.3))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let (best_signal, best_state, best_risk, _) = candidate_pool.remove(0);
            for (signal, _, _, _) in &candidate_pool {
                self.record_no_trade(now, &signal.symbol, "lower_quality_candidate")?;
            }

            if self.config.dry_run {
                info!(symbol = %best_signal.symbol, reason = "dry_run_enabled", "dry_run");
                self.store.insert_event(
                    &now.to_rfc3339(),
                    "no_trade",
                    &format!("{}:dry_run", best_signal.symbol),
                )?;
                self.journal_skip(now, &best_signal.symbol, "dry_run_enabled")?;
            } else {
                let volume = best_risk.volume();
                let result = self
                    .execution
                    .place(&mut self.adapter, &best_signal, volume)?;
                self.execution.log_result(&best_signal, &result, volume);

                if result.success {
                    if let Some(broker_order_id) = result.broker_order_id.as_deref() {
                        self.risk.register_trade_open(
                            &best_signal.symbol,
                            best_signal.time,
                            &self.adapter,
                        )?;
                        self.supervisor.register(
                            broker_order_id,
                            PositionMeta {
                                max_hold_minutes: best_signal.max_hold_minutes,
                                entry_time: best_signal.time,
                                entry_price: best_signal.entry_price,
                                atr_at_entry: best_state.volatility,
                            },
                        );
                        let symbol_info = self.adapter.symbol_info(&best_signal.symbol)?;
                        let trade = TradeRecord {
                            symbol: best_signal.symbol.clone(),
                            strategy: best_signal.strategy.clone(),
                            side: best_signal.side,
                            entry_time: best_signal.time,
                            entry_price: best_signal.entry_price,
                            exit_time: None,
                            exit_price: None,
                            volume,
                            pnl: 0.0,
                            reason: "open".to_string(),
                            rr: best_signal.rr(),
                            tags: best_signal.rationale.clone(),
                            contract_size: symbol_info.trade_contract_size,
                            hold_minutes: 0.0,
                        };
                        self.trade_book.register_open(broker_order_id, trade);
                        self.journal.write(&json!({
                            "time": now.to_rfc3339(),
                            "symbol": best_signal.symbol,
                            "action": "enter",
                            "reason": "approved",
                            "strategy": best_signal.strategy,
                            "volume": volume,
                            "rr": best_signal.rr(),
                        }))?;
                    }
                }

                self.store.insert_event(
                    &now.to_rfc3339(),
                    "order",
                    &format!("{}:{}", best_signal.strategy, result.status),
                )?;
            }
        }

        // Manage open positions, then reconcile the trade book.
        let mut all_positions = Vec::new();
        let mut tick_map: HashMap<String, f64> = HashMap::new();
        for symbol_cfg in self.config.symbols.clone() {
            let symbol = symbol_cfg.symbol.as_str();
            let positions = self.adapter.get_open_positions(Some(symbol))?;
            if !positions.is_empty() {
                let bars_m15 = self.adapter.get_bars(symbol, "M15", 200)?;
                let bars_h1 = self.adapter.get_bars(symbol, "H1", 200)?;
                let state = self.observer.evaluate(symbol, &bars_m15, &bars_h1, now);
                self.supervisor
                    .evaluate(&state, &positions, &mut self.adapter, &mut self.risk)?;
            }
            all_positions.extend(positions);
            tick_map.insert(symbol.to_string(), self.adapter.get_tick(symbol)?.bid);
        }

        let closed = self.trade_book.reconcile(&all_positions, &tick_map, now);
        for trade in closed {
            self.store.insert_trade(&trade)?;
            let close_time = trade.exit_time.unwrap_or(now);
            self.risk
                .register_trade_result(&trade.symbol, trade.pnl, close_time, &self.adapter)?;
        }

        Ok(())
    }
}
